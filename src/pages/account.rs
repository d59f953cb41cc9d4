use axum::{
    Form,
    extract::State,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use super::{alert, escape, layout, see_other};
use crate::{
    AppState,
    auth::Identity,
    error::{PageError, RepoError},
    models::{NewUser, Role, User},
    password,
    session::{Session, SessionAttributes},
};

const SESSION_UNAVAILABLE: &str = "Unable to sign in right now. Please try again later.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

/// GET /
pub async fn home(session: Session) -> Html<String> {
    let identity = Identity::from_session(&session).await;
    let body = match &identity {
        Some(identity) => format!(
            r#"<p>Welcome back, {}.</p><p><a href="/movies">Browse the catalog</a></p>"#,
            escape(greeting_name(identity))
        ),
        None => r#"<p>Track the movies you want to see and share what you thought of them.</p>
<p><a href="/login">Log in</a> or <a href="/signup">create an account</a>.</p>"#
            .to_string(),
    };
    layout("Movie Catalog", identity.as_ref(), &body)
}

fn greeting_name(identity: &Identity) -> &str {
    if identity.name.is_empty() {
        &identity.email
    } else {
        &identity.name
    }
}

fn login_page(error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"{}
<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
<p>No account? <a href="/signup">Sign up</a></p>"#,
        alert(error)
    );
    layout("Login", None, &body)
}

fn signup_page(error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"{}
<form method="post" action="/signup">
<label>Email <input type="email" name="email" required></label>
<label>First name <input name="first_name"></label>
<label>Last name <input name="last_name"></label>
<label>Username <input name="username"></label>
<label>Password <input type="password" name="password" required></label>
<label>Confirm password <input type="password" name="confirm_password" required></label>
<button type="submit">Create account</button>
</form>"#,
        alert(error)
    );
    layout("Sign up", None, &body)
}

/// GET /login
pub async fn show_login() -> Html<String> {
    login_page(None)
}

/// GET /signup
pub async fn show_signup() -> Html<String> {
    signup_page(None)
}

/// Rotates the session to a freshly authenticated one for `user`.
///
/// Returns `false` when the session backend could not allocate a session; the
/// caller stays logged out.
async fn start_session(session: &Session, user: &User) -> Result<bool, PageError> {
    let role = user.role.parse::<Role>().map_err(|e| {
        tracing::error!("user {} has an unusable role: {}", user.user_id, e);
        PageError::Internal("Failed to start session".to_string())
    })?;
    let attributes = SessionAttributes::new(
        user.user_id.to_string(),
        user.email.clone(),
        role,
        user.display_name(),
        user.username.clone(),
    )
    .ok_or_else(|| PageError::Internal("Failed to start session".to_string()))?;

    Ok(session.login(attributes).await)
}

/// POST /login
///
/// Unknown email and wrong password produce the same message.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let user = state
        .repo
        .get_user_by_email(form.email.trim())
        .await
        .map_err(|e| PageError::from_repo("load user", e))?;

    let Some(user) = user else {
        tracing::info!("Login failed for unknown email {}", form.email);
        return Ok(login_page(Some("Invalid email or password")).into_response());
    };

    if !password::verify(&form.password, &user.password_hash).await {
        tracing::info!("Invalid password for user {}", user.email);
        return Ok(login_page(Some("Invalid email or password")).into_response());
    }

    if let Err(e) = state.repo.update_last_login(user.user_id).await {
        tracing::warn!("Failed to update last login for {}: {}", user.user_id, e);
    }

    if !start_session(&session, &user).await? {
        return Ok(login_page(Some(SESSION_UNAVAILABLE)).into_response());
    }
    tracing::info!("User logged in: {} (role: {})", user.email, user.role);
    Ok(see_other("/dashboard"))
}

/// POST /signup
///
/// New accounts always get the `user` role and are logged in straight away.
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, PageError> {
    let email = form.email.trim().to_string();
    if email.is_empty() || form.password.is_empty() {
        return Ok(signup_page(Some("Email and password are required")).into_response());
    }
    if form.password != form.confirm_password {
        return Ok(signup_page(Some("Passwords do not match")).into_response());
    }

    let existing = state
        .repo
        .get_user_by_email(&email)
        .await
        .map_err(|e| PageError::from_repo("check email", e))?;
    if existing.is_some() {
        return Ok(signup_page(Some("Email already registered")).into_response());
    }

    let password_hash = password::hash(&form.password, state.config.bcrypt_cost).await?;
    let new_user = NewUser {
        email,
        password_hash,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        username: form.username.trim().to_string(),
        role: Role::User,
    };

    let user = match state.repo.create_user(new_user).await {
        Ok(user) => user,
        Err(RepoError::Conflict(message)) => {
            return Ok(signup_page(Some(&message)).into_response());
        }
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            return Ok(signup_page(Some("Failed to create account")).into_response());
        }
    };

    tracing::info!("New user registered: {} (id: {})", user.email, user.user_id);
    if !start_session(&session, &user).await? {
        // The account exists; the user can log in once sessions are back.
        return Ok(see_other("/login"));
    }
    Ok(see_other("/dashboard"))
}

/// GET /logout
pub async fn logout(identity: Identity, session: Session) -> Response {
    session.destroy().await;
    tracing::info!("User logged out: {}", identity.email);
    see_other("/")
}

/// GET /dashboard
pub async fn dashboard(identity: Identity) -> Html<String> {
    let body = format!(
        r#"<p>Signed in as <strong>{}</strong> ({})</p>
<p>Role: <span class="role">{}</span></p>
<ul>
<li><a href="/movies">Browse movies</a></li>
<li><a href="/watchlist">Your watchlist</a></li>
<li><a href="/profile">Your profile</a></li>
</ul>"#,
        escape(greeting_name(&identity)),
        escape(&identity.email),
        identity.role
    );
    layout("Dashboard", Some(&identity), &body)
}
