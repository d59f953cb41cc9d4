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
    error::PageError,
    models::{Review, User},
    password,
    session::{Session, keys},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

async fn current_user(state: &AppState, identity: &Identity) -> Result<User, PageError> {
    state
        .repo
        .get_user(identity.user_id)
        .await
        .map_err(|e| PageError::from_repo("load profile", e))?
        .ok_or_else(|| PageError::NotFound("User not found".to_string()))
}

fn review_list(reviews: &[Review]) -> String {
    if reviews.is_empty() {
        return "<p>You have not written any reviews yet.</p>".to_string();
    }
    let items: Vec<String> = reviews
        .iter()
        .map(|r| {
            format!(
                r#"<li><a href="/movies/{}">{}</a> ({}/10) {}</li>"#,
                r.movie_id,
                escape(&r.title),
                r.rating,
                escape(&r.content)
            )
        })
        .collect();
    format!("<ul class=\"reviews\">{}</ul>", items.join("\n"))
}

/// GET /profile
pub async fn show_profile(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let user = current_user(&state, &identity).await?;
    let reviews = state
        .repo
        .get_user_reviews(identity.user_id)
        .await
        .map_err(|e| PageError::from_repo("load reviews", e))?;

    let body = format!(
        r#"<dl>
<dt>Email</dt><dd>{}</dd>
<dt>Name</dt><dd>{}</dd>
<dt>Username</dt><dd>{}</dd>
<dt>Role</dt><dd>{}</dd>
</dl>
<p><a href="/profile/edit">Edit profile</a> | <a href="/profile/change-password">Change password</a></p>
<h2>Your reviews</h2>
{}"#,
        escape(&user.email),
        escape(&user.display_name()),
        escape(&user.username),
        escape(&user.role),
        review_list(&reviews)
    );
    Ok(layout("Profile", Some(&identity), &body))
}

fn edit_page(identity: &Identity, user: &User, error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"{}
<form method="post" action="/profile/edit">
<label>First name <input name="first_name" value="{}"></label>
<label>Last name <input name="last_name" value="{}"></label>
<label>Username <input name="username" value="{}"></label>
<button type="submit">Save</button>
</form>"#,
        alert(error),
        escape(&user.first_name),
        escape(&user.last_name),
        escape(&user.username)
    );
    layout("Edit profile", Some(identity), &body)
}

/// GET /profile/edit
pub async fn show_edit_profile(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let user = current_user(&state, &identity).await?;
    Ok(edit_page(&identity, &user, None))
}

/// POST /profile/edit
///
/// The session keeps `name` and `username` in step with the stored profile.
pub async fn update_profile(
    identity: Identity,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Response, PageError> {
    let user = current_user(&state, &identity).await?;
    let first_name = form.first_name.trim();
    let last_name = form.last_name.trim();
    let username = form.username.trim();

    match state
        .repo
        .update_profile(identity.user_id, first_name, last_name, username)
        .await
    {
        Ok(true) => {}
        Ok(false) => return Err(PageError::NotFound("User not found".to_string())),
        Err(e) => {
            tracing::error!("Error updating profile for {}: {}", identity.user_id, e);
            return Ok(edit_page(&identity, &user, Some("Failed to update profile")).into_response());
        }
    }

    let name = format!("{} {}", first_name, last_name).trim().to_string();
    session.put(keys::NAME, name).await;
    session.put(keys::USERNAME, username).await;
    Ok(see_other("/profile"))
}

fn password_page(identity: &Identity, error: Option<&str>) -> Html<String> {
    let body = format!(
        r#"{}
<form method="post" action="/profile/change-password">
<label>Current password <input type="password" name="current_password" required></label>
<label>New password <input type="password" name="new_password" required></label>
<label>Confirm new password <input type="password" name="confirm_password" required></label>
<button type="submit">Change password</button>
</form>"#,
        alert(error)
    );
    layout("Change password", Some(identity), &body)
}

/// GET /profile/change-password
pub async fn show_change_password(identity: Identity) -> Html<String> {
    password_page(&identity, None)
}

/// POST /profile/change-password
pub async fn change_password(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, PageError> {
    if form.new_password.is_empty() {
        return Ok(password_page(&identity, Some("New password is required")).into_response());
    }
    if form.new_password != form.confirm_password {
        return Ok(password_page(&identity, Some("New passwords do not match")).into_response());
    }

    let user = current_user(&state, &identity).await?;
    if !password::verify(&form.current_password, &user.password_hash).await {
        return Ok(password_page(&identity, Some("Current password is incorrect")).into_response());
    }

    let hashed = password::hash(&form.new_password, state.config.bcrypt_cost).await?;
    match state.repo.update_password(identity.user_id, &hashed).await {
        Ok(true) => {}
        Ok(false) => return Err(PageError::NotFound("User not found".to_string())),
        Err(e) => {
            tracing::error!("Error updating password for {}: {}", identity.user_id, e);
            return Ok(password_page(&identity, Some("Failed to update password")).into_response());
        }
    }

    tracing::info!("Password changed for {}", identity.email);
    let body = r#"<p class="alert alert-success">Password changed successfully.</p>
<p><a href="/profile">Back to profile</a></p>"#;
    Ok(layout("Password changed", Some(&identity), body).into_response())
}
