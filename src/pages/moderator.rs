use axum::{
    Form,
    extract::State,
    response::{Html, Response},
};
use serde::Deserialize;

use super::{escape, layout, parse_id, see_other};
use crate::{
    AppState,
    auth::Identity,
    error::PageError,
    models::{Role, User},
};

/// Users shown on the moderation list.
const MODERATOR_LIST_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoleForm {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeactivateForm {
    pub user_id: String,
}

/// GET /moderator/dashboard
pub async fn dashboard(identity: Identity) -> Html<String> {
    let body = r#"<p>Moderation tools.</p>
<ul><li><a href="/moderator/users">Manage users</a></li></ul>"#;
    layout("Moderator dashboard", Some(&identity), body)
}

fn user_row(user: &User, me: &Identity) -> String {
    let actions = if user.user_id == me.user_id {
        "<td colspan=\"2\"><em>you</em></td>".to_string()
    } else {
        let options: String = Role::ALL
            .iter()
            .map(|role| {
                let selected = if role.as_str() == user.role { " selected" } else { "" };
                format!(r#"<option value="{0}"{1}>{0}</option>"#, role, selected)
            })
            .collect();
        format!(
            r#"<td><form method="post" action="/moderator/users/update-role"><input type="hidden" name="user_id" value="{id}"><select name="role">{options}</select><button type="submit">Update</button></form></td><td><form method="post" action="/moderator/users/deactivate"><input type="hidden" name="user_id" value="{id}"><button type="submit">Deactivate</button></form></td>"#,
            id = user.user_id,
            options = options
        )
    };
    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td>{}</tr>",
        escape(&user.email),
        escape(&user.display_name()),
        escape(&user.role),
        actions
    )
}

/// GET /moderator/users
pub async fn list_users(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let users = state
        .repo
        .list_users(MODERATOR_LIST_LIMIT, 0)
        .await
        .map_err(|e| PageError::from_repo("load users", e))?;
    let rows: Vec<String> = users.iter().map(|u| user_row(u, &identity)).collect();
    let body = format!(
        r#"<table class="users"><thead><tr><th>Email</th><th>Name</th><th>Role</th><th></th><th></th></tr></thead>
<tbody>{}</tbody></table>"#,
        rows.join("\n")
    );
    Ok(layout("Users", Some(&identity), &body))
}

/// POST /moderator/users/update-role
pub async fn update_role(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<RoleForm>,
) -> Result<Response, PageError> {
    let user_id = parse_id(&form.user_id, "User")?;
    if user_id == identity.user_id {
        return Err(PageError::BadRequest("Cannot change your own role".to_string()));
    }
    let role = form
        .role
        .parse::<Role>()
        .map_err(|_| PageError::BadRequest("Invalid role".to_string()))?;

    let updated = state
        .repo
        .update_user_role(user_id, role)
        .await
        .map_err(|e| PageError::from_repo("update user role", e))?;
    if !updated {
        return Err(PageError::NotFound("User not found".to_string()));
    }
    tracing::info!("{} changed role of {} to {}", identity.email, user_id, role);
    Ok(see_other("/moderator/users"))
}

/// POST /moderator/users/deactivate
pub async fn deactivate_user(
    identity: Identity,
    State(state): State<AppState>,
    Form(form): Form<DeactivateForm>,
) -> Result<Response, PageError> {
    let user_id = parse_id(&form.user_id, "User")?;
    if user_id == identity.user_id {
        return Err(PageError::ForbiddenAction("Cannot deactivate yourself".to_string()));
    }
    let deactivated = state
        .repo
        .deactivate_user(user_id)
        .await
        .map_err(|e| PageError::from_repo("deactivate user", e))?;
    if !deactivated {
        return Err(PageError::NotFound("User not found".to_string()));
    }
    tracing::info!("{} deactivated user {}", identity.email, user_id);
    Ok(see_other("/moderator/users"))
}
