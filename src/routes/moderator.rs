use crate::{AppState, pages::moderator};
use axum::{
    Router,
    routing::{get, post},
};

/// Moderator Router Module
///
/// User management. Registered behind the authentication gate and a role gate
/// allowing `moderator` only; admins are not implicitly moderators.
pub fn moderator_routes() -> Router<AppState> {
    Router::new()
        .route("/moderator/dashboard", get(moderator::dashboard))
        .route("/moderator/users", get(moderator::list_users))
        .route("/moderator/users/update-role", post(moderator::update_role))
        .route("/moderator/users/deactivate", post(moderator::deactivate_user))
}
