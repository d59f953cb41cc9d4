use crate::{AppState, pages::account};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Pages reachable without a session. Login and signup live here because they are
/// how a session is obtained.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::home))
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/login", get(account::show_login).post(account::login))
        .route("/signup", get(account::show_signup).post(account::signup))
}
