use crate::{
    AppState,
    pages::{account, catalog, profile},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Pages for any logged-in user regardless of role. Handlers take the `Identity`
/// attached by the authentication gate and never read the session for it.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/logout", get(account::logout))
        .route("/dashboard", get(account::dashboard))
        // --- Profile ---
        .route("/profile", get(profile::show_profile))
        .route(
            "/profile/edit",
            get(profile::show_edit_profile).post(profile::update_profile),
        )
        .route(
            "/profile/change-password",
            get(profile::show_change_password).post(profile::change_password),
        )
        // --- Catalog ---
        .route("/movies", get(catalog::list_movies))
        .route("/movies/{id}", get(catalog::movie_detail))
        .route("/watchlist", get(catalog::show_watchlist))
        .route("/watchlist/add", post(catalog::add_to_watchlist))
        .route("/watchlist/remove", post(catalog::remove_from_watchlist))
        .route("/reviews", post(catalog::create_review))
}
