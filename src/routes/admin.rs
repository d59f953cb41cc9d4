use crate::{AppState, pages::admin};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Catalog management. Registered behind the authentication gate and a role gate
/// allowing `admin` only.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/movies", get(admin::list_movies))
        .route(
            "/admin/movies/create",
            get(admin::show_create_movie).post(admin::create_movie),
        )
        // GET /admin/movies/edit?id={movie_id}
        .route("/admin/movies/edit", get(admin::show_edit_movie))
        .route("/admin/movies/update", post(admin::update_movie))
        .route("/admin/movies/delete", post(admin::delete_movie))
}
