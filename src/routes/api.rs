use crate::{AppState, handlers, models::Role};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::gates::{self, Gate};

/// Reads open to anyone.
fn public() -> Router<AppState> {
    Router::new()
        .route("/movies", get(handlers::list_movies))
        .route("/movies/{id}", get(handlers::get_movie))
        .route("/reviews", get(handlers::list_reviews))
}

/// The caller's own data.
fn member() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::get_me))
        .route("/reviews", post(handlers::create_review))
        .route(
            "/watchlist",
            get(handlers::get_watchlist).post(handlers::add_to_watchlist),
        )
        .route("/watchlist/{movie_id}", delete(handlers::remove_from_watchlist))
}

fn moderator() -> Router<AppState> {
    Router::new()
        .route("/moderator/users", get(handlers::list_users))
        .route("/moderator/users/{id}/role", put(handlers::update_user_role))
        .route("/moderator/users/{id}", delete(handlers::deactivate_user))
}

fn admin() -> Router<AppState> {
    Router::new()
        .route("/movies", post(handlers::create_movie))
        .route(
            "/movies/{id}",
            put(handlers::update_movie).delete(handlers::delete_movie),
        )
}

/// api_routes
///
/// The JSON API, to be nested under `/api/v1`. Groups sharing a path (`/movies`,
/// `/reviews`) are merged per method, so a public GET and an admin POST on the same
/// path keep their own gates. Unknown paths get a JSON 404 and a known path under
/// the wrong method gets a JSON 405, ahead of any gate.
pub fn api_routes() -> Router<AppState> {
    public()
        .merge(gates::apply(member(), &[Gate::auth_api()]))
        .merge(gates::apply(
            moderator(),
            &[Gate::auth_api(), Gate::role_api(&[Role::Moderator])],
        ))
        .merge(gates::apply(
            admin(),
            &[Gate::auth_api(), Gate::role_api(&[Role::Admin])],
        ))
        .fallback(handlers::api_not_found)
        .method_not_allowed_fallback(handlers::api_method_not_allowed)
}
