use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pages;
pub mod password;
pub mod repository;
pub mod session;

// Route groups and the gates protecting them.
pub mod routes;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use session::{
    CookieConfig, MemorySessionStore, SessionCookie, SessionManager, SessionStoreState,
};

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_movies, handlers::get_movie, handlers::list_reviews,
        handlers::get_me, handlers::create_review, handlers::get_watchlist,
        handlers::add_to_watchlist, handlers::remove_from_watchlist,
        handlers::list_users, handlers::update_user_role, handlers::deactivate_user,
        handlers::create_movie, handlers::update_movie, handlers::delete_movie
    ),
    components(
        schemas(
            models::Movie, models::MovieInput, models::Review, models::WatchlistItem,
            models::User, models::Role, models::CreateReviewRequest,
            models::AddToWatchlistRequest, models::UpdateRoleRequest,
            models::MovieListResponse, models::Pagination, models::MeResponse,
            models::StatusResponse, models::RemovedResponse, models::ErrorBody,
        )
    ),
    tags(
        (name = "movie-catalog", description = "Movie Catalog API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once in `main` (or a test) and shared by
/// reference. There are no process-wide handles.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub sessions: SessionManager,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the session layer from the configuration: the cookie is signed with the
    /// session secret and marked `Secure` in production.
    pub fn new(repo: RepositoryState, store: SessionStoreState, config: AppConfig) -> Self {
        let cookie = SessionCookie::new(CookieConfig::new(
            config.session_secret.clone(),
            config.is_production(),
        ));
        Self {
            repo,
            sessions: SessionManager::new(store, cookie),
            config,
        }
    }

    /// In-memory collaborators, for local runs without a database and for tests.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemorySessionStore::new()),
            config,
        )
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(app_state: &AppState) -> SessionManager {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles browser pages, the JSON API and the documentation, then wraps them in
/// the session layer and the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::browser_routes())
        .nest("/api/v1", routes::api::api_routes())
        // Every request gets its session loaded before routing and saved after.
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session::load_and_save,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span per request carrying method, URI and the `x-request-id` set above, so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
