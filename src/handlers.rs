use crate::{
    AppState,
    auth::Identity,
    error::ApiError,
    models::{
        AddToWatchlistRequest, CreateReviewRequest, ErrorBody, MeResponse, Movie, MovieInput,
        MovieListResponse, NewReview, PageQuery, Pagination, RATING_RANGE, RemovedResponse, Review,
        Role, StatusResponse, UpdateRoleRequest, User, WatchlistItem,
    },
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

/// Users returned by the moderation listing.
const MODERATOR_LIST_LIMIT: i64 = 50;

// --- Filter Structs ---

/// ReviewFilter
///
/// Query parameters for GET /reviews. `movie_id` is required; it is optional here so
/// a missing value becomes a JSON 400 rather than an extractor rejection.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewFilter {
    pub movie_id: Option<String>,
}

// --- Boundary helpers ---

/// Unwraps a JSON body, turning any rejection into the API's 400 shape.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!("rejected request body: {}", rejection.body_text());
        ApiError::BadRequest("Invalid request body".to_string())
    })
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    raw.trim()
        .parse::<Uuid>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} ID", what)))
}

async fn existing_movie(state: &AppState, movie_id: Uuid) -> Result<Movie, ApiError> {
    state
        .repo
        .get_movie(movie_id)
        .await
        .map_err(|e| ApiError::from_repo("fetch movie", e))?
        .ok_or_else(|| ApiError::NotFound("Movie not found".to_string()))
}

// --- Public ---

/// list_movies
///
/// [Public Route] Paginated catalog, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/movies",
    params(PageQuery),
    responses(
        (status = 200, description = "Movies", body = MovieListResponse),
        (status = 400, description = "Bad query", body = ErrorBody)
    )
)]
pub async fn list_movies(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<MovieListResponse>, ApiError> {
    let Query(query) =
        query.map_err(|_| ApiError::BadRequest("Invalid pagination parameters".to_string()))?;
    let (page, limit) = query.normalized();

    let movies = state
        .repo
        .list_movies(limit, query.offset())
        .await
        .map_err(|e| ApiError::from_repo("fetch movies", e))?;
    let total = state
        .repo
        .count_movies()
        .await
        .map_err(|e| ApiError::from_repo("fetch movies", e))?;

    Ok(Json(MovieListResponse {
        movies,
        pagination: Pagination { page, limit, total },
    }))
}

/// get_movie
///
/// [Public Route] A single movie.
#[utoipa::path(
    get,
    path = "/api/v1/movies/{id}",
    responses(
        (status = 200, description = "Movie", body = Movie),
        (status = 400, description = "Invalid movie ID", body = ErrorBody),
        (status = 404, description = "Movie not found", body = ErrorBody)
    )
)]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    let movie_id = parse_uuid(&raw_id, "movie")?;
    existing_movie(&state, movie_id).await.map(Json)
}

/// list_reviews
///
/// [Public Route] Public reviews of one movie, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/reviews",
    params(ReviewFilter),
    responses(
        (status = 200, description = "Reviews", body = [Review]),
        (status = 400, description = "Missing or invalid movie_id", body = ErrorBody)
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let raw = filter
        .movie_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("movie_id parameter is required".to_string()))?;
    let movie_id = parse_uuid(&raw, "movie")?;

    let reviews = state
        .repo
        .get_movie_reviews(movie_id)
        .await
        .map_err(|e| ApiError::from_repo("fetch reviews", e))?;
    Ok(Json(reviews))
}

// --- Authenticated ---

/// get_me
///
/// [Authenticated Route] The identity attached by the authentication gate.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn get_me(identity: Identity) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: identity.user_id,
        email: identity.email,
        role: identity.role,
        name: identity.name,
    })
}

/// create_review
///
/// [Authenticated Route] Posts a public review by the caller.
#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Invalid body, movie ID or rating", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Movie not found", body = ErrorBody)
    )
)]
pub async fn create_review(
    identity: Identity,
    State(state): State<AppState>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let request = json_body(payload)?;
    let movie_id = parse_uuid(&request.movie_id, "movie")?;
    if !RATING_RANGE.contains(&request.rating) {
        return Err(ApiError::BadRequest("Rating must be between 1 and 10".to_string()));
    }
    existing_movie(&state, movie_id).await?;

    let review = state
        .repo
        .create_review(NewReview {
            user_id: identity.user_id,
            movie_id,
            rating: request.rating,
            title: request.title,
            content: request.content,
            contains_spoilers: request.contains_spoilers,
            is_public: true,
        })
        .await
        .map_err(|e| ApiError::from_repo("create review", e))?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// get_watchlist
///
/// [Authenticated Route] The caller's watchlist, most recently added first.
#[utoipa::path(
    get,
    path = "/api/v1/watchlist",
    responses(
        (status = 200, description = "Watchlist", body = [WatchlistItem]),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn get_watchlist(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<WatchlistItem>>, ApiError> {
    let items = state
        .repo
        .get_watchlist(identity.user_id)
        .await
        .map_err(|e| ApiError::from_repo("fetch watchlist", e))?;
    Ok(Json(items))
}

/// add_to_watchlist
///
/// [Authenticated Route] Idempotent: 201 for a new entry, 200 with the existing
/// entry when the movie is already listed.
#[utoipa::path(
    post,
    path = "/api/v1/watchlist",
    request_body = AddToWatchlistRequest,
    responses(
        (status = 201, description = "Added", body = WatchlistItem),
        (status = 200, description = "Already present", body = WatchlistItem),
        (status = 400, description = "Invalid body or movie ID", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Movie not found", body = ErrorBody)
    )
)]
pub async fn add_to_watchlist(
    identity: Identity,
    State(state): State<AppState>,
    payload: Result<Json<AddToWatchlistRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WatchlistItem>), ApiError> {
    let request = json_body(payload)?;
    let movie_id = parse_uuid(&request.movie_id, "movie")?;
    existing_movie(&state, movie_id).await?;

    let (item, inserted) = state
        .repo
        .add_to_watchlist(identity.user_id, movie_id)
        .await
        .map_err(|e| ApiError::from_repo("add to watchlist", e))?;
    let status = if inserted { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(item)))
}

/// remove_from_watchlist
///
/// [Authenticated Route] Removes one movie from the caller's watchlist.
#[utoipa::path(
    delete,
    path = "/api/v1/watchlist/{movie_id}",
    responses(
        (status = 200, description = "Removed", body = RemovedResponse),
        (status = 400, description = "Invalid movie ID", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Not in watchlist", body = ErrorBody)
    )
)]
pub async fn remove_from_watchlist(
    identity: Identity,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let movie_id = parse_uuid(&raw_id, "movie")?;
    let removed = state
        .repo
        .remove_from_watchlist(identity.user_id, movie_id)
        .await
        .map_err(|e| ApiError::from_repo("remove from watchlist", e))?;
    if !removed {
        return Err(ApiError::NotFound("Movie not in watchlist".to_string()));
    }
    Ok(Json(RemovedResponse { removed }))
}

// --- Moderator ---

/// list_users
///
/// [Moderator Route] Active users, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/moderator/users",
    responses(
        (status = 200, description = "Users", body = [User]),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .repo
        .list_users(MODERATOR_LIST_LIMIT, 0)
        .await
        .map_err(|e| ApiError::from_repo("fetch users", e))?;
    Ok(Json(users))
}

/// update_user_role
///
/// [Moderator Route] Changes another user's role. Moderators cannot change their own.
#[utoipa::path(
    put,
    path = "/api/v1/moderator/users/{id}/role",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = StatusResponse),
        (status = 400, description = "Own account, invalid ID or invalid role", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn update_user_role(
    identity: Identity,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user_id = parse_uuid(&raw_id, "user")?;
    if user_id == identity.user_id {
        return Err(ApiError::BadRequest("Cannot change your own role".to_string()));
    }
    let request = json_body(payload)?;
    let role = request
        .role
        .parse::<Role>()
        .map_err(|_| ApiError::BadRequest("Invalid role".to_string()))?;

    let updated = state
        .repo
        .update_user_role(user_id, role)
        .await
        .map_err(|e| ApiError::from_repo("update user role", e))?;
    if !updated {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    tracing::info!("{} changed role of {} to {}", identity.email, user_id, role);
    Ok(Json(StatusResponse::success("User role updated")))
}

/// deactivate_user
///
/// [Moderator Route] Soft-deletes another user. Moderators cannot deactivate themselves.
#[utoipa::path(
    delete,
    path = "/api/v1/moderator/users/{id}",
    responses(
        (status = 200, description = "User deactivated", body = StatusResponse),
        (status = 400, description = "Invalid user ID", body = ErrorBody),
        (status = 403, description = "Own account or insufficient privileges", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn deactivate_user(
    identity: Identity,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user_id = parse_uuid(&raw_id, "user")?;
    if user_id == identity.user_id {
        return Err(ApiError::ForbiddenAction("Cannot deactivate yourself".to_string()));
    }
    let deactivated = state
        .repo
        .deactivate_user(user_id)
        .await
        .map_err(|e| ApiError::from_repo("deactivate user", e))?;
    if !deactivated {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    tracing::info!("{} deactivated user {}", identity.email, user_id);
    Ok(Json(StatusResponse::success("User deactivated")))
}

// --- Admin ---

fn validated_movie(input: MovieInput) -> Result<MovieInput, ApiError> {
    if input.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    if input.vote_average.is_some_and(|v| !(0.0..=10.0).contains(&v)) {
        return Err(ApiError::BadRequest("vote_average must be between 0 and 10".to_string()));
    }
    Ok(MovieInput {
        title: input.title.trim().to_string(),
        ..input
    })
}

/// create_movie
///
/// [Admin Route] Adds a movie. Missing counters, runtime and status take the catalog defaults.
#[utoipa::path(
    post,
    path = "/api/v1/movies",
    request_body = MovieInput,
    responses(
        (status = 201, description = "Movie created", body = Movie),
        (status = 400, description = "Invalid body", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody)
    )
)]
pub async fn create_movie(
    identity: Identity,
    State(state): State<AppState>,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Movie>), ApiError> {
    let input = validated_movie(json_body(payload)?)?;
    let movie = state
        .repo
        .create_movie(input)
        .await
        .map_err(|e| ApiError::from_repo("create movie", e))?;
    tracing::info!("{} created movie {} ({})", identity.email, movie.title, movie.movie_id);
    Ok((StatusCode::CREATED, Json(movie)))
}

/// update_movie
///
/// [Admin Route] Replaces the title and status; other fields change only when given.
#[utoipa::path(
    put,
    path = "/api/v1/movies/{id}",
    request_body = MovieInput,
    responses(
        (status = 200, description = "Movie updated", body = Movie),
        (status = 400, description = "Invalid body or movie ID", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody),
        (status = 404, description = "Movie not found", body = ErrorBody)
    )
)]
pub async fn update_movie(
    identity: Identity,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> Result<Json<Movie>, ApiError> {
    let movie_id = parse_uuid(&raw_id, "movie")?;
    let input = validated_movie(json_body(payload)?)?;
    let movie = state
        .repo
        .update_movie(movie_id, input)
        .await
        .map_err(|e| ApiError::from_repo("update movie", e))?
        .ok_or_else(|| ApiError::NotFound("Movie not found".to_string()))?;
    tracing::info!("{} updated movie {}", identity.email, movie_id);
    Ok(Json(movie))
}

/// delete_movie
///
/// [Admin Route] Deletes a movie together with its reviews and watchlist entries.
#[utoipa::path(
    delete,
    path = "/api/v1/movies/{id}",
    responses(
        (status = 200, description = "Movie deleted", body = StatusResponse),
        (status = 400, description = "Invalid movie ID", body = ErrorBody),
        (status = 403, description = "Insufficient privileges", body = ErrorBody),
        (status = 404, description = "Movie not found", body = ErrorBody)
    )
)]
pub async fn delete_movie(
    identity: Identity,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let movie_id = parse_uuid(&raw_id, "movie")?;
    let deleted = state
        .repo
        .delete_movie(movie_id)
        .await
        .map_err(|e| ApiError::from_repo("delete movie", e))?;
    if !deleted {
        return Err(ApiError::NotFound("Movie not found".to_string()));
    }
    tracing::info!("{} deleted movie {}", identity.email, movie_id);
    Ok(Json(StatusResponse::success("Movie deleted")))
}

/// api_not_found
///
/// JSON fallback for unknown paths under `/api/v1`.
pub async fn api_not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

/// Known path, unsupported method. Answered the same way for every caller.
pub async fn api_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_validation_trims_and_bounds() {
        let ok = validated_movie(MovieInput {
            title: "  Ran ".into(),
            vote_average: Some(8.2),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ok.title, "Ran");

        assert!(validated_movie(MovieInput::default()).is_err());
        assert!(
            validated_movie(MovieInput {
                title: "Ran".into(),
                vote_average: Some(11.0),
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn uuid_parsing_names_the_entity() {
        let err = parse_uuid("nope", "movie").unwrap_err();
        assert_eq!(err.to_string(), "Invalid movie ID");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
