use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// Role
///
/// Coarse capability label carried in the session and on the `"user".role` column.
/// Roles are compared by exact membership in an allowed set, never by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the three known role names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `"user"` table. The password hash is never serialized.
/// `role` stays a plain string at the storage boundary and is parsed into [`Role`]
/// when a session is created.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Display name stored in the session as `name`.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Movie
///
/// A row of the `movie` table. Most metadata is optional because admin-created
/// records only carry what was typed into the form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Movie {
    pub movie_id: Uuid,
    pub imdb_id: Option<String>,
    pub title: String,
    pub overview: Option<String>,
    #[ts(type = "string | null")]
    pub release_date: Option<NaiveDate>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub popularity: Option<f64>,
    pub runtime: Option<i32>,
    pub status: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Review
///
/// A review joined with its author's public profile fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub content: String,
    pub contains_spoilers: bool,
    pub is_public: bool,
    pub likes_count: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded via a JOIN on "user"; empty on freshly inserted rows.
    #[sqlx(default)]
    pub username: String,
    #[sqlx(default)]
    pub avatar_url: Option<String>,
}

/// WatchlistItem
///
/// One entry of a user's watchlist, with the movie embedded for display.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct WatchlistItem {
    pub watch_list_id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    #[ts(type = "string")]
    pub added_at: DateTime<Utc>,
    pub movie: Movie,
}

// --- Repository Parameter Types ---

/// Fields needed to insert a user. The hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub role: Role,
}

/// Movie fields accepted on create and update.
/// Create applies the catalog defaults via [`MovieInput::with_create_defaults`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct MovieInput {
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i32>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MovieInput {
    pub const DEFAULT_RUNTIME: i32 = 120;
    pub const DEFAULT_STATUS: &'static str = "Released";

    pub fn with_create_defaults(mut self) -> Self {
        self.vote_count.get_or_insert(0);
        self.popularity.get_or_insert(0.0);
        self.runtime.get_or_insert(Self::DEFAULT_RUNTIME);
        self.status_or_default();
        self
    }

    /// Blank status means "Released", both on create and update.
    pub fn status_or_default(&mut self) {
        if self.status.as_deref().is_none_or(|s| s.trim().is_empty()) {
            self.status = Some(Self::DEFAULT_STATUS.to_string());
        }
    }
}

/// Parameters for inserting a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub content: String,
    pub contains_spoilers: bool,
    pub is_public: bool,
}

/// Reviews are scored on a 1..=10 scale.
pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

// --- API Request Payloads (Input Schemas) ---

/// CreateReviewRequest
///
/// Input payload for POST /api/v1/reviews.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateReviewRequest {
    pub movie_id: String,
    pub rating: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub contains_spoilers: bool,
}

/// AddToWatchlistRequest
///
/// Input payload for POST /api/v1/watchlist.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddToWatchlistRequest {
    pub movie_id: String,
}

/// UpdateRoleRequest
///
/// Input payload for PUT /api/v1/moderator/users/{id}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: String,
}

// --- API Response Payloads (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: usize,
}

/// MovieListResponse
///
/// Output of GET /api/v1/movies.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MovieListResponse {
    pub movies: Vec<Movie>,
    pub pagination: Pagination,
}

/// MeResponse
///
/// The caller's identity as resolved by the authentication gate.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub name: String,
}

/// Generic acknowledgement for mutations that have nothing else to return.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

/// Output of DELETE /api/v1/watchlist/{movie_id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// Body of every JSON error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

// --- Pagination ---

/// Page/limit query parameters shared by the browser and API movie lists.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;
    /// Highest page whose offset still fits in an `i64` at any allowed limit.
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_LIMIT;

    /// Clamps to `1 <= page <= MAX_PAGE` and `1 <= limit <= 100`, falling back to 20.
    pub fn normalized(&self) -> (i64, i64) {
        let page = self
            .page
            .filter(|p| *p >= 1)
            .unwrap_or(1)
            .min(Self::MAX_PAGE);
        let limit = self
            .limit
            .filter(|l| (1..=Self::MAX_LIMIT).contains(l))
            .unwrap_or(Self::DEFAULT_LIMIT);
        (page, limit)
    }

    pub fn offset(&self) -> i64 {
        let (page, limit) = self.normalized();
        (page - 1) * limit
    }
}
