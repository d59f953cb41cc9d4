use crate::error::RepoError;
use crate::models::{Movie, MovieInput, NewReview, NewUser, Review, Role, User, WatchlistItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;

pub use memory::MemoryRepository;

/// Repository Trait
///
/// The persistence contract used by every handler. Lookups of users only ever see
/// active accounts; a deactivated user is indistinguishable from a missing one.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    /// Fails with `RepoError::Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn update_last_login(&self, id: Uuid) -> Result<(), RepoError>;
    async fn update_profile(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
        username: &str,
    ) -> Result<bool, RepoError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, RepoError>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError>;
    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<bool, RepoError>;
    async fn deactivate_user(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Movies ---
    async fn list_movies(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, RepoError>;
    async fn count_movies(&self) -> Result<usize, RepoError>;
    async fn get_movie(&self, id: Uuid) -> Result<Option<Movie>, RepoError>;
    async fn create_movie(&self, input: MovieInput) -> Result<Movie, RepoError>;
    async fn update_movie(&self, id: Uuid, input: MovieInput) -> Result<Option<Movie>, RepoError>;
    async fn delete_movie(&self, id: Uuid) -> Result<bool, RepoError>;

    // --- Reviews ---
    async fn create_review(&self, review: NewReview) -> Result<Review, RepoError>;
    /// Public reviews of a movie, newest first.
    async fn get_movie_reviews(&self, movie_id: Uuid) -> Result<Vec<Review>, RepoError>;
    async fn get_user_reviews(&self, user_id: Uuid) -> Result<Vec<Review>, RepoError>;

    // --- Watchlist ---
    /// Idempotent: the flag is `true` only when a new entry was inserted.
    async fn add_to_watchlist(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<(WatchlistItem, bool), RepoError>;
    async fn get_watchlist(&self, user_id: Uuid) -> Result<Vec<WatchlistItem>, RepoError>;
    async fn remove_from_watchlist(&self, user_id: Uuid, movie_id: Uuid) -> Result<bool, RepoError>;
    async fn in_watchlist(&self, user_id: Uuid, movie_id: Uuid) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer held in the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = r#"user_id, email, password_hash, first_name, last_name, username,
    role, is_active, avatar_url, created_at, updated_at, last_login_at"#;

const MOVIE_COLUMNS: &str = r#"movie_id, imdb_id, title, overview, release_date, poster_path,
    backdrop_path, vote_average, vote_count, popularity, runtime, status, created_at"#;

const REVIEW_COLUMNS: &str = r#"r.review_id, r.user_id, r.movie_id, r.rating, r.title, r.content,
    r.contains_spoilers, r.is_public, r.likes_count, r.created_at,
    u.username, u.avatar_url"#;

/// Watchlist row joined with its movie.
#[derive(FromRow)]
struct WatchlistRow {
    watch_list_id: Uuid,
    user_id: Uuid,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    movie: Movie,
}

impl From<WatchlistRow> for WatchlistItem {
    fn from(row: WatchlistRow) -> Self {
        WatchlistItem {
            watch_list_id: row.watch_list_id,
            user_id: row.user_id,
            movie_id: row.movie.movie_id,
            added_at: row.added_at,
            movie: row.movie,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// PostgresRepository
///
/// `Repository` backed by the PostgreSQL connection pool. Queries are checked at run
/// time so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn watchlist_entry(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<WatchlistItem>, RepoError> {
        let sql = format!(
            r#"SELECT w.watch_list_id, w.user_id, w.added_at, {MOVIE_COLUMNS}
               FROM watch_list w
               JOIN movie USING (movie_id)
               WHERE w.user_id = $1 AND w.movie_id = $2"#
        );
        let row = sqlx::query_as::<_, WatchlistRow>(&sql)
            .bind(user_id)
            .bind(movie_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(WatchlistItem::from))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE email = $1 AND is_active = true"#);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE user_id = $1 AND is_active = true"#);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"INSERT INTO "user" (email, password_hash, first_name, last_name, username, role)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.username)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepoError::Conflict("Email already registered".to_string())
                } else {
                    RepoError::Database(e)
                }
            })
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query(r#"UPDATE "user" SET last_login_at = NOW() WHERE user_id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
        username: &str,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE "user"
               SET first_name = $2, last_name = $3, username = $4, updated_at = NOW()
               WHERE user_id = $1 AND is_active = true"#,
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE "user" SET password_hash = $2, updated_at = NOW()
               WHERE user_id = $1 AND is_active = true"#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM "user"
               WHERE is_active = true
               ORDER BY created_at DESC
               LIMIT $1 OFFSET $2"#
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE "user" SET role = $2, updated_at = NOW()
               WHERE user_id = $1 AND is_active = true"#,
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE "user" SET is_active = false, updated_at = NOW()
               WHERE user_id = $1 AND is_active = true"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_movies(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, RepoError> {
        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movie ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let movies = sqlx::query_as::<_, Movie>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(movies)
    }

    async fn count_movies(&self) -> Result<usize, RepoError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movie")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn get_movie(&self, id: Uuid) -> Result<Option<Movie>, RepoError> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movie WHERE movie_id = $1");
        let movie = sqlx::query_as::<_, Movie>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(movie)
    }

    async fn create_movie(&self, input: MovieInput) -> Result<Movie, RepoError> {
        let input = input.with_create_defaults();
        let sql = format!(
            r#"INSERT INTO movie (title, overview, release_date, imdb_id, vote_average,
                                  vote_count, popularity, runtime, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {MOVIE_COLUMNS}"#
        );
        let movie = sqlx::query_as::<_, Movie>(&sql)
            .bind(&input.title)
            .bind(&input.overview)
            .bind(input.release_date)
            .bind(&input.imdb_id)
            .bind(input.vote_average)
            .bind(input.vote_count)
            .bind(input.popularity)
            .bind(input.runtime)
            .bind(&input.status)
            .fetch_one(&self.pool)
            .await?;
        Ok(movie)
    }

    async fn update_movie(&self, id: Uuid, mut input: MovieInput) -> Result<Option<Movie>, RepoError> {
        input.status_or_default();
        // Optional fields left out of the request keep their stored values.
        let sql = format!(
            r#"UPDATE movie SET
                   title = $2,
                   overview = COALESCE($3, overview),
                   release_date = COALESCE($4, release_date),
                   imdb_id = COALESCE($5, imdb_id),
                   vote_average = COALESCE($6, vote_average),
                   vote_count = COALESCE($7, vote_count),
                   popularity = COALESCE($8, popularity),
                   runtime = COALESCE($9, runtime),
                   status = $10
               WHERE movie_id = $1
               RETURNING {MOVIE_COLUMNS}"#
        );
        let movie = sqlx::query_as::<_, Movie>(&sql)
            .bind(id)
            .bind(&input.title)
            .bind(&input.overview)
            .bind(input.release_date)
            .bind(&input.imdb_id)
            .bind(input.vote_average)
            .bind(input.vote_count)
            .bind(input.popularity)
            .bind(input.runtime)
            .bind(&input.status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(movie)
    }

    async fn delete_movie(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM movie WHERE movie_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepoError> {
        let sql = format!(
            r#"WITH r AS (
                   INSERT INTO review (user_id, movie_id, rating, title, content,
                                       contains_spoilers, is_public)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   RETURNING *
               )
               SELECT {REVIEW_COLUMNS} FROM r JOIN "user" u ON r.user_id = u.user_id"#
        );
        let created = sqlx::query_as::<_, Review>(&sql)
            .bind(review.user_id)
            .bind(review.movie_id)
            .bind(review.rating)
            .bind(&review.title)
            .bind(&review.content)
            .bind(review.contains_spoilers)
            .bind(review.is_public)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn get_movie_reviews(&self, movie_id: Uuid) -> Result<Vec<Review>, RepoError> {
        let sql = format!(
            r#"SELECT {REVIEW_COLUMNS}
               FROM review r
               JOIN "user" u ON r.user_id = u.user_id
               WHERE r.movie_id = $1 AND r.is_public = true
               ORDER BY r.created_at DESC"#
        );
        let reviews = sqlx::query_as::<_, Review>(&sql)
            .bind(movie_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reviews)
    }

    async fn get_user_reviews(&self, user_id: Uuid) -> Result<Vec<Review>, RepoError> {
        let sql = format!(
            r#"SELECT {REVIEW_COLUMNS}
               FROM review r
               JOIN "user" u ON r.user_id = u.user_id
               WHERE r.user_id = $1
               ORDER BY r.created_at DESC"#
        );
        let reviews = sqlx::query_as::<_, Review>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reviews)
    }

    async fn add_to_watchlist(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<(WatchlistItem, bool), RepoError> {
        if let Some(existing) = self.watchlist_entry(user_id, movie_id).await? {
            return Ok((existing, false));
        }
        sqlx::query("INSERT INTO watch_list (user_id, movie_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        match self.watchlist_entry(user_id, movie_id).await? {
            Some(item) => Ok((item, true)),
            None => Err(RepoError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn get_watchlist(&self, user_id: Uuid) -> Result<Vec<WatchlistItem>, RepoError> {
        let sql = format!(
            r#"SELECT w.watch_list_id, w.user_id, w.added_at, {MOVIE_COLUMNS}
               FROM watch_list w
               JOIN movie USING (movie_id)
               WHERE w.user_id = $1
               ORDER BY w.added_at DESC"#
        );
        let rows = sqlx::query_as::<_, WatchlistRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(WatchlistItem::from).collect())
    }

    async fn remove_from_watchlist(&self, user_id: Uuid, movie_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM watch_list WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn in_watchlist(&self, user_id: Uuid, movie_id: Uuid) -> Result<bool, RepoError> {
        let (present,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM watch_list WHERE user_id = $1 AND movie_id = $2)",
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(present)
    }
}
