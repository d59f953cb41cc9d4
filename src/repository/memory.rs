use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::error::RepoError;
use crate::models::{Movie, MovieInput, NewReview, NewUser, Review, Role, User, WatchlistItem};

#[derive(Debug, Clone)]
struct WatchlistEntry {
    watch_list_id: Uuid,
    user_id: Uuid,
    movie_id: Uuid,
    added_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    movies: Vec<Movie>,
    reviews: Vec<Review>,
    watchlist: Vec<WatchlistEntry>,
}

/// MemoryRepository
///
/// In-process `Repository` used for local runs without `DATABASE_URL` and by the test
/// suites. Mirrors the Postgres semantics: inactive users are invisible, lists are
/// newest first, watchlist entries are unique per (user, movie).
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    unavailable: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose every call fails like a lost database connection.
    pub fn unavailable() -> Self {
        Self {
            tables: RwLock::default(),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.unavailable {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn with_author(tables: &Tables, mut review: Review) -> Review {
        if let Some(author) = tables.users.iter().find(|u| u.user_id == review.user_id) {
            review.username = author.username.clone();
            review.avatar_url = author.avatar_url.clone();
        }
        review
    }

    fn item(tables: &Tables, entry: &WatchlistEntry) -> Option<WatchlistItem> {
        let movie = tables.movies.iter().find(|m| m.movie_id == entry.movie_id)?;
        Some(WatchlistItem {
            watch_list_id: entry.watch_list_id,
            user_id: entry.user_id,
            movie_id: entry.movie_id,
            added_at: entry.added_at,
            movie: movie.clone(),
        })
    }

    fn active_user_mut(tables: &mut Tables, id: Uuid) -> Option<&mut User> {
        tables.users.iter_mut().find(|u| u.user_id == id && u.is_active)
    }
}

fn page<T: Clone>(rows: &[T], limit: i64, offset: i64) -> Vec<T> {
    rows.iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .users
            .iter()
            .find(|u| u.email == email && u.is_active)
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .users
            .iter()
            .find(|u| u.user_id == id && u.is_active)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        // The unique index covers inactive accounts too.
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict("Email already registered".to_string()));
        }
        let now = Utc::now();
        let created = User {
            user_id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            role: user.role.as_str().to_string(),
            is_active: true,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        tables.users.insert(0, created.clone());
        Ok(created)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), RepoError> {
        self.check()?;
        if let Some(user) = Self::active_user_mut(&mut self.tables.write(), id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
        username: &str,
    ) -> Result<bool, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let Some(user) = Self::active_user_mut(&mut tables, id) else {
            return Ok(false);
        };
        user.first_name = first_name.to_string();
        user.last_name = last_name.to_string();
        user.username = username.to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let Some(user) = Self::active_user_mut(&mut tables, id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        let active: Vec<User> = tables.users.iter().filter(|u| u.is_active).cloned().collect();
        Ok(page(&active, limit, offset))
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<bool, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let Some(user) = Self::active_user_mut(&mut tables, id) else {
            return Ok(false);
        };
        user.role = role.as_str().to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn deactivate_user(&self, id: Uuid) -> Result<bool, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let Some(user) = Self::active_user_mut(&mut tables, id) else {
            return Ok(false);
        };
        user.is_active = false;
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_movies(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, RepoError> {
        self.check()?;
        Ok(page(&self.tables.read().movies, limit, offset))
    }

    async fn count_movies(&self) -> Result<usize, RepoError> {
        self.check()?;
        Ok(self.tables.read().movies.len())
    }

    async fn get_movie(&self, id: Uuid) -> Result<Option<Movie>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables.movies.iter().find(|m| m.movie_id == id).cloned())
    }

    async fn create_movie(&self, input: MovieInput) -> Result<Movie, RepoError> {
        self.check()?;
        let input = input.with_create_defaults();
        let movie = Movie {
            movie_id: Uuid::new_v4(),
            imdb_id: input.imdb_id,
            title: input.title,
            overview: input.overview,
            release_date: input.release_date,
            poster_path: None,
            backdrop_path: None,
            vote_average: input.vote_average,
            vote_count: input.vote_count,
            popularity: input.popularity,
            runtime: input.runtime,
            status: input.status,
            created_at: Utc::now(),
        };
        self.tables.write().movies.insert(0, movie.clone());
        Ok(movie)
    }

    async fn update_movie(&self, id: Uuid, mut input: MovieInput) -> Result<Option<Movie>, RepoError> {
        self.check()?;
        input.status_or_default();
        let mut tables = self.tables.write();
        let Some(movie) = tables.movies.iter_mut().find(|m| m.movie_id == id) else {
            return Ok(None);
        };
        movie.title = input.title;
        if input.overview.is_some() {
            movie.overview = input.overview;
        }
        if input.release_date.is_some() {
            movie.release_date = input.release_date;
        }
        if input.imdb_id.is_some() {
            movie.imdb_id = input.imdb_id;
        }
        if input.vote_average.is_some() {
            movie.vote_average = input.vote_average;
        }
        if input.vote_count.is_some() {
            movie.vote_count = input.vote_count;
        }
        if input.popularity.is_some() {
            movie.popularity = input.popularity;
        }
        if input.runtime.is_some() {
            movie.runtime = input.runtime;
        }
        movie.status = input.status;
        Ok(Some(movie.clone()))
    }

    async fn delete_movie(&self, id: Uuid) -> Result<bool, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let before = tables.movies.len();
        tables.movies.retain(|m| m.movie_id != id);
        let removed = tables.movies.len() < before;
        if removed {
            // ON DELETE CASCADE
            tables.reviews.retain(|r| r.movie_id != id);
            tables.watchlist.retain(|w| w.movie_id != id);
        }
        Ok(removed)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let created = Review {
            review_id: Uuid::new_v4(),
            user_id: review.user_id,
            movie_id: review.movie_id,
            rating: review.rating,
            title: review.title,
            content: review.content,
            contains_spoilers: review.contains_spoilers,
            is_public: review.is_public,
            likes_count: 0,
            created_at: Utc::now(),
            username: String::new(),
            avatar_url: None,
        };
        let created = Self::with_author(&tables, created);
        tables.reviews.insert(0, created.clone());
        Ok(created)
    }

    async fn get_movie_reviews(&self, movie_id: Uuid) -> Result<Vec<Review>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.movie_id == movie_id && r.is_public)
            .map(|r| Self::with_author(&tables, r.clone()))
            .collect())
    }

    async fn get_user_reviews(&self, user_id: Uuid) -> Result<Vec<Review>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .reviews
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| Self::with_author(&tables, r.clone()))
            .collect())
    }

    async fn add_to_watchlist(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<(WatchlistItem, bool), RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        if let Some(entry) = tables
            .watchlist
            .iter()
            .find(|w| w.user_id == user_id && w.movie_id == movie_id)
        {
            if let Some(item) = Self::item(&tables, entry) {
                return Ok((item, false));
            }
        }
        let entry = WatchlistEntry {
            watch_list_id: Uuid::new_v4(),
            user_id,
            movie_id,
            added_at: Utc::now(),
        };
        // Mirrors the foreign key on watch_list.movie_id.
        let item = Self::item(&tables, &entry).ok_or(RepoError::Database(sqlx::Error::RowNotFound))?;
        tables.watchlist.insert(0, entry);
        Ok((item, true))
    }

    async fn get_watchlist(&self, user_id: Uuid) -> Result<Vec<WatchlistItem>, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .watchlist
            .iter()
            .filter(|w| w.user_id == user_id)
            .filter_map(|w| Self::item(&tables, w))
            .collect())
    }

    async fn remove_from_watchlist(&self, user_id: Uuid, movie_id: Uuid) -> Result<bool, RepoError> {
        self.check()?;
        let mut tables = self.tables.write();
        let before = tables.watchlist.len();
        tables
            .watchlist
            .retain(|w| !(w.user_id == user_id && w.movie_id == movie_id));
        Ok(tables.watchlist.len() < before)
    }

    async fn in_watchlist(&self, user_id: Uuid, movie_id: Uuid) -> Result<bool, RepoError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .watchlist
            .iter()
            .any(|w| w.user_id == user_id && w.movie_id == movie_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            username: "ann".to_string(),
            role: Role::User,
        }
    }

    fn movie(title: &str) -> MovieInput {
        MovieInput {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = MemoryRepository::new();
        repo.create_user(new_user("a@example.com")).await.unwrap();
        let err = repo.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivated_users_disappear_from_lookups() {
        let repo = MemoryRepository::new();
        let user = repo.create_user(new_user("b@example.com")).await.unwrap();
        assert!(repo.deactivate_user(user.user_id).await.unwrap());

        assert!(repo.get_user(user.user_id).await.unwrap().is_none());
        assert!(repo.get_user_by_email("b@example.com").await.unwrap().is_none());
        assert!(repo.list_users(50, 0).await.unwrap().is_empty());
        assert!(!repo.deactivate_user(user.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn watchlist_add_is_idempotent() {
        let repo = MemoryRepository::new();
        let user = Uuid::new_v4();
        let m = repo.create_movie(movie("Alien")).await.unwrap();

        let (first, inserted) = repo.add_to_watchlist(user, m.movie_id).await.unwrap();
        assert!(inserted);
        let (second, inserted) = repo.add_to_watchlist(user, m.movie_id).await.unwrap();
        assert!(!inserted);
        assert_eq!(first.watch_list_id, second.watch_list_id);
        assert_eq!(repo.get_watchlist(user).await.unwrap().len(), 1);

        assert!(repo.remove_from_watchlist(user, m.movie_id).await.unwrap());
        assert!(!repo.in_watchlist(user, m.movie_id).await.unwrap());
    }

    #[tokio::test]
    async fn watchlist_rejects_unknown_movies() {
        let repo = MemoryRepository::new();
        assert!(repo.add_to_watchlist(Uuid::new_v4(), Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn update_keeps_omitted_fields() {
        let repo = MemoryRepository::new();
        let created = repo
            .create_movie(MovieInput {
                overview: Some("In space".into()),
                ..movie("Alien")
            })
            .await
            .unwrap();
        assert_eq!(created.runtime, Some(MovieInput::DEFAULT_RUNTIME));

        let updated = repo
            .update_movie(created.movie_id, movie("Aliens"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Aliens");
        assert_eq!(updated.overview.as_deref(), Some("In space"));
        assert_eq!(updated.status.as_deref(), Some("Released"));
        assert!(repo.update_movie(Uuid::new_v4(), movie("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn movie_reviews_are_public_only_and_carry_the_author() {
        let repo = MemoryRepository::new();
        let author = repo.create_user(new_user("c@example.com")).await.unwrap();
        let m = repo.create_movie(movie("Heat")).await.unwrap();
        for is_public in [true, false] {
            repo.create_review(NewReview {
                user_id: author.user_id,
                movie_id: m.movie_id,
                rating: 8,
                title: "t".into(),
                content: "c".into(),
                contains_spoilers: false,
                is_public,
            })
            .await
            .unwrap();
        }

        let public = repo.get_movie_reviews(m.movie_id).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].username, "ann");
        assert_eq!(repo.get_user_reviews(author.user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unavailable_repository_fails_every_call() {
        let repo = MemoryRepository::unavailable();
        assert!(matches!(
            repo.list_movies(10, 0).await,
            Err(RepoError::Database(_))
        ));
    }
}
