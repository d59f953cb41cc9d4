//! Server-side sessions addressed by a cookie token.
//!
//! [`store`] holds the keyed attribute storage, [`cookie`] signs the token carried by
//! the browser, and [`layer`] runs the per-request load-then-save cycle that hands a
//! [`Session`] to gates and handlers.

pub mod cookie;
pub mod layer;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use cookie::{CookieConfig, SessionCookie};
pub use layer::{Session, SessionManager, load_and_save};
pub use store::MemorySessionStore;

use crate::models::Role;

/// Fixed lifetime of a session, counted from creation.
pub const SESSION_LIFETIME_HOURS: i64 = 24;

pub fn session_lifetime() -> Duration {
    Duration::hours(SESSION_LIFETIME_HOURS)
}

/// Attribute keys written on login and read by the gates.
pub mod keys {
    pub const AUTHENTICATED: &str = "authenticated";
    pub const USER_ID: &str = "user_id";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
    pub const NAME: &str = "name";
    pub const USERNAME: &str = "username";
}

/// SessionError
///
/// Failure of a session backend. Callers treat every variant as "no session".
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session backend unavailable: {0}")]
    Unavailable(String),
}

/// Attributes of a freshly authenticated session.
///
/// Building one is the only way to create a session through [`SessionStore::create`],
/// so an authenticated session always carries a user id, an email and a role.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAttributes {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub username: String,
}

impl SessionAttributes {
    /// Returns `None` when the user id or email is blank.
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        name: impl Into<String>,
        username: impl Into<String>,
    ) -> Option<Self> {
        let user_id = user_id.into();
        let email = email.into();
        if user_id.trim().is_empty() || email.trim().is_empty() {
            return None;
        }
        Some(Self {
            user_id,
            email,
            role,
            name: name.into(),
            username: username.into(),
        })
    }

    pub fn into_values(self) -> Vec<(&'static str, Value)> {
        vec![
            (keys::AUTHENTICATED, Value::Bool(true)),
            (keys::USER_ID, Value::String(self.user_id)),
            (keys::EMAIL, Value::String(self.email)),
            (keys::ROLE, Value::String(self.role.as_str().to_string())),
            (keys::NAME, Value::String(self.name)),
            (keys::USERNAME, Value::String(self.username)),
        ]
    }
}

/// SessionStore
///
/// Keyed storage of per-browser session attributes. Lookups never fail from the
/// caller's point of view: an absent, expired or unreachable session reads as empty.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocates a session expiring [`SESSION_LIFETIME_HOURS`] from now and returns its token.
    async fn create(&self, attributes: SessionAttributes) -> Result<String, SessionError>;

    /// Value of `key`, or `None` for absent/expired sessions and unset keys.
    async fn get(&self, token: &str, key: &str) -> Option<Value>;

    /// Inserts or overwrites `key`. Does nothing once the session is gone.
    async fn put(&self, token: &str, key: &str, value: Value) -> Result<(), SessionError>;

    /// Invalidates the session immediately.
    async fn destroy(&self, token: &str) -> Result<(), SessionError>;

    /// Expiry of a live session.
    async fn expires_at(&self, token: &str) -> Option<DateTime<Utc>>;

    /// Drops expired sessions, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// SessionStoreState
///
/// The shared handle to the store, cloned into the application state.
pub type SessionStoreState = Arc<dyn SessionStore>;

/// Reads a boolean attribute, defaulting to `false`.
pub async fn get_bool(store: &dyn SessionStore, token: &str, key: &str) -> bool {
    matches!(store.get(token, key).await, Some(Value::Bool(true)))
}

/// Reads a string attribute, defaulting to the empty string.
pub async fn get_string(store: &dyn SessionStore, token: &str, key: &str) -> String {
    match store.get(token, key).await {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}
