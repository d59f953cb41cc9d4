use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::{SessionAttributes, SessionError, SessionStore, session_lifetime};

#[derive(Debug, Clone)]
struct SessionRecord {
    values: Map<String, Value>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// MemorySessionStore
///
/// In-process session storage. Every operation takes the lock once, so a `put`
/// committed by one request is visible to the next request's `get`.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    lifetime: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_lifetime(session_lifetime())
    }

    /// Overrides the session lifetime. Used by tests to create already-expired sessions.
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Number of sessions held, live or not.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn new_token() -> String {
        // Two v4 UUIDs give 244 random bits.
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn live_record(&self, token: &str) -> Option<SessionRecord> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(token) {
                Some(record) if record.is_live(now) => return Some(record.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it so it reads as absent from here on.
        self.sessions.write().remove(token);
        None
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, attributes: SessionAttributes) -> Result<String, SessionError> {
        let token = Self::new_token();
        let values = attributes
            .into_values()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let record = SessionRecord {
            values,
            expires_at: Utc::now() + self.lifetime,
        };
        self.sessions.write().insert(token.clone(), record);
        Ok(token)
    }

    async fn get(&self, token: &str, key: &str) -> Option<Value> {
        self.live_record(token)
            .and_then(|record| record.values.get(key).cloned())
    }

    async fn put(&self, token: &str, key: &str, value: Value) -> Result<(), SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        if let Some(record) = sessions.get_mut(token).filter(|r| r.is_live(now)) {
            record.values.insert(key.to_string(), value);
        }
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<(), SessionError> {
        self.sessions.write().remove(token);
        Ok(())
    }

    async fn expires_at(&self, token: &str) -> Option<DateTime<Utc>> {
        self.live_record(token).map(|record| record.expires_at)
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| record.is_live(now));
        before - sessions.len()
    }
}
