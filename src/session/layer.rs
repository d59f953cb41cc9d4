use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use super::{SessionAttributes, SessionCookie, SessionStoreState, get_bool, get_string};

/// SessionManager
///
/// Pairs the session store with the cookie codec. Lives in the application state and
/// is handed to [`load_and_save`].
#[derive(Clone)]
pub struct SessionManager {
    store: SessionStoreState,
    cookie: SessionCookie,
}

impl SessionManager {
    pub fn new(store: SessionStoreState, cookie: SessionCookie) -> Self {
        Self { store, cookie }
    }

    pub fn store(&self) -> &SessionStoreState {
        &self.store
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    /// Resolves the request's cookie to a live store token.
    async fn load(&self, headers: &HeaderMap) -> Option<String> {
        let value = self.cookie.read(headers)?;
        let token = self.cookie.open(&value)?;
        // A validly signed cookie may still point at a destroyed or expired session.
        self.store.expires_at(&token).await.map(|_| token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Change {
    Untouched,
    Created,
    Destroyed,
}

struct SessionState {
    token: Option<String>,
    change: Change,
}

/// Session
///
/// The current request's view of its session. Cloned handles share state, so a
/// login performed by a handler is seen by the layer when it writes the cookie.
#[derive(Clone)]
pub struct Session {
    manager: SessionManager,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(manager: SessionManager, token: Option<String>) -> Self {
        Self {
            manager,
            state: Arc::new(Mutex::new(SessionState {
                token,
                change: Change::Untouched,
            })),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let token = self.token()?;
        self.manager.store.get(&token, key).await
    }

    pub async fn get_bool(&self, key: &str) -> bool {
        match self.token() {
            Some(token) => get_bool(self.manager.store.as_ref(), &token, key).await,
            None => false,
        }
    }

    pub async fn get_string(&self, key: &str) -> String {
        match self.token() {
            Some(token) => get_string(self.manager.store.as_ref(), &token, key).await,
            None => String::new(),
        }
    }

    pub async fn put(&self, key: &str, value: impl Into<Value>) {
        let Some(token) = self.token() else {
            return;
        };
        if let Err(e) = self.manager.store.put(&token, key, value.into()).await {
            tracing::warn!("session put {} failed: {}", key, e);
        }
    }

    /// Replaces any current session with a new authenticated one.
    ///
    /// Returns `false` when the store could not allocate a session; the request then
    /// continues logged out.
    pub async fn login(&self, attributes: SessionAttributes) -> bool {
        if let Some(old) = self.token() {
            if let Err(e) = self.manager.store.destroy(&old).await {
                tracing::warn!("failed to drop previous session: {}", e);
            }
        }
        match self.manager.store.create(attributes).await {
            Ok(token) => {
                let mut state = self.state.lock();
                state.token = Some(token);
                state.change = Change::Created;
                true
            }
            Err(e) => {
                tracing::warn!("session create failed: {}", e);
                let mut state = self.state.lock();
                state.token = None;
                state.change = Change::Destroyed;
                false
            }
        }
    }

    /// Invalidates the session; the layer clears the cookie on the way out.
    pub async fn destroy(&self) {
        let token = {
            let mut state = self.state.lock();
            state.change = Change::Destroyed;
            state.token.take()
        };
        if let Some(token) = token {
            if let Err(e) = self.manager.store.destroy(&token).await {
                tracing::warn!("session destroy failed: {}", e);
            }
        }
    }

    fn snapshot(&self) -> (Option<String>, Change) {
        let state = self.state.lock();
        (state.token.clone(), state.change)
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            tracing::error!("Session extractor used on a route without the session layer");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// load_and_save
///
/// Per-request session cycle: resolve the cookie to a live session, expose it as a
/// [`Session`] extension, run the rest of the stack, then write the cookie back.
/// A live session always gets its cookie re-issued with the remaining lifetime; a
/// destroyed (or stale) one gets a removal cookie.
pub async fn load_and_save(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let had_cookie = manager.cookie.read(request.headers()).is_some();
    let token = manager.load(request.headers()).await;

    let session = Session::new(manager.clone(), token);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let (token, change) = session.snapshot();
    let set_cookie = match token {
        Some(token) => match manager.store.expires_at(&token).await {
            Some(expires_at) => manager.cookie.seal(&token, expires_at).and_then(|value| {
                let max_age = (expires_at - Utc::now()).num_seconds();
                manager.cookie.set_header(&value, max_age)
            }),
            None => manager.cookie.removal_header(),
        },
        None if had_cookie || change == Change::Destroyed => manager.cookie.removal_header(),
        None => None,
    };

    if let Some(value) = set_cookie {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}
