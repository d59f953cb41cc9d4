#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use movie_catalog::{
    AppConfig, AppState, MemoryRepository, MemorySessionStore, create_router,
    models::{Movie, MovieInput, NewUser, Role, User},
    session::{SessionAttributes, SessionError, SessionStore},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse";

pub fn test_state() -> AppState {
    AppState::in_memory(AppConfig::default())
}

pub fn failing_state() -> AppState {
    AppState::new(
        Arc::new(MemoryRepository::unavailable()),
        Arc::new(MemorySessionStore::new()),
        AppConfig::default(),
    )
}

/// Session backend that is down: reads find nothing and writes fail.
pub struct UnavailableSessionStore;

#[async_trait]
impl SessionStore for UnavailableSessionStore {
    async fn create(&self, _attributes: SessionAttributes) -> Result<String, SessionError> {
        Err(SessionError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _token: &str, _key: &str) -> Option<Value> {
        None
    }

    async fn put(&self, _token: &str, _key: &str, _value: Value) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("connection refused".to_string()))
    }

    async fn destroy(&self, _token: &str) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("connection refused".to_string()))
    }

    async fn expires_at(&self, _token: &str) -> Option<DateTime<Utc>> {
        None
    }

    async fn purge_expired(&self) -> usize {
        0
    }
}

/// Working repository, unreachable session backend.
pub fn session_outage_state() -> AppState {
    AppState::new(
        Arc::new(MemoryRepository::new()),
        Arc::new(UnavailableSessionStore),
        AppConfig::default(),
    )
}

pub fn app(state: &AppState) -> Router {
    create_router(state.clone())
}

/// Inserts an active user whose password is [`PASSWORD`].
pub async fn seed_user(state: &AppState, email: &str, role: Role) -> User {
    let password_hash = bcrypt::hash(PASSWORD, 4).unwrap();
    let username = email.split('@').next().unwrap_or(email).to_string();
    state
        .repo
        .create_user(NewUser {
            email: email.to_string(),
            password_hash,
            first_name: "Test".to_string(),
            last_name: role.as_str().to_string(),
            username,
            role,
        })
        .await
        .unwrap()
}

pub async fn seed_movie(state: &AppState, title: &str) -> Movie {
    state
        .repo
        .create_movie(MovieInput {
            title: title.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Creates a live session for `user` and returns the matching `Cookie` header value.
pub async fn login_cookie(state: &AppState, user: &User) -> String {
    let role: Role = user.role.parse().unwrap();
    let attributes = SessionAttributes::new(
        user.user_id.to_string(),
        user.email.clone(),
        role,
        user.display_name(),
        user.username.clone(),
    )
    .unwrap();
    let store = state.sessions.store();
    let token = store.create(attributes).await.unwrap();
    let expires_at = store.expires_at(&token).await.unwrap();
    let value = state.sessions.cookie().seal(&token, expires_at).unwrap();
    format!("{}={}", state.sessions.cookie().name(), value)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn json(method: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn bare(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// The `name=value` pair of the session `Set-Cookie` header, if one was sent.
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .map(|v| v.to_string())
}

/// Turns a `Set-Cookie` value into the `Cookie` header a browser would send back.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or("").to_string()
}
