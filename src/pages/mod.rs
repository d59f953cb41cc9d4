//! Browser flow: HTML pages and form handlers.
//!
//! Pages are rendered as small self-contained documents. Every POST handler either
//! re-renders its form with an inline error or answers with a 303 redirect.

pub mod account;
pub mod admin;
pub mod catalog;
pub mod moderator;
pub mod profile;

use axum::response::{Html, IntoResponse, Redirect, Response};
use uuid::Uuid;

use crate::{auth::Identity, error::PageError, models::Role};

/// Escapes text for HTML element and attribute content.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn nav(identity: Option<&Identity>) -> String {
    let mut links = vec![r#"<a href="/">Home</a>"#.to_string()];
    match identity {
        Some(identity) => {
            links.push(r#"<a href="/dashboard">Dashboard</a>"#.to_string());
            links.push(r#"<a href="/movies">Movies</a>"#.to_string());
            links.push(r#"<a href="/watchlist">Watchlist</a>"#.to_string());
            links.push(r#"<a href="/profile">Profile</a>"#.to_string());
            match identity.role {
                Role::Admin => {
                    links.push(r#"<a href="/admin/movies">Manage movies</a>"#.to_string())
                }
                Role::Moderator => {
                    links.push(r#"<a href="/moderator/dashboard">Moderation</a>"#.to_string())
                }
                Role::User => {}
            }
            links.push(r#"<a href="/logout">Logout</a>"#.to_string());
        }
        None => {
            links.push(r#"<a href="/login">Login</a>"#.to_string());
            links.push(r#"<a href="/signup">Sign up</a>"#.to_string());
        }
    }
    format!("<nav>{}</nav>", links.join(" "))
}

/// Wraps `body` in the shared page chrome.
pub fn layout(title: &str, identity: Option<&Identity>, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
{nav}
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        nav = nav(identity),
        body = body,
    ))
}

/// Inline error banner, empty when there is nothing to show.
pub fn alert(error: Option<&str>) -> String {
    match error {
        Some(message) => format!(r#"<p class="alert alert-error">{}</p>"#, escape(message)),
        None => String::new(),
    }
}

pub fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}

/// Parses an identifier from a form or path segment.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, PageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PageError::BadRequest(format!("{} ID required", what)));
    }
    raw.parse::<Uuid>()
        .map_err(|_| PageError::BadRequest(format!("Invalid {} ID", what.to_lowercase())))
}

/// Known path, unsupported method.
pub async fn method_not_allowed() -> PageError {
    PageError::MethodNotAllowed
}

/// Empty form fields read as `None`.
pub fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
