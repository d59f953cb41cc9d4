use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ApiError, PageError},
    models::Role,
    session::{Session, keys},
};

/// Where browser requests are sent when they need to log in.
pub const LOGIN_PATH: &str = "/login";

/// Flow
///
/// Which surface a gate protects. Browser failures redirect or render plain text;
/// API failures are JSON bodies with an explicit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Browser,
    Api,
}

/// Identity
///
/// The authenticated caller, resolved once by the authentication gate and attached
/// to the request. Handlers read it through the extractor instead of going back to
/// the session store.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// Display name ("First Last"), may be empty.
    pub name: String,
}

impl Identity {
    /// Builds the identity from session attributes.
    ///
    /// Yields `None` unless `authenticated` is true and the user id, email and role are
    /// all present and well formed.
    pub async fn from_session(session: &Session) -> Option<Identity> {
        if !session.get_bool(keys::AUTHENTICATED).await {
            return None;
        }
        let raw_id = session.get_string(keys::USER_ID).await;
        let email = session.get_string(keys::EMAIL).await;
        let raw_role = session.get_string(keys::ROLE).await;

        let (Ok(user_id), Ok(role)) = (raw_id.parse::<Uuid>(), raw_role.parse::<Role>()) else {
            tracing::warn!(
                "authenticated session with malformed identity (user_id={:?}, role={:?})",
                raw_id,
                raw_role
            );
            return None;
        };
        if email.is_empty() {
            return None;
        }

        Some(Identity {
            user_id,
            email,
            role,
            name: session.get_string(keys::NAME).await,
        })
    }
}

/// Handlers behind an authentication gate take `Identity` as an argument.
/// Reaching one without the gate is a routing mistake and is answered with 401.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

fn deny_unauthenticated(flow: Flow) -> Response {
    match flow {
        Flow::Browser => Redirect::to(LOGIN_PATH).into_response(),
        Flow::Api => ApiError::Unauthorized.into_response(),
    }
}

fn deny_forbidden(flow: Flow) -> Response {
    match flow {
        Flow::Browser => PageError::Forbidden.into_response(),
        Flow::Api => ApiError::Forbidden.into_response(),
    }
}

async fn authenticate(flow: Flow, session: Session, mut request: Request, next: Next) -> Response {
    match Identity::from_session(&session).await {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => {
            tracing::debug!("unauthenticated request to {} denied", request.uri().path());
            deny_unauthenticated(flow)
        }
    }
}

/// require_auth
///
/// Browser authentication gate: a 303 to `/login` unless the session is authenticated.
pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    authenticate(Flow::Browser, session, request, next).await
}

/// require_auth_api
///
/// API authentication gate: `401 {"error":"Unauthorized"}` unless authenticated.
pub async fn require_auth_api(session: Session, request: Request, next: Next) -> Response {
    authenticate(Flow::Api, session, request, next).await
}

/// RoleGate
///
/// Allowed role set bound when the route group is registered.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
    flow: Flow,
}

impl RoleGate {
    pub fn new(flow: Flow, allowed: &[Role]) -> Self {
        Self {
            allowed: allowed.into(),
            flow,
        }
    }

    /// Exact membership; there is no ordering between roles.
    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }
}

/// require_role
///
/// Role gate for both flows. Authentication is a precondition: the identity attached
/// by an earlier authentication gate is used when present, otherwise it is resolved
/// from the session here, and an unauthenticated caller gets the authentication
/// failure rather than a 403. The request is forwarded unchanged.
pub async fn require_role(
    State(gate): State<RoleGate>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let identity = match request.extensions().get::<Identity>() {
        Some(identity) => Some(identity.clone()),
        None => Identity::from_session(&session).await,
    };

    let Some(identity) = identity else {
        tracing::debug!("role gate reached without authentication: {}", request.uri().path());
        return deny_unauthenticated(gate.flow);
    };

    if !gate.permits(identity.role) {
        tracing::debug!(
            "user {} with role {} denied {} (allowed: {:?})",
            identity.user_id,
            identity.role,
            request.uri().path(),
            gate.allowed
        );
        return deny_forbidden(gate.flow);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_gate_is_exact_match() {
        let admin_only = RoleGate::new(Flow::Browser, &[Role::Admin]);
        assert!(admin_only.permits(Role::Admin));
        assert!(!admin_only.permits(Role::Moderator));
        assert!(!admin_only.permits(Role::User));

        let staff = RoleGate::new(Flow::Api, &[Role::Admin, Role::Moderator]);
        assert!(staff.permits(Role::Moderator));
        assert!(!staff.permits(Role::User));
    }

    #[test]
    fn browser_denials_redirect_to_login() {
        let response = deny_unauthenticated(Flow::Browser);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], LOGIN_PATH);
        assert_eq!(deny_unauthenticated(Flow::Api).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(deny_forbidden(Flow::Browser).status(), StatusCode::FORBIDDEN);
    }
}
