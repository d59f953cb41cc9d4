use axum::{Router, middleware};

use crate::{
    auth::{Flow, RoleGate, require_auth, require_auth_api, require_role},
    models::Role,
};

/// Gate
///
/// One check in a route group's gate list.
#[derive(Debug, Clone)]
pub enum Gate {
    Auth(Flow),
    Role(RoleGate),
}

impl Gate {
    pub fn auth() -> Self {
        Gate::Auth(Flow::Browser)
    }

    pub fn auth_api() -> Self {
        Gate::Auth(Flow::Api)
    }

    pub fn role(allowed: &[Role]) -> Self {
        Gate::Role(RoleGate::new(Flow::Browser, allowed))
    }

    pub fn role_api(allowed: &[Role]) -> Self {
        Gate::Role(RoleGate::new(Flow::Api, allowed))
    }
}

/// apply
///
/// Wraps every route currently in `router` with `gates`, first gate outermost, so
/// gates run in list order and each may short-circuit the rest. Calling `apply` on a
/// router that already contains gated groups puts the new gates in front of theirs.
///
/// Gates are route layers and also wrap each path's 405 fallback. Routers that want
/// a caller-independent 405 install `method_not_allowed_fallback` after merging.
/// Unmatched paths reach the 404 fallback ungated.
pub fn apply<S>(router: Router<S>, gates: &[Gate]) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    gates.iter().rev().fold(router, |router, gate| match gate {
        Gate::Auth(Flow::Browser) => router.route_layer(middleware::from_fn(require_auth)),
        Gate::Auth(Flow::Api) => router.route_layer(middleware::from_fn(require_auth_api)),
        Gate::Role(role_gate) => router.route_layer(middleware::from_fn_with_state(
            role_gate.clone(),
            require_role,
        )),
    })
}
