/// Router Module Index
///
/// Routes are grouped by the gates that protect them. Each group module only lists
/// its routes; the gates are attached here through [`gates::apply`], so the access
/// rule of every route can be read in one place.
use axum::Router;

use crate::{AppState, models::Role, pages};
use gates::Gate;

/// Ordered gate lists applied to route groups.
pub mod gates;

/// Pages open to anonymous visitors (home, login, signup, health).
pub mod public;

/// Pages for any logged-in user.
pub mod authenticated;

/// Catalog management pages, admin role only.
pub mod admin;

/// User management pages, moderator role only.
pub mod moderator;

/// The JSON API mounted under `/api/v1`.
pub mod api;

/// browser_routes
///
/// Every member page sits behind the browser authentication gate; the admin and
/// moderator groups add their role gate inside it, so authentication always runs first.
/// A wrong method on a known path is a plain 405 for every caller.
pub fn browser_routes() -> Router<AppState> {
    let members = authenticated::authenticated_routes()
        .merge(gates::apply(admin::admin_routes(), &[Gate::role(&[Role::Admin])]))
        .merge(gates::apply(
            moderator::moderator_routes(),
            &[Gate::role(&[Role::Moderator])],
        ));

    public::public_routes()
        .merge(gates::apply(members, &[Gate::auth()]))
        .method_not_allowed_fallback(pages::method_not_allowed)
}
