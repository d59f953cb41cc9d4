mod common;

use axum::{
    Router,
    http::{StatusCode, header},
    middleware, routing,
};
use common::*;
use movie_catalog::{
    AppState,
    models::Role,
    routes::gates::{self, Gate},
    session::{self, SessionStore},
};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// A single `/guarded` route behind `gates`, counting how often its handler runs.
fn guarded(state: &AppState, gates: &[Gate]) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let inner = Router::new().route(
        "/guarded",
        routing::get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "reached"
            }
        }),
    );
    let router = gates::apply(inner, gates).layer(middleware::from_fn_with_state(
        state.sessions.clone(),
        session::load_and_save,
    ));
    (router, hits)
}

async fn user_cookie(state: &AppState, role: Role) -> String {
    let email = format!("{}@example.com", role);
    let user = seed_user(state, &email, role).await;
    login_cookie(state, &user).await
}

// --- Authentication gate ---

#[tokio::test]
async fn test_browser_auth_gate_redirects_without_running_handler() {
    let state = test_state();
    let (router, hits) = guarded(&state, &[Gate::auth()]);

    let response = send(&router, get("/guarded", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_api_auth_gate_returns_json_401_without_running_handler() {
    let state = test_state();
    let (router, hits) = guarded(&state, &[Gate::auth_api()]);

    let response = send(&router, get("/guarded", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "error": "Unauthorized" }));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_auth_gate_ignores_forged_and_destroyed_sessions() {
    let state = test_state();
    let (router, hits) = guarded(&state, &[Gate::auth()]);

    // Signed with another secret
    let forged = movie_catalog::SessionCookie::new(movie_catalog::CookieConfig::new(
        "someone-elses-secret",
        false,
    ))
    .seal("abc", chrono::Utc::now() + chrono::Duration::hours(1))
    .unwrap();
    let response = send(&router, get("/guarded", Some(&format!("session={}", forged)))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Validly signed, but the session no longer exists
    let cookie = user_cookie(&state, Role::User).await;
    let response = send(&router, get("/guarded", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let store = state.sessions.store();
    let value = cookie.trim_start_matches("session=");
    let token = state.sessions.cookie().open(value).unwrap();
    store.destroy(&token).await.unwrap();

    let response = send(&router, get("/guarded", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_auth_gate_admits_every_role() {
    let state = test_state();
    let (router, hits) = guarded(&state, &[Gate::auth()]);

    for role in Role::ALL {
        let cookie = user_cookie(&state, role).await;
        let response = send(&router, get("/guarded", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK, "role {}", role);
    }
    assert_eq!(hits.load(Ordering::SeqCst), Role::ALL.len());
}

// --- Role gate ---

#[tokio::test]
async fn test_role_gate_admits_exactly_the_allowed_roles() {
    let state = test_state();
    let mut cookies = Vec::new();
    for role in Role::ALL {
        cookies.push((role, user_cookie(&state, role).await));
    }

    let allowed_sets: [&[Role]; 5] = [
        &[Role::User],
        &[Role::Moderator],
        &[Role::Admin],
        &[Role::Admin, Role::Moderator],
        &Role::ALL,
    ];

    for allowed in allowed_sets {
        for gate in [Gate::role(allowed), Gate::role_api(allowed)] {
            let (router, hits) = guarded(&state, &[gate]);
            for (role, cookie) in &cookies {
                let response = send(&router, get("/guarded", Some(cookie))).await;
                let expected = if allowed.contains(role) {
                    StatusCode::OK
                } else {
                    StatusCode::FORBIDDEN
                };
                assert_eq!(response.status(), expected, "role {} against {:?}", role, allowed);
            }
            let admitted = cookies.iter().filter(|(r, _)| allowed.contains(r)).count();
            assert_eq!(hits.load(Ordering::SeqCst), admitted);
        }
    }
}

#[tokio::test]
async fn test_role_gate_forbidden_bodies() {
    let state = test_state();
    let cookie = user_cookie(&state, Role::User).await;

    let (router, _) = guarded(&state, &[Gate::auth(), Gate::role(&[Role::Admin])]);
    let response = send(&router, get("/guarded", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Access Denied - Insufficient privileges");

    let (router, _) = guarded(&state, &[Gate::auth_api(), Gate::role_api(&[Role::Admin])]);
    let response = send(&router, get("/guarded", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Access Denied - Insufficient privileges" })
    );
}

// --- Ordering ---

#[tokio::test]
async fn test_unauthenticated_gets_auth_failure_not_forbidden() {
    let state = test_state();

    for gates in [
        vec![Gate::auth(), Gate::role(&[Role::Admin])],
        vec![Gate::role(&[Role::Admin])],
    ] {
        let (router, hits) = guarded(&state, &gates);
        let response = send(&router, get("/guarded", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    for gates in [
        vec![Gate::auth_api(), Gate::role_api(&[Role::Moderator])],
        vec![Gate::role_api(&[Role::Moderator])],
    ] {
        let (router, hits) = guarded(&state, &gates);
        let response = send(&router, get("/guarded", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "error": "Unauthorized" }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_authenticated_wrong_role_gets_forbidden() {
    let state = test_state();
    let cookie = user_cookie(&state, Role::Moderator).await;

    let (router, hits) = guarded(&state, &[Gate::auth(), Gate::role(&[Role::Admin])]);
    let response = send(&router, get("/guarded", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

// --- Application routes ---

#[tokio::test]
async fn test_member_pages_redirect_anonymous_visitors() {
    let state = test_state();
    let app = app(&state);

    for path in [
        "/dashboard",
        "/profile",
        "/movies",
        "/watchlist",
        "/logout",
        "/admin/movies",
        "/moderator/users",
    ] {
        let response = send(&app, get(path, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), "/login", "{}", path);
    }

    let response = send(&app, form("/watchlist/add", None, "movie_id=x")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_role_pages_use_exact_role_match() {
    let state = test_state();
    let app = app(&state);
    let user = user_cookie(&state, Role::User).await;
    let moderator = user_cookie(&state, Role::Moderator).await;
    let admin = user_cookie(&state, Role::Admin).await;

    let cases = [
        ("/admin/movies", &user, StatusCode::FORBIDDEN),
        ("/admin/movies", &moderator, StatusCode::FORBIDDEN),
        ("/admin/movies", &admin, StatusCode::OK),
        ("/moderator/dashboard", &user, StatusCode::FORBIDDEN),
        ("/moderator/dashboard", &admin, StatusCode::FORBIDDEN),
        ("/moderator/dashboard", &moderator, StatusCode::OK),
        ("/dashboard", &user, StatusCode::OK),
    ];
    for (path, cookie, expected) in cases {
        let response = send(&app, get(path, Some(cookie))).await;
        assert_eq!(response.status(), expected, "{}", path);
    }
}

#[tokio::test]
async fn test_api_groups_are_gated() {
    let state = test_state();
    let app = app(&state);
    let user = user_cookie(&state, Role::User).await;
    let admin = user_cookie(&state, Role::Admin).await;

    // Public reads
    let response = send(&app, get("/api/v1/movies", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/api/v1/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, get("/api/v1/moderator/users", Some(&user))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, get("/api/v1/moderator/users", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json("POST", "/api/v1/movies", Some(&user), json!({ "title": "Heat" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, json("POST", "/api/v1/movies", None, json!({ "title": "Heat" }))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes_and_fallbacks() {
    let state = test_state();
    let app = app(&state);

    let response = send(&app, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    for path in ["/", "/login", "/signup"] {
        let response = send(&app, get(path, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
    }

    let response = send(&app, get("/no-such-page", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, bare("PUT", "/login", None)).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = send(&app, get("/api/v1/no-such-endpoint", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "Not found" }));
}

#[tokio::test]
async fn test_wrong_method_is_405_for_every_caller() {
    let state = test_state();
    let app = app(&state);
    let user = user_cookie(&state, Role::User).await;
    let admin = user_cookie(&state, Role::Admin).await;

    // Paths mixing a public GET with gated writes
    for (method, path) in [("PUT", "/api/v1/movies"), ("DELETE", "/api/v1/reviews")] {
        for cookie in [None, Some(user.as_str()), Some(admin.as_str())] {
            let response = send(&app, bare(method, path, cookie)).await;
            assert_eq!(
                response.status(),
                StatusCode::METHOD_NOT_ALLOWED,
                "{} {} as {:?}",
                method,
                path,
                cookie.map(|_| "member")
            );
            assert_eq!(body_json(response).await, json!({ "error": "Method not allowed" }));
        }
    }

    // Gated-only paths answer 405 before their gates
    for cookie in [None, Some(user.as_str())] {
        let response = send(&app, bare("PATCH", "/api/v1/moderator/users", cookie)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = send(&app, bare("DELETE", "/dashboard", cookie)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = send(&app, bare("GET", "/admin/movies/delete", cookie)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    // Allowed methods still run behind their gates
    let response = send(&app, bare("GET", "/api/v1/movies", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(
        &app,
        json("POST", "/api/v1/movies", Some(&user), json!({ "title": "Heat" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
