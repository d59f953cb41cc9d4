mod common;

use axum::http::StatusCode;
use common::*;
use movie_catalog::{
    models::Role,
    session::{SessionStore, keys},
};
use serde_json::Value;

/// Store token behind a `session=...` cookie pair.
fn token_of(state: &movie_catalog::AppState, cookie: &str) -> Option<String> {
    let value = cookie.trim_start_matches("session=");
    state.sessions.cookie().open(value)
}

#[tokio::test]
async fn test_login_sets_a_session_cookie() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;

    let body = format!("email=ann%40example.com&password={}", PASSWORD.replace(' ', "+"));
    let response = send(&app, form("/login", None, &body)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    let set_cookie = set_cookie(&response).expect("login must set the session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(!set_cookie.contains("Secure"));

    let cookie = cookie_pair(&set_cookie);
    let token = token_of(&state, &cookie).unwrap();
    let store = state.sessions.store();
    assert_eq!(store.get(&token, keys::AUTHENTICATED).await, Some(Value::Bool(true)));
    assert_eq!(
        store.get(&token, keys::USER_ID).await,
        Some(Value::String(user.user_id.to_string()))
    );
    assert_eq!(store.get(&token, keys::ROLE).await, Some(Value::String("user".into())));

    let response = send(&app, get("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("ann@example.com"));

    let stored = state.repo.get_user(user.user_id).await.unwrap().unwrap();
    assert!(stored.last_login_at.is_some());
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let state = test_state();
    let app = app(&state);
    seed_user(&state, "ann@example.com", Role::User).await;

    for body in [
        "email=ann%40example.com&password=wrong",
        "email=nobody%40example.com&password=wrong",
    ] {
        let response = send(&app, form("/login", None, body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        assert!(body_text(response).await.contains("Invalid email or password"));
    }
}

#[tokio::test]
async fn test_login_rotates_an_existing_session() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;
    let old_cookie = login_cookie(&state, &user).await;
    let old_token = token_of(&state, &old_cookie).unwrap();

    let body = format!("email=ann%40example.com&password={}", PASSWORD.replace(' ', "+"));
    let response = send(&app, form("/login", Some(&old_cookie), &body)).await;
    let new_cookie = cookie_pair(&set_cookie(&response).unwrap());
    let new_token = token_of(&state, &new_cookie).unwrap();

    assert_ne!(old_token, new_token);
    assert_eq!(state.sessions.store().expires_at(&old_token).await, None);
}

#[tokio::test]
async fn test_signup_creates_a_user_and_logs_in() {
    let state = test_state();
    let app = app(&state);

    let body = "email=new%40example.com&password=pw123456&confirm_password=pw123456\
                &first_name=New&last_name=Person&username=newbie";
    let response = send(&app, form("/signup", None, body)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    let cookie = cookie_pair(&set_cookie(&response).unwrap());

    let user = state
        .repo
        .get_user_by_email("new@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.role, "user");
    assert_eq!(user.username, "newbie");
    assert_ne!(user.password_hash, "pw123456");

    let response = send(&app, get("/dashboard", Some(&cookie))).await;
    assert!(body_text(response).await.contains("New Person"));
}

#[tokio::test]
async fn test_signup_validation() {
    let state = test_state();
    let app = app(&state);
    seed_user(&state, "taken@example.com", Role::User).await;

    let response = send(
        &app,
        form(
            "/signup",
            None,
            "email=a%40example.com&password=one&confirm_password=two",
        ),
    )
    .await;
    assert!(set_cookie(&response).is_none());
    assert!(body_text(response).await.contains("Passwords do not match"));

    let response = send(
        &app,
        form(
            "/signup",
            None,
            "email=taken%40example.com&password=one&confirm_password=one",
        ),
    )
    .await;
    assert!(body_text(response).await.contains("Email already registered"));
}

#[tokio::test]
async fn test_logout_destroys_the_session() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;
    let cookie = login_cookie(&state, &user).await;
    let token = token_of(&state, &cookie).unwrap();

    let response = send(&app, get("/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));

    let store = state.sessions.store();
    for key in [keys::AUTHENTICATED, keys::USER_ID, keys::EMAIL, keys::ROLE] {
        assert_eq!(store.get(&token, key).await, None);
    }

    // The old cookie no longer opens anything
    let response = send(&app, get("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_profile_edit_refreshes_session_name() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;
    let cookie = login_cookie(&state, &user).await;

    let response = send(
        &app,
        form(
            "/profile/edit",
            Some(&cookie),
            "first_name=Ann&last_name=Lee&username=annlee",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");

    let token = token_of(&state, &cookie).unwrap();
    let store = state.sessions.store();
    assert_eq!(store.get(&token, keys::NAME).await, Some(Value::String("Ann Lee".into())));
    assert_eq!(store.get(&token, keys::USERNAME).await, Some(Value::String("annlee".into())));

    let response = send(&app, get("/profile", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("annlee"));
}

#[tokio::test]
async fn test_change_password() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;
    let cookie = login_cookie(&state, &user).await;

    let response = send(
        &app,
        form(
            "/profile/change-password",
            Some(&cookie),
            "current_password=wrong&new_password=next-pass&confirm_password=next-pass",
        ),
    )
    .await;
    assert!(body_text(response).await.contains("Current password is incorrect"));

    let response = send(
        &app,
        form(
            "/profile/change-password",
            Some(&cookie),
            "current_password=x&new_password=a&confirm_password=b",
        ),
    )
    .await;
    assert!(body_text(response).await.contains("New passwords do not match"));

    let body = format!(
        "current_password={}&new_password=next-pass&confirm_password=next-pass",
        PASSWORD.replace(' ', "+")
    );
    let response = send(&app, form("/profile/change-password", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Password changed successfully"));

    let stored = state.repo.get_user(user.user_id).await.unwrap().unwrap();
    assert!(bcrypt::verify("next-pass", &stored.password_hash).unwrap());
}

#[tokio::test]
async fn test_movie_pages_and_watchlist() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;
    let cookie = login_cookie(&state, &user).await;
    let movie = seed_movie(&state, "Paris, Texas").await;

    let response = send(&app, get("/movies", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Paris, Texas"));

    let detail = format!("/movies/{}", movie.movie_id);
    let response = send(&app, get(&detail, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get("/movies/not-a-uuid", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        get(&format!("/movies/{}", uuid::Uuid::new_v4()), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Movie not found");

    let add = format!("movie_id={}", movie.movie_id);
    let response = send(&app, form("/watchlist/add", Some(&cookie), &add)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/movies");
    assert!(state.repo.in_watchlist(user.user_id, movie.movie_id).await.unwrap());

    let response = send(&app, get("/watchlist", Some(&cookie))).await;
    assert!(body_text(response).await.contains("Paris, Texas"));

    let response = send(&app, form("/watchlist/remove", Some(&cookie), &add)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);
    assert!(!state.repo.in_watchlist(user.user_id, movie.movie_id).await.unwrap());
}

#[tokio::test]
async fn test_review_form_validation() {
    let state = test_state();
    let app = app(&state);
    let user = seed_user(&state, "ann@example.com", Role::User).await;
    let cookie = login_cookie(&state, &user).await;
    let movie = seed_movie(&state, "Stalker").await;

    let body = format!("movie_id={}&rating=0&title=Hmm&content=", movie.movie_id);
    let response = send(&app, form("/reviews", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Rating must be between 1 and 10");

    let body = format!("movie_id={}&rating=8&title=Zone&content=Slow&contains_spoilers=on", movie.movie_id);
    let response = send(&app, form("/reviews", Some(&cookie), &body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/movies/{}", movie.movie_id));

    let reviews = state.repo.get_user_reviews(user.user_id).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert!(reviews[0].contains_spoilers);
}

#[tokio::test]
async fn test_admin_pages_manage_movies() {
    let state = test_state();
    let app = app(&state);
    let admin = seed_user(&state, "admin@example.com", Role::Admin).await;
    let cookie = login_cookie(&state, &admin).await;

    let response = send(
        &app,
        form(
            "/admin/movies/create",
            Some(&cookie),
            "title=Ikiru&release_date=1952-10-09&runtime=143&status=",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/movies");

    let movies = state.repo.list_movies(10, 0).await.unwrap();
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].runtime, Some(143));
    assert_eq!(movies[0].status.as_deref(), Some("Released"));
    let movie_id = movies[0].movie_id;

    let response = send(
        &app,
        form("/admin/movies/create", Some(&cookie), "title=&release_date="),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Title is required");

    let response = send(
        &app,
        form("/admin/movies/create", Some(&cookie), "title=X&release_date=09%2F10%2F1952"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid release date");

    let response = send(
        &app,
        get(&format!("/admin/movies/edit?id={}", movie_id), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Ikiru"));

    let update = format!("movie_id={}&title=Ikiru+(1952)", movie_id);
    let response = send(&app, form("/admin/movies/update", Some(&cookie), &update)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let movie = state.repo.get_movie(movie_id).await.unwrap().unwrap();
    assert_eq!(movie.title, "Ikiru (1952)");

    let delete = format!("movie_id={}", movie_id);
    let response = send(&app, form("/admin/movies/delete", Some(&cookie), &delete)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(state.repo.get_movie(movie_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_moderator_pages_manage_users() {
    let state = test_state();
    let app = app(&state);
    let moderator = seed_user(&state, "mod@example.com", Role::Moderator).await;
    let member = seed_user(&state, "member@example.com", Role::User).await;
    let cookie = login_cookie(&state, &moderator).await;

    let response = send(&app, get("/moderator/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("member@example.com"));

    let own = format!("user_id={}&role=admin", moderator.user_id);
    let response = send(&app, form("/moderator/users/update-role", Some(&cookie), &own)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Cannot change your own role");

    let bad = format!("user_id={}&role=superuser", member.user_id);
    let response = send(&app, form("/moderator/users/update-role", Some(&cookie), &bad)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid role");

    let promote = format!("user_id={}&role=admin", member.user_id);
    let response = send(&app, form("/moderator/users/update-role", Some(&cookie), &promote)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/moderator/users");
    let promoted = state.repo.get_user(member.user_id).await.unwrap().unwrap();
    assert_eq!(promoted.role, "admin");

    let own = format!("user_id={}", moderator.user_id);
    let response = send(&app, form("/moderator/users/deactivate", Some(&cookie), &own)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Cannot deactivate yourself");

    let other = format!("user_id={}", member.user_id);
    let response = send(&app, form("/moderator/users/deactivate", Some(&cookie), &other)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(state.repo.get_user(member.user_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_during_session_outage_stays_logged_out() {
    let state = session_outage_state();
    let app = app(&state);
    seed_user(&state, "ann@example.com", Role::User).await;

    let body = format!("email=ann%40example.com&password={}", PASSWORD.replace(' ', "+"));
    let response = send(&app, form("/login", None, &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    if let Some(set_cookie) = set_cookie(&response) {
        assert!(set_cookie.contains("Max-Age=0"), "unexpected live cookie: {}", set_cookie);
    }
    assert!(body_text(response).await.contains("Unable to sign in right now"));
}

#[tokio::test]
async fn test_signup_during_session_outage_keeps_the_account() {
    let state = session_outage_state();
    let app = app(&state);

    let body = "email=new%40example.com&password=pw123456&confirm_password=pw123456";
    let response = send(&app, form("/signup", None, body)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(
        state
            .repo
            .get_user_by_email("new@example.com")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_session_outage_reads_as_anonymous() {
    let state = session_outage_state();
    let app = app(&state);

    // A correctly signed cookie whose session the backend cannot confirm
    let value = state
        .sessions
        .cookie()
        .seal("some-token", chrono::Utc::now() + chrono::Duration::hours(1))
        .unwrap();
    let cookie = format!("session={}", value);

    let response = send(&app, get("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));

    let response = send(&app, get("/api/v1/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Public pages keep working
    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}
