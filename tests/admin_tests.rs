use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use parishd::clients::StubMailer;
use parishd::config::Config;
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "password123";

async fn spawn_app() -> (Router, Arc<StubMailer>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let mailer = Arc::new(StubMailer::new());
    let state = parishd::api::create_app_state_with_mailer(config, mailer.clone())
        .await
        .expect("Failed to create app state");

    (parishd::api::router(state).await, mailer)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn with_cookie(request: Request<Body>, cookie: &str) -> Request<Body> {
    let (mut parts, body) = request.into_parts();
    parts.headers.insert("Cookie", cookie.parse().unwrap());
    Request::from_parts(parts, body)
}

async fn admin_login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    response
        .headers()
        .get("set-cookie")
        .expect("no session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn create_member(app: &Router, cookie: &str, email: &str, first: &str, last: &str) -> i64 {
    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/api/admin/users",
                serde_json::json!({ "email": email, "first_name": first, "surname": last }),
            ),
            cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    body["data"]["user_id"].as_i64().unwrap()
}

fn setup_token_from(mailer: &StubMailer) -> String {
    let sent = mailer.sent();
    let body = &sent.last().expect("no email captured").html_body;
    body.split("token=")
        .nth(1)
        .expect("no setup link in email")
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect()
}

#[tokio::test]
async fn test_update_member_profile_and_email() {
    let (app, _mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    let user_id = create_member(&app, &cookie, "old@example.com", "Olive", "Older").await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                &format!("/api/admin/users/{user_id}"),
                serde_json::json!({
                    "email": "new@example.com",
                    "surname": "Newer",
                    "section_name": "East"
                }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/admin/users")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let updated = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"].as_i64() == Some(user_id))
        .expect("updated user missing")
        .clone();
    assert_eq!(updated["email"], "new@example.com");
    assert_eq!(updated["name"], "Olive Newer");
}

#[tokio::test]
async fn test_update_member_email_conflict() {
    let (app, _mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    create_member(&app, &cookie, "taken@example.com", "Tess", "Taken").await;
    let other = create_member(&app, &cookie, "other@example.com", "Oscar", "Other").await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                &format!("/api/admin/users/{other}"),
                serde_json::json!({ "email": "taken@example.com" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_missing_member_is_not_found() {
    let (app, _mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                "/api/admin/users/9999",
                serde_json::json!({ "surname": "Nobody" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_change_own_role() {
    let (app, _mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                "/api/admin/users/1",
                serde_json::json!({ "role": "member" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resend_setup_rotates_token() {
    let (app, mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    let user_id = create_member(&app, &cookie, "rotate@example.com", "Rory", "Rotate").await;
    let first_token = setup_token_from(&mailer);

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("POST")
                .uri(format!("/api/admin/users/{user_id}/resend-setup"))
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let second_token = setup_token_from(&mailer);
    assert_ne!(first_token, second_token);

    // The earlier link is dead.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/set-password",
            serde_json::json!({ "token": first_token, "password": "rotated-pass-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/set-password",
            serde_json::json!({ "token": second_token, "password": "rotated-pass-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_resend_setup_unknown_user() {
    let (app, _mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("POST")
                .uri("/api/admin/users/424242/resend-setup")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_member_removes_related_records() {
    let (app, mailer) = spawn_app().await;
    let cookie = admin_login(&app).await;

    let user_id = create_member(&app, &cookie, "leaver@example.com", "Lee", "Leaver").await;
    let token = setup_token_from(&mailer);

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/users/{user_id}"))
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Their setup token went with them.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/set-password",
            serde_json::json!({ "token": token, "password": "too-late-now-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // And they are gone from the list.
    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/admin/users")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(
        !body["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|u| u["email"] == "leaver@example.com")
    );
}
