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

/// Bootstrap admin seeded by migration (must match m20240102_seed_admin.rs)
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

/// Log in and return the session cookie.
async fn login(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "login failed for {email}");

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("no session cookie on login")
        .to_str()
        .unwrap();

    set_cookie.split(';').next().unwrap().to_string()
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
async fn test_protected_routes_require_session() {
    let (app, _mailer) = spawn_app().await;

    for uri in [
        "/api/dashboard/summary",
        "/api/documents",
        "/api/users/me",
        "/api/auth/me",
        "/api/admin/users",
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "expected 401 for {uri}"
        );
    }
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (app, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": "nobody@example.com", "password": "whatever123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_login_and_me() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["email"], ADMIN_EMAIL);
    assert!(
        body["data"]["roles"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "admin")
    );
}

#[tokio::test]
async fn test_guild_crud() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/api/admin/guilds",
                serde_json::json!({ "name": "St. Cecilia Choir", "description": "Music ministry" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let guild_id = body["data"]["id"].as_i64().unwrap();

    // Duplicate name is a conflict.
    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/api/admin/guilds",
                serde_json::json!({ "name": "St. Cecilia Choir" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/admin/guilds")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let guilds = body["data"].as_array().unwrap();
    assert_eq!(guilds.len(), 1);
    assert_eq!(guilds[0]["member_count"], 0);

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                &format!("/api/admin/guilds/{guild_id}"),
                serde_json::json!({ "description": "Sings at the 10am Mass" }),
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
                .method("DELETE")
                .uri(format!("/api/admin/guilds/{guild_id}"))
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone means gone.
    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/guilds/{guild_id}"))
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_provisioning_end_to_end() {
    let (app, mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/api/admin/users",
                serde_json::json!({
                    "email": "jane@example.com",
                    "first_name": "Jane",
                    "surname": "Doe",
                    "occupation": "Teacher"
                }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The new member shows up as pending until they set a password.
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
    let jane = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "jane@example.com")
        .expect("jane missing from list")
        .clone();
    assert_eq!(jane["status"], "Pending Setup");
    assert_eq!(jane["name"], "Jane Doe");

    // Duplicate creation conflicts.
    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "POST",
                "/api/admin/users",
                serde_json::json!({
                    "email": "jane@example.com",
                    "first_name": "Jane",
                    "surname": "Doe"
                }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Too-short password is rejected with no token consumed.
    let token = setup_token_from(&mailer);
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/set-password",
            serde_json::json!({ "token": token, "password": "short" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/set-password",
            serde_json::json!({ "token": token, "password": "janes-password-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Token is consumed: a second redemption fails with the generic signal.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/set-password",
            serde_json::json!({ "token": token, "password": "janes-password-2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The member can now log in, but is no admin.
    let member_cookie = login(&app, "jane@example.com", "janes-password-1").await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/admin/users")
                .body(Body::empty())
                .unwrap(),
            &member_cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/dashboard/summary")
                .body(Body::empty())
                .unwrap(),
            &member_cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["guild_status"], "No Guild Assigned");
}

#[tokio::test]
async fn test_csv_upload() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let csv = "email,first_name,surname,occupation\n\
               amy@example.com,Amy,Adams,Farmer\n\
               ,Bob,Broken,\n\
               cal@example.com,Cal,Carter,Nurse\n";

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("POST")
                .uri("/api/admin/users/upload")
                .header("Content-Type", "text/csv")
                .body(Body::from(csv))
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["details"]["success"], 2);
    assert_eq!(body["data"]["details"]["failed"], 1);
    let errors = body["data"]["details"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("Row 2"));

    // An empty upload is a top-level failure.
    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("POST")
                .uri("/api/admin/users/upload")
                .header("Content-Type", "text/csv")
                .body(Body::from(""))
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_otp_login_path() {
    let (app, mailer) = spawn_app().await;

    // Unknown address gets a 404, matching the legacy flow.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/otp",
            serde_json::json!({ "email": "nobody@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/otp",
            serde_json::json!({ "email": ADMIN_EMAIL }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = mailer.sent();
    let html = &sent.last().unwrap().html_body;
    let code: String = html
        .split("<b>")
        .nth(1)
        .unwrap()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    assert_eq!(code.len(), 6);

    // A wrong code is the generic signal.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify-otp",
            serde_json::json!({ "email": ADMIN_EMAIL, "otp": "000000" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify-otp",
            serde_json::json!({ "email": ADMIN_EMAIL, "otp": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["needs_password_setup"], false);

    // The code was consumed.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify-otp",
            serde_json::json!({ "email": ADMIN_EMAIL, "otp": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_self_service() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/users/me")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["first_name"], "Admin");

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                "/api/users/me",
                serde_json::json!({ "occupation": "Parish Secretary", "phone_number": "555-0101" }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["occupation"], "Parish Secretary");
    // Untouched fields survive a partial update.
    assert_eq!(body["data"]["surname"], "User");
}

#[tokio::test]
async fn test_change_password_floor() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                "/api/auth/password",
                serde_json::json!({
                    "current_password": ADMIN_PASSWORD,
                    "new_password": "tiny"
                }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(with_cookie(
            json_request(
                "PUT",
                "/api/auth/password",
                serde_json::json!({
                    "current_password": "not-the-password",
                    "new_password": "a-valid-new-pass"
                }),
            ),
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // The seeded admin is user 1.
    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/users/1")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_documents_empty_listing() {
    let (app, _mailer) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(with_cookie(
            Request::builder()
                .uri("/api/documents?page=1")
                .body(Body::empty())
                .unwrap(),
            &cookie,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["documents"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["current_page"], 1);
}
