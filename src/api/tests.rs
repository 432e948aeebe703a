//! End-to-end request tests against the full router, backed by an in-memory
//! database and a local object store in a temp directory.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use super::create_router;
use crate::config::Config;
use crate::db::test_pool;
use crate::storage::LocalStore;
use crate::AppState;

struct TestApp {
    router: Router,
    uploads: TempDir,
    spool: TempDir,
}

async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

async fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let spool = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.auth.jwt_secret = "test-secret".to_string();
    config.server.uploads_dir = uploads.path().to_path_buf();
    config.upload.temp_dir = Some(spool.path().to_path_buf());
    configure(&mut config);

    let store = LocalStore::new(uploads.path().to_path_buf(), "/uploads".to_string())
        .await
        .unwrap();
    let state = AppState::new(config, test_pool().await, Arc::new(store)).unwrap();

    TestApp {
        router: create_router(Arc::new(state)),
        uploads,
        spool,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn json(&self, method: Method, uri: &str, body: Value, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn register(&self, email: &str, password: &str) -> Value {
        let response = self
            .json(
                Method::POST,
                "/register",
                json!({
                    "name": "Ama Mensah",
                    "email": email,
                    "password": password,
                    "number": "0244000000",
                    "phone": "0302000000",
                    "agency": "NADMO"
                }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    /// Log in and return the `token=...` cookie pair
    async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .json(
                Method::POST,
                "/login",
                json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response).expect("login sets the session cookie")
    }

    async fn create_report(&self, cookie: &str) -> Value {
        let response = self
            .json(
                Method::POST,
                "/reports",
                json!({
                    "title": "Collapsed drain",
                    "phone": "0200000000",
                    "date": "2024-05-01",
                    "time": "08:30",
                    "address": "Kaneshie",
                    "description": "Drain cover missing",
                    "addedPhotos": ["/uploads/a.jpg", "/uploads/b.jpg"]
                }),
                Some(cookie),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn multipart_photos(files: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "----ReportDeskBoundary7MA4YWxkTrZu0gW";
    let mut body = Vec::new();

    for (name, content_type, data) in files {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"photos\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

fn upload_request(files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let (content_type, body) = multipart_photos(files);
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_and_test_endpoints() {
    let app = test_app().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/test", None).await;
    assert_eq!(body_json(response).await, json!("test ok"));
}

// ============================================================================
// Registration, login, profile, logout
// ============================================================================

#[tokio::test]
async fn test_register_login_profile_round_trip() {
    let app = test_app().await;

    let user = app.register("a@x.com", "p1").await;
    assert_eq!(user["email"], "a@x.com");
    assert_eq!(user["agency"], "NADMO");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let cookie = app.login("a@x.com", "p1").await;

    let profile = body_json(app.get("/profile", Some(&cookie)).await).await;
    assert_eq!(profile["_id"], user["_id"]);
    assert_eq!(profile["email"], "a@x.com");
    assert_eq!(profile["name"], "Ama Mensah");
    assert!(profile.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_with_only_email_and_password() {
    let app = test_app().await;

    let response = app
        .json(
            Method::POST,
            "/register",
            json!({ "email": "a@x.com", "password": "p1" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .json(
            Method::POST,
            "/login",
            json!({ "email": "a@x.com", "password": "p1" }),
            None,
        )
        .await;
    assert!(response.status().is_success());
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn test_login_returns_user_document() {
    let app = test_app().await;
    let user = app.register("a@x.com", "p1").await;

    let response = app
        .json(
            Method::POST,
            "/login",
            json!({ "email": "a@x.com", "password": "p1" }),
            None,
        )
        .await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));

    let body = body_json(response).await;
    assert_eq!(body["_id"], user["_id"]);
}

#[tokio::test]
async fn test_login_wrong_password_is_422() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;

    let response = app
        .json(
            Method::POST,
            "/login",
            json!({ "email": "a@x.com", "password": "p2" }),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(session_cookie(&response).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "unprocessable_entity");
}

#[tokio::test]
async fn test_login_unknown_email_is_null() {
    let app = test_app().await;

    let response = app
        .json(
            Method::POST,
            "/login",
            json!({ "email": "nobody@x.com", "password": "p1" }),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert_eq!(body_json(response).await, Value::Null);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;

    let response = app
        .json(
            Method::POST,
            "/register",
            json!({ "email": "a@x.com", "password": "other" }),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let app = test_app().await;

    let response = app
        .json(Method::POST, "/register", json!({ "name": "No Email" }), None)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["details"]["email"].is_array());
    assert!(body["error"]["details"]["password"].is_array());
}

#[tokio::test]
async fn test_malformed_json_is_a_400_envelope() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;

    // A mistyped field must not look like a wrong password (422)
    let response = app
        .json(
            Method::POST,
            "/login",
            json!({ "email": 5, "password": "p1" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_json(response).await["error"]["code"], "bad_request");

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "bad_request");

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/upload-by-link")
                .body(Body::from(r#"{"link": "http://example.com/a.jpg"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_without_cookie_is_null() {
    let app = test_app().await;

    let response = app.get("/profile", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);
}

#[tokio::test]
async fn test_profile_with_forged_cookie_is_401() {
    let app = test_app().await;

    let response = app.get("/profile", Some("token=not-a-real-token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_from_other_secret_is_401() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;

    let other = test_app_with(|c| c.auth.jwt_secret = "rotated-secret".to_string()).await;
    other.register("a@x.com", "p1").await;
    let foreign_cookie = other.login("a@x.com", "p1").await;

    let response = app.get("/profile", Some(&foreign_cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;
    app.login("a@x.com", "p1").await;

    let response = app.json(Method::POST, "/logout", json!({}), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie(&response).as_deref(), Some("token="));
    assert_eq!(body_json(response).await, json!(true));

    // The cleared cookie reads as signed out
    let profile = app.get("/profile", Some("token=")).await;
    assert_eq!(body_json(profile).await, Value::Null);
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_create_report_requires_session() {
    let app = test_app().await;

    let response = app
        .json(Method::POST, "/reports", json!({ "title": "Pothole" }), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_report_records_owner() {
    let app = test_app().await;
    let user = app.register("a@x.com", "p1").await;
    let cookie = app.login("a@x.com", "p1").await;

    let report = app.create_report(&cookie).await;

    assert_eq!(report["owner"], user["_id"]);
    assert_eq!(report["title"], "Collapsed drain");
    assert_eq!(report["photos"], json!(["/uploads/a.jpg", "/uploads/b.jpg"]));

    let id = report["_id"].as_str().unwrap();
    let fetched = body_json(app.get(&format!("/reports/{}", id), None).await).await;
    assert_eq!(fetched, report);
}

#[tokio::test]
async fn test_get_missing_report_is_404() {
    let app = test_app().await;

    let response = app.get("/reports/does-not-exist", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_reports_requires_valid_session() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;
    app.register("b@x.com", "p2").await;
    let a = app.login("a@x.com", "p1").await;
    let b = app.login("b@x.com", "p2").await;
    app.create_report(&a).await;
    app.create_report(&b).await;

    let response = app.get("/reports", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/reports", Some("token=garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Every report is visible, not only the caller's
    let reports = body_json(app.get("/reports", Some(&a)).await).await;
    assert_eq!(reports.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_owner_update_changes_only_submitted_fields() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;
    let cookie = app.login("a@x.com", "p1").await;
    let report = app.create_report(&cookie).await;
    let id = report["_id"].as_str().unwrap();

    let response = app
        .json(
            Method::PUT,
            "/reports",
            json!({
                "id": id,
                "description": "Drain cover replaced",
                "addedPhotos": ["/uploads/c.jpg"]
            }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("ok"));

    let updated = body_json(app.get(&format!("/reports/{}", id), None).await).await;
    assert_eq!(updated["description"], "Drain cover replaced");
    assert_eq!(updated["photos"], json!(["/uploads/c.jpg"]));
    for field in ["title", "phone", "date", "time", "address", "owner"] {
        assert_eq!(updated[field], report[field], "{} changed", field);
    }
}

#[tokio::test]
async fn test_explicit_null_clears_a_field() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;
    let cookie = app.login("a@x.com", "p1").await;
    let report = app.create_report(&cookie).await;
    let id = report["_id"].as_str().unwrap();

    let response = app
        .json(
            Method::PUT,
            "/reports",
            json!({ "id": id, "phone": null }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(app.get(&format!("/reports/{}", id), None).await).await;
    assert_eq!(updated["phone"], Value::Null);
    assert_eq!(updated["address"], report["address"]);
    assert_eq!(updated["photos"], report["photos"]);
}

#[tokio::test]
async fn test_update_cannot_blank_the_title() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;
    let cookie = app.login("a@x.com", "p1").await;
    let report = app.create_report(&cookie).await;
    let id = report["_id"].as_str().unwrap();

    for title in [json!(""), json!("   "), Value::Null] {
        let response = app
            .json(
                Method::PUT,
                "/reports",
                json!({ "id": id, "title": title }),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "title {}", title);
        assert_eq!(body_json(response).await["error"]["code"], "validation_error");
    }

    let unchanged = body_json(app.get(&format!("/reports/{}", id), None).await).await;
    assert_eq!(unchanged["title"], "Collapsed drain");
}

#[tokio::test]
async fn test_non_owner_update_is_forbidden_and_changes_nothing() {
    let app = test_app().await;
    app.register("u1@x.com", "p1").await;
    app.register("u2@x.com", "p2").await;
    let owner = app.login("u1@x.com", "p1").await;
    let intruder = app.login("u2@x.com", "p2").await;

    let report = app.create_report(&owner).await;
    let id = report["_id"].as_str().unwrap();

    let response = app
        .json(
            Method::PUT,
            "/reports",
            json!({ "id": id, "title": "Hijacked" }),
            Some(&intruder),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_ne!(body, json!("ok"));
    assert_eq!(body["error"]["code"], "forbidden");

    let unchanged = body_json(app.get(&format!("/reports/{}", id), None).await).await;
    assert_eq!(unchanged, report);
}

#[tokio::test]
async fn test_update_requires_session_and_existing_report() {
    let app = test_app().await;
    app.register("a@x.com", "p1").await;
    let cookie = app.login("a@x.com", "p1").await;

    let response = app
        .json(
            Method::PUT,
            "/reports",
            json!({ "id": "whatever", "title": "x" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .json(
            Method::PUT,
            "/reports",
            json!({ "id": "missing", "title": "x" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .json(Method::PUT, "/reports", json!({ "title": "x" }), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn test_upload_returns_urls_in_submission_order() {
    let app = test_app().await;

    let files: [(&str, &str, &[u8]); 3] = [
        ("first.jpg", "image/jpeg", b"first photo"),
        ("second.png", "image/png", b"second photo"),
        ("third.jpg", "image/jpeg", b"third photo"),
    ];
    let response = app.send(upload_request(&files)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let urls: Vec<String> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(urls.len(), 3);

    for (url, (_, _, data)) in urls.iter().zip(files.iter()) {
        let key = url.trim_start_matches("/uploads/");
        let stored = std::fs::read(app.uploads.path().join(key)).unwrap();
        assert_eq!(&stored[..], *data);
    }
    assert!(urls[1].ends_with(".png"));

    // Spooled temp files are gone
    assert!(std::fs::read_dir(app.spool.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_uploaded_photos_are_served() {
    let app = test_app().await;

    let response = app
        .send(upload_request(&[("pic.jpg", "image/jpeg", b"served bytes")]))
        .await;
    let urls: Vec<String> = serde_json::from_value(body_json(response).await).unwrap();

    let response = app.get(&urls[0], None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"served bytes");
}

#[tokio::test]
async fn test_upload_rejects_too_many_files() {
    let app = test_app_with(|c| c.upload.max_files = 2).await;

    let files: [(&str, &str, &[u8]); 3] = [
        ("a.jpg", "image/jpeg", b"a"),
        ("b.jpg", "image/jpeg", b"b"),
        ("c.jpg", "image/jpeg", b"c"),
    ];
    let response = app.send(upload_request(&files)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_with_no_photos_returns_empty_list() {
    let app = test_app().await;

    let response = app.send(upload_request(&[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

async fn serve_image() -> String {
    let app = Router::new().route(
        "/street.jpg",
        get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], b"remote street".to_vec()) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_upload_by_link() {
    let app = test_app().await;
    let base = serve_image().await;

    let response = app
        .json(
            Method::POST,
            "/upload-by-link",
            json!({ "link": format!("{}/street.jpg", base) }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let url: String = serde_json::from_value(body_json(response).await).unwrap();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".jpg"));
    let stored = std::fs::read(app.uploads.path().join(url.trim_start_matches("/uploads/"))).unwrap();
    assert_eq!(stored, b"remote street");
}

#[tokio::test]
async fn test_upload_by_link_upstream_failure_is_502() {
    let app = test_app().await;
    let base = serve_image().await;

    let response = app
        .json(
            Method::POST,
            "/upload-by-link",
            json!({ "link": format!("{}/missing.jpg", base) }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(std::fs::read_dir(app.spool.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_upload_by_link_rejects_non_http_links() {
    let app = test_app().await;

    let response = app
        .json(
            Method::POST,
            "/upload-by-link",
            json!({ "link": "file:///etc/passwd" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
