use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use http_body_util::BodyExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use flipbook::app::auth::AdminAuth;
use flipbook::app::blob_store::LocalFsBlobStore;
use flipbook::app::routes::{self, AppState, RouterOptions};
use flipbook::formats::{BookManifest, GetBookResponse};

static PAGE_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

const BOUNDARY: &str = "flipbook-test-boundary";

fn app(data_dir: &Path, password: Option<&str>) -> Router {
    let blobs = Arc::new(LocalFsBlobStore::new(data_dir));
    let state = AppState::new(blobs, AdminAuth::new(password.map(str::to_string)), 3600);
    routes::router(state, &RouterOptions::default())
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is json")
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response is utf-8")
    }

    fn header(&self, name: header::HeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let resp = app.clone().oneshot(request).await.expect("router call");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

fn multipart(uri: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (filename, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build request")
}

async fn create_book(app: &Router, book_id: &str, title: &str) -> BookManifest {
    let resp = send(
        app,
        post_json(
            "/api/books",
            &json!({ "bookId": book_id, "title": title, "grade": "3", "lessonName": "Lesson 1" }),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    serde_json::from_value(resp.json()["manifest"].clone()).expect("manifest in response")
}

async fn fetch_manifest(app: &Router, book_id: &str) -> BookManifest {
    let resp = send(app, get(&format!("/api/books/{book_id}"))).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let body: GetBookResponse = serde_json::from_slice(&resp.body).expect("get book response");
    body.manifest
}

#[tokio::test]
async fn healthz_is_ok() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let resp = send(&app, get("/healthz")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.text(), "ok\n");
}

#[tokio::test]
async fn create_then_get_returns_fresh_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let created = create_book(&app, "g3-fractions", "Fractions").await;
    assert_eq!(created.page_count, 0);
    assert_eq!(created.created_at, created.updated_at);

    let fetched = fetch_manifest(&app, "g3-fractions").await;
    assert_eq!(fetched, created);
    assert_eq!(fetched.lesson_name.as_deref(), Some("Lesson 1"));

    let raw = send(&app, get("/api/books/g3-fractions")).await.json();
    assert_eq!(raw["manifest"]["bookId"], "g3-fractions");
    assert_eq!(raw["manifest"]["grade"], "3");
    assert_eq!(raw["manifest"]["pageCount"], 0);
    assert!(dir.path().join("blobs/books/g3-fractions/manifest.json").is_file());
}

#[tokio::test]
async fn create_rejects_missing_fields_and_bad_grade() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let resp = send(&app, post_json("/api/books", &json!({ "bookId": "g3" }))).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "Missing required fields");

    let resp = send(
        &app,
        post_json(
            "/api/books",
            &json!({ "bookId": "g3", "title": "Fractions", "grade": "9" }),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        post_json(
            "/api/books",
            &json!({ "bookId": "../etc", "title": "Fractions", "grade": "3" }),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let list = send(&app, get("/api/books")).await.json();
    assert_eq!(list["books"], json!([]));
}

#[tokio::test]
async fn mistyped_json_bodies_get_a_400_error_body() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let resp = send(
        &app,
        post_json(
            "/api/books",
            &json!({ "bookId": "a", "title": "t", "grade": 3 }),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["error"].as_str().is_some_and(|e| !e.is_empty()));

    let resp = send(
        &app,
        post_json("/api/books/a/manifest", &json!({ "bookId": "b", "title": "t" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(
        resp.json()["error"]
            .as_str()
            .is_some_and(|e| e.contains("grade"))
    );

    let resp = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/books")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("build request"),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["error"].is_string());

    assert_eq!(send(&app, get("/api/books/a")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manifest_with_page_index_zero_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    let created = create_book(&app, "g3", "Fractions").await;

    let mut body = serde_json::to_value(&created).expect("manifest json");
    body["pages"] = json!([{ "index": 0, "url": "/blobs/books/g3/pages/cover.png" }]);
    let resp = send(&app, post_json("/api/books/g3/manifest", &body)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "Invalid page index: 0");
    assert!(fetch_manifest(&app, "g3").await.pages.is_empty());
}

#[tokio::test]
async fn second_metadata_save_wins_and_keeps_pages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let mut manifest = create_book(&app, "g3", "Fractions").await;
    manifest.pages.push(flipbook::formats::BookPage {
        index: 1,
        url: "/blobs/books/g3/pages/page-1.png".to_string(),
        filename: Some("page-1.png".to_string()),
    });
    let resp = send(
        &app,
        post_json(
            "/api/books/g3/manifest",
            &serde_json::to_value(&manifest).expect("manifest json"),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());

    let resp = send(
        &app,
        post_json(
            "/api/books",
            &json!({ "bookId": "g3", "title": "Fractions, revised", "grade": "K" }),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);

    let fetched = fetch_manifest(&app, "g3").await;
    assert_eq!(fetched.title, "Fractions, revised");
    assert_eq!(fetched.grade.as_str(), "K");
    assert_eq!(fetched.lesson_name, None);
    assert_eq!(fetched.pages.len(), 1);
    assert_eq!(fetched.page_count, 1);
    assert_eq!(fetched.created_at, manifest.created_at);
}

#[tokio::test]
async fn saving_a_manifest_twice_only_changes_updated_at() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    let created = create_book(&app, "g3", "Fractions").await;
    let body = serde_json::to_value(&created).expect("manifest json");

    let first = send(&app, post_json("/api/books/g3/manifest", &body)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["url"], "/blobs/books/g3/manifest.json");
    let mut once = fetch_manifest(&app, "g3").await;

    send(&app, post_json("/api/books/g3/manifest", &body)).await;
    let twice = fetch_manifest(&app, "g3").await;

    assert!(twice.updated_at >= once.updated_at);
    once.updated_at = twice.updated_at;
    assert_eq!(once, twice);
}

#[tokio::test]
async fn manifest_with_mismatched_id_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    let created = create_book(&app, "g3", "Fractions").await;

    let resp = send(
        &app,
        post_json(
            "/api/books/other/manifest",
            &serde_json::to_value(&created).expect("manifest json"),
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "Book ID mismatch");
    assert_eq!(
        send(&app, get("/api/books/other")).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn list_orders_by_most_recent_update() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    create_book(&app, "first", "First").await;
    create_book(&app, "second", "Second").await;
    let first = fetch_manifest(&app, "first").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    send(
        &app,
        post_json(
            "/api/books/first/manifest",
            &serde_json::to_value(&first).expect("manifest json"),
        ),
    )
    .await;

    let list = send(&app, get("/api/books")).await.json();
    let ids: Vec<&str> = list["books"]
        .as_array()
        .expect("books array")
        .iter()
        .filter_map(|book| book["bookId"].as_str())
        .collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[tokio::test]
async fn delete_removes_manifest_and_pages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    create_book(&app, "g3", "Fractions").await;
    let resp = send(
        &app,
        multipart(
            "/api/books/g3/upload",
            &[("page-1.png", "image/png", PAGE_PNG)],
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());

    let resp = send(&app, delete("/api/books/g3")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["success"], true);

    let resp = send(&app, get("/api/books/g3")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json()["error"], "Book not found");
    assert!(!dir.path().join("blobs/books/g3/pages/page-1.png").exists());

    // Nothing left under the prefix; deleting again is a no-op.
    let resp = send(&app, delete("/api/books/g3")).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn upload_stores_images_and_serves_them() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    create_book(&app, "g3", "Fractions").await;

    let resp = send(
        &app,
        multipart(
            "/api/books/g3/upload",
            &[
                ("page-2.png", "image/png", PAGE_PNG),
                ("page-1.png", "image/png", PAGE_PNG),
            ],
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let body = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["uploads"][0]["filename"], "page-2.png");
    assert_eq!(body["uploads"][0]["url"], "/blobs/books/g3/pages/page-2.png");
    assert_eq!(body["uploads"][1]["size"], PAGE_PNG.len());

    // Uploading alone does not touch the manifest.
    assert!(fetch_manifest(&app, "g3").await.pages.is_empty());

    let resp = send(&app, get("/blobs/books/g3/pages/page-1.png")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header(header::CONTENT_TYPE), "image/png");
    assert_eq!(resp.body, PAGE_PNG);

    let resp = send(&app, get("/blobs/books/g3/pages/missing.png")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_named_manifest_json_does_not_break_listing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    create_book(&app, "a", "A").await;

    let resp = send(
        &app,
        multipart(
            "/api/books/a/upload",
            &[("manifest.json", "image/png", PAGE_PNG)],
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());

    let resp = send(&app, get("/api/books")).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(resp.json()["books"].as_array().map(Vec::len), Some(1));
    assert_eq!(send(&app, get("/")).await.status, StatusCode::OK);
    assert_eq!(fetch_manifest(&app, "a").await.title, "A");
}

#[tokio::test]
async fn upload_rejects_non_images_without_writing_anything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    create_book(&app, "g3", "Fractions").await;

    let resp = send(
        &app,
        multipart(
            "/api/books/g3/upload",
            &[
                ("page-1.png", "image/png", PAGE_PNG),
                ("notes.txt", "text/plain", &b"hello"[..]),
            ],
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "Invalid file type: notes.txt");
    assert!(!dir.path().join("blobs/books/g3/pages/page-1.png").exists());

    let resp = send(&app, multipart("/api/books/g3/upload", &[])).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "No files provided");
}

#[tokio::test]
async fn viewer_renders_one_overlay_per_interactive_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);
    let created = create_book(&app, "g3", "Fractions").await;

    let mut body = serde_json::to_value(&created).expect("manifest json");
    body["pages"] = json!([
        { "index": 1, "url": "/blobs/books/g3/pages/page-1.png" },
        { "index": 2, "url": "/blobs/books/g3/pages/page-2.png" },
        { "index": 3, "url": "/blobs/books/g3/pages/page-3.png" }
    ]);
    body["interactivePages"] = json!({
        "1": { "type": "skills-match", "rect": { "x": 0.1, "y": 0.2, "w": 0.5, "h": 0.25 } },
        "3": { "type": "reflections", "rect": { "x": 0.0, "y": 0.0, "w": 1.0, "h": 1.0 } }
    });
    let resp = send(&app, post_json("/api/books/g3/manifest", &body)).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    assert_eq!(fetch_manifest(&app, "g3").await.page_count, 3);

    let resp = send(&app, get("/book/g3")).await;
    assert_eq!(resp.status, StatusCode::OK);
    let html = resp.text();
    assert_eq!(html.matches(r#"<div class="page" "#).count(), 3);
    assert_eq!(html.matches(r#"<div class="overlay "#).count(), 2);
    assert!(html.contains("left: 10%; top: 20%; width: 50%; height: 25%;"));
    assert!(html.contains(r#"data-overlay="reflections" data-page="3""#));
    assert!(html.contains(r#"data-storage-key="reflection_g3_3" data-saved-ms="2000""#));
    assert!(html.contains(r#"<div class="skills-card" style="left: "#));
    assert!(html.contains("Fractions"));
}

#[tokio::test]
async fn viewer_handles_unknown_and_empty_books() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let resp = send(&app, get("/book/nope")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.text().contains("Book not found"));

    create_book(&app, "empty", "Empty").await;
    let resp = send(&app, get("/book/empty")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("This book has no pages yet."));

    let home = send(&app, get("/")).await.text();
    assert!(home.contains(r#"href="/book/empty""#));
}

#[tokio::test]
async fn admin_pages_redirect_to_login_without_cookie() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), Some("secret"));

    let resp = send(&app, get("/admin/books")).await;
    assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.header(header::LOCATION),
        "/admin/login?redirect=%2Fadmin%2Fbooks"
    );

    let resp = send(&app, get("/admin/login?redirect=%2Fadmin%2Fbooks")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("<form"));

    // Only the login page itself is open.
    let resp = send(&app, get("/admin/login-history")).await;
    assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.header(header::LOCATION),
        "/admin/login?redirect=%2Fadmin%2Flogin-history"
    );

    // The JSON API is not gated.
    assert_eq!(
        send(&app, get("/api/books")).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn login_sets_cookie_that_opens_admin_pages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), Some("secret"));
    create_book(&app, "g3", "Fractions").await;

    let resp = send(
        &app,
        post_json("/api/auth/login", &json!({ "password": "wrong" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.headers.get(header::SET_COOKIE).is_none());

    let resp = send(
        &app,
        post_json("/api/auth/login", &json!({ "password": "secret" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let cookie = resp.header(header::SET_COOKIE).to_string();
    assert!(cookie.starts_with("admin=1"), "{cookie}");
    assert!(cookie.contains("HttpOnly"), "{cookie}");

    let authed = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, "admin=1")
            .body(Body::empty())
            .expect("build request")
    };
    let resp = send(&app, authed("/admin/books")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("/admin/books/g3"));

    let resp = send(&app, authed("/admin/books/g3?tab=pages")).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = send(&app, authed("/admin/new")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("Create Book"));
}

#[tokio::test]
async fn login_is_refused_when_no_password_is_configured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = app(dir.path(), None);

    let resp = send(
        &app,
        post_json("/api/auth/login", &json!({ "password": "" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.json()["error"], "Admin login is not configured");
}
