mod common;

use axum::{
    body::Body,
    http::{header, Request},
};
use common::{gif, json_body, png, raw_body, MultipartForm, TestApp, SECRET, WORKER_ID};

async fn upload(app: &TestApp, route: &str, filename: &str, mime: &str, data: &[u8]) -> String {
    let form = MultipartForm::new()
        .text("secret", SECRET)
        .text("ownerId", "7")
        .file("file", filename, mime, data);
    let (status, body) = app.upload(route, form).await;
    assert_eq!(status, 200, "{body}");
    body["path"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn stored_images_are_served_with_cache_headers() {
    let app = TestApp::spawn().await;
    let path = upload(&app, "/attachments", "pic.png", "image/png", &png(60, 40)).await;

    let response = app.get(&format!("/{path}")).await;

    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/webp");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=1800");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["x-worker-id"], WORKER_ID);
    assert!(headers.contains_key("pid"));
    assert!(headers.get("cross-origin-resource-policy").is_none());
}

#[tokio::test]
async fn other_files_are_served_as_downloads() {
    let app = TestApp::spawn().await;
    let dir = app.public_dir().join("attachments/7/1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("notes.txt"), b"hello").unwrap();

    let response = app.get("/attachments/7/1/notes.txt").await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );
    assert_eq!(raw_body(response).await, b"hello");
}

#[tokio::test]
async fn size_query_renders_a_smaller_copy() {
    let app = TestApp::spawn().await;
    let path = upload(&app, "/attachments", "pic.png", "image/png", &png(400, 300)).await;

    let response = app.get(&format!("/{path}?size=100")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=1800");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    let rendered = image::load_from_memory(&raw_body(response).await).unwrap();
    assert_eq!((rendered.width(), rendered.height()), (100, 75));

    // The stored file is untouched.
    let stored = image::open(app.public_file(&path)).unwrap();
    assert_eq!((stored.width(), stored.height()), (400, 300));
}

#[tokio::test]
async fn oversized_size_is_clamped_and_never_enlarges() {
    let app = TestApp::spawn().await;
    let path = upload(&app, "/attachments", "pic.png", "image/png", &png(300, 200)).await;

    let response = app.get(&format!("/{path}?size=99999")).await;

    assert_eq!(response.status(), 200);
    let rendered = image::load_from_memory(&raw_body(response).await).unwrap();
    assert_eq!((rendered.width(), rendered.height()), (300, 200));
}

#[tokio::test]
async fn animated_source_keeps_animation_unless_static_requested() {
    let app = TestApp::spawn().await;
    let form = MultipartForm::new()
        .text("secret", SECRET)
        .file("file", "party.gif", "image/gif", &gif(3, 48, 48));
    let (_, body) = app.upload("/emojis", form).await;
    let path = body["path"].as_str().unwrap().to_string();

    let animated = app.get(&format!("/{path}?size=32")).await;
    assert_eq!(animated.headers()[header::CONTENT_TYPE], "image/gif");

    let still = app.get(&format!("/{path}?type=webp")).await;
    assert_eq!(still.status(), 200);
    assert_eq!(still.headers()[header::CONTENT_TYPE], "image/webp");
    let frame = image::load_from_memory(&raw_body(still).await).unwrap();
    assert_eq!((frame.width(), frame.height()), (48, 48));
}

#[tokio::test]
async fn failed_transform_falls_back_to_the_original() {
    let app = TestApp::spawn().await;
    let dir = app.public_dir().join("attachments/7/2");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("broken.png"), b"not an image at all").unwrap();

    let response = app.get("/attachments/7/2/broken.png?size=10").await;

    assert_eq!(response.status(), 200);
    assert_eq!(raw_body(response).await, b"not an image at all");
}

#[tokio::test]
async fn traversal_in_request_path_is_rejected() {
    let app = TestApp::spawn().await;
    std::fs::write(app.public_dir().join("../secret.txt"), b"x").unwrap();

    for uri in [
        "/avatars/%2E%2E/%2E%2E/secret.txt",
        "/avatars/..%2F..%2Fsecret.txt?type=webp",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), 404, "{uri}");
        assert_eq!(json_body(response).await["type"], "INVALID_PATH", "{uri}");
    }
}

#[tokio::test]
async fn directory_transform_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.get("/avatars?type=webp").await;

    assert_eq!(response.status(), 404);
    assert_eq!(json_body(response).await["type"], "INVALID_PATH");
}

#[tokio::test]
async fn health_requires_the_secret_header() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), 403);
    assert_eq!(json_body(response).await["type"], "INVALID_SECRET");

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("X-CDN-SECRET", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["workerId"], WORKER_ID);
    assert!(body["metrics"]["memoryTotalBytes"].is_u64());
}

#[tokio::test]
async fn proxy_rejects_non_http_schemes() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/proxy/ftp%3A%2F%2Fexample.com%2Fcat.png/cat.png")
        .await;

    assert_eq!(response.status(), 403);
    assert_eq!(json_body(response).await["type"], "INVALID_URL");
}

#[tokio::test]
async fn proxy_dimensions_requires_the_secret() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/proxy-dimensions?url=https%3A%2F%2Fexample.com%2Fa.png&secret=wrong")
        .await;

    assert_eq!(response.status(), 403);
    assert_eq!(json_body(response).await["type"], "INVALID_SECRET");
}
