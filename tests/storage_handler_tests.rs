mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use comunidad::{
    MockStorageService,
    config::StorageBuckets,
    models::{CreateBookRequest, UserFlagsUpdate},
    repository::Repository,
};
use common::{TestApp, multipart_request, spawn_app_with_storage};
use serde_json::json;
use uuid::Uuid;

const PDF_KEY: &str = "libros/cien-anos.pdf";

fn pdf_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn app_with_book(len: usize, subscriber_only: bool) -> (TestApp, Uuid) {
    let buckets = StorageBuckets::default();
    let storage = MockStorageService::new()
        .with_object(&buckets.books, PDF_KEY, pdf_bytes(len), "application/pdf")
        .with_object(&buckets.covers, "portadas/cien.png", vec![1u8; 64], "image/png");
    let app = spawn_app_with_storage(storage);
    let book = app
        .repo
        .create_book(CreateBookRequest {
            title: "Cien años de soledad".to_string(),
            author: "Gabriel García Márquez".to_string(),
            pdf_key: PDF_KEY.to_string(),
            cover_key: Some("portadas/cien.png".to_string()),
            total_pages: 417,
            subscriber_only,
            ..CreateBookRequest::default()
        })
        .await
        .unwrap();
    (app, book.id)
}

fn ranged(uri: &str, token: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn pdf_range_request_returns_partial_content() {
    let (app, book_id) = app_with_book(1000, false).await;
    let (token, _) = app.register("ana@example.com", "ana").await;

    let res = app
        .send(ranged(&format!("/api/books/{book_id}/pdf"), &token, "bytes=0-99"))
        .await;

    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header("content-range"), Some("bytes 0-99/1000"));
    assert_eq!(res.header("accept-ranges"), Some("bytes"));
    assert_eq!(res.header("content-type"), Some("application/pdf"));
    assert_eq!(res.body.len(), 100);
    assert_eq!(&res.body[..], &pdf_bytes(1000)[..100]);
}

#[tokio::test]
async fn pdf_suffix_and_open_ranges() {
    let (app, book_id) = app_with_book(1000, false).await;
    let (token, _) = app.register("ana@example.com", "ana").await;
    let uri = format!("/api/books/{book_id}/pdf");

    let tail = app.send(ranged(&uri, &token, "bytes=-10")).await;
    assert_eq!(tail.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(tail.header("content-range"), Some("bytes 990-999/1000"));
    assert_eq!(tail.body.len(), 10);

    let open = app.send(ranged(&uri, &token, "bytes=900-")).await;
    assert_eq!(open.header("content-range"), Some("bytes 900-999/1000"));
    assert_eq!(open.body.len(), 100);
}

#[tokio::test]
async fn pdf_without_range_is_served_whole_and_inline() {
    let (app, book_id) = app_with_book(1000, false).await;
    let (token, _) = app.register("ana@example.com", "ana").await;

    let res = app.get(&format!("/api/books/{book_id}/pdf"), Some(&token)).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.len(), 1000);
    assert_eq!(res.header("content-length"), Some("1000"));
    assert!(res.header("content-range").is_none());
    assert!(res.header("content-disposition").unwrap().starts_with("inline"));
}

#[tokio::test]
async fn range_past_end_is_not_satisfiable() {
    let (app, book_id) = app_with_book(1000, false).await;
    let (token, _) = app.register("ana@example.com", "ana").await;

    let res = app
        .send(ranged(&format!("/api/books/{book_id}/pdf"), &token, "bytes=5000-6000"))
        .await;
    assert_eq!(res.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(res.json()["kind"], "range_not_satisfiable");
}

#[tokio::test]
async fn malformed_range_falls_back_to_full_body() {
    let (app, book_id) = app_with_book(1000, false).await;
    let (token, _) = app.register("ana@example.com", "ana").await;

    let res = app
        .send(ranged(&format!("/api/books/{book_id}/pdf"), &token, "pages=1-2"))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.len(), 1000);
}

#[tokio::test]
async fn pdf_requires_authentication() {
    let (app, book_id) = app_with_book(100, false).await;
    let res = app.get(&format!("/api/books/{book_id}/pdf"), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscriber_only_pdf_needs_premium_access() {
    let (app, book_id) = app_with_book(100, true).await;
    let (token, id) = app.register("ana@example.com", "ana").await;
    let uri = format!("/api/books/{book_id}/pdf");

    let denied = app.get(&uri, Some(&token)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    app.repo
        .set_user_flags(
            id,
            UserFlagsUpdate {
                is_active: None,
                is_subscribed: Some(true),
            },
        )
        .await
        .unwrap();
    let allowed = app.get(&uri, Some(&token)).await;
    assert_eq!(allowed.status, StatusCode::OK);
}

#[tokio::test]
async fn missing_object_and_unknown_book_are_not_found() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (token, _) = app.register("ana@example.com", "ana").await;

    let unknown = app
        .get(&format!("/api/books/{}/pdf", Uuid::new_v4()), Some(&token))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let book = app
        .repo
        .create_book(CreateBookRequest {
            title: "Fantasma".to_string(),
            author: "Nadie".to_string(),
            pdf_key: "libros/no-existe.pdf".to_string(),
            ..CreateBookRequest::default()
        })
        .await
        .unwrap();
    let missing = app
        .get(&format!("/api/books/{}/pdf", book.id), Some(&token))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_backend_failure_is_an_opaque_500() {
    let app = spawn_app_with_storage(MockStorageService::new_failing());
    let (token, _) = app.register("ana@example.com", "ana").await;
    let book = app
        .repo
        .create_book(CreateBookRequest {
            title: "Libro".to_string(),
            author: "Autor".to_string(),
            pdf_key: PDF_KEY.to_string(),
            ..CreateBookRequest::default()
        })
        .await
        .unwrap();

    let res = app
        .get(&format!("/api/books/{}/pdf", book.id), Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = res.json()["error"].as_str().unwrap().to_string();
    assert!(!error.contains("Mock Storage"), "backend detail leaked: {error}");
}

#[tokio::test]
async fn cover_is_public() {
    let (app, book_id) = app_with_book(10, true).await;
    let res = app.get(&format!("/api/books/{book_id}/cover"), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("image/png"));
    assert_eq!(res.body.len(), 64);
}

#[tokio::test]
async fn reading_progress_round_trip() {
    let (app, book_id) = app_with_book(10, false).await;
    let (token, _) = app.register("ana@example.com", "ana").await;
    let uri = format!("/api/books/{book_id}/progress");

    let fresh = app.get(&uri, Some(&token)).await.json();
    assert_eq!(fresh["current_page"], 0);
    assert_eq!(fresh["total_pages"], 417);

    let saved = app
        .put(&uri, Some(&token), json!({ "current_page": 12, "seconds_read": 300 }))
        .await;
    assert_eq!(saved.status, StatusCode::OK);
    let saved = app
        .put(&uri, Some(&token), json!({ "current_page": 417, "seconds_read": 60 }))
        .await
        .json();
    assert_eq!(saved["completed"], true);
    assert_eq!(saved["time_spent_seconds"], 360);

    let past_end = app
        .put(&uri, Some(&token), json!({ "current_page": 500, "seconds_read": 0 }))
        .await;
    assert_eq!(past_end.status, StatusCode::BAD_REQUEST);

    let negative_time = app
        .put(&uri, Some(&token), json!({ "current_page": 1, "seconds_read": -5 }))
        .await;
    assert_eq!(negative_time.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forum_upload_then_ranged_download() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (token, user_id) = app.register("ana@example.com", "ana").await;
    let video = pdf_bytes(2048);

    let upload = app
        .send(multipart_request(
            "/api/forum/media",
            &token,
            "clip final.mp4",
            "video/mp4",
            &video,
        ))
        .await;
    assert_eq!(upload.status, StatusCode::CREATED, "{:?}", upload.json());
    let body = upload.json();
    let key = body["key"].as_str().unwrap().to_string();
    assert!(key.starts_with(&format!("{user_id}/")));
    assert!(key.ends_with("-clip_final.mp4"));
    assert_eq!(body["size"], 2048);
    assert_eq!(
        app.storage.object(&app.config.buckets.forum, &key).unwrap().len(),
        2048
    );

    let res = app
        .send(ranged(&format!("/api/forum/media/{key}"), &token, "bytes=1024-2047"))
        .await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header("content-range"), Some("bytes 1024-2047/2048"));
    assert_eq!(&res.body[..], &video[1024..]);
}

#[tokio::test]
async fn forum_rejects_unsupported_types_and_missing_files() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (token, _) = app.register("ana@example.com", "ana").await;

    let zip = app
        .send(multipart_request(
            "/api/forum/media",
            &token,
            "virus.zip",
            "application/zip",
            b"PK",
        ))
        .await;
    assert_eq!(zip.status, StatusCode::BAD_REQUEST);

    let missing = app
        .get("/api/forum/media/nothing/here.png", Some(&token))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn article_image_upload_requires_permission() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (reader, _) = app.register("ana@example.com", "ana").await;
    let (admin, _) = app.register_admin().await;

    let denied = app
        .send(multipart_request(
            "/api/articles/images",
            &reader,
            "foto.png",
            "image/png",
            &[137, 80, 78, 71],
        ))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let not_image = app
        .send(multipart_request(
            "/api/articles/images",
            &admin,
            "notes.pdf",
            "application/pdf",
            b"%PDF",
        ))
        .await;
    assert_eq!(not_image.status, StatusCode::BAD_REQUEST);

    let stored = app
        .send(multipart_request(
            "/api/articles/images",
            &admin,
            "foto.png",
            "image/png",
            &[137, 80, 78, 71],
        ))
        .await;
    assert_eq!(stored.status, StatusCode::CREATED);
    let key = stored.json()["key"].as_str().unwrap().to_string();
    assert!(key.starts_with("articles/"));
    assert!(app.storage.object(&app.config.buckets.articles, &key).is_some());
}

#[tokio::test]
async fn admin_registers_book_with_sanitized_keys() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (admin, _) = app.register_admin().await;

    let res = app
        .post(
            "/api/admin/books",
            Some(&admin),
            json!({
                "title": "Rayuela",
                "author": "Cortázar",
                "pdf_key": "../libros/rayuela.pdf",
                "total_pages": 600
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert!(!res.json()["pdf_key"].as_str().unwrap().contains(".."));

    let books = app.get("/api/books", None).await.json();
    assert_eq!(books.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_uploads_book_assets_then_readers_stream_them() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (admin, _) = app.register_admin().await;
    let (reader, _) = app.register("ana@example.com", "ana").await;
    let pdf = pdf_bytes(4096);

    let denied = app
        .send(multipart_request("/api/admin/books/pdf", &reader, "rayuela.pdf", "application/pdf", &pdf))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let wrong_type = app
        .send(multipart_request("/api/admin/books/pdf", &admin, "rayuela.png", "image/png", &pdf))
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);

    let uploaded = app
        .send(multipart_request("/api/admin/books/pdf", &admin, "rayuela.pdf", "application/pdf", &pdf))
        .await;
    assert_eq!(uploaded.status, StatusCode::CREATED, "{:?}", uploaded.json());
    let pdf_key = uploaded.json()["key"].as_str().unwrap().to_string();
    assert!(pdf_key.starts_with("books/"));
    assert_eq!(app.storage.object(&app.config.buckets.books, &pdf_key).unwrap().len(), 4096);

    let cover = app
        .send(multipart_request("/api/admin/books/cover", &admin, "portada.png", "image/png", &[137, 80, 78, 71]))
        .await;
    assert_eq!(cover.status, StatusCode::CREATED);
    let cover_key = cover.json()["key"].as_str().unwrap().to_string();
    assert!(app.storage.object(&app.config.buckets.covers, &cover_key).is_some());

    let book = app
        .post(
            "/api/admin/books",
            Some(&admin),
            json!({
                "title": "Rayuela",
                "author": "Cortázar",
                "pdf_key": pdf_key,
                "cover_key": cover_key,
                "total_pages": 600
            }),
        )
        .await;
    assert_eq!(book.status, StatusCode::CREATED);
    let book_id = book.json()["id"].as_str().unwrap().to_string();

    let res = app
        .send(ranged(&format!("/api/books/{book_id}/pdf"), &reader, "bytes=100-199"))
        .await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header("content-range"), Some("bytes 100-199/4096"));
    assert_eq!(&res.body[..], &pdf[100..200]);

    let cover = app.get(&format!("/api/books/{book_id}/cover"), None).await;
    assert_eq!(cover.status, StatusCode::OK);
    assert_eq!(&cover.body[..], &[137, 80, 78, 71]);
}

#[tokio::test]
async fn extractor_failures_use_the_json_error_shape() {
    let app = spawn_app_with_storage(MockStorageService::new());
    let (admin, _) = app.register_admin().await;

    let bad_id = app.get("/api/books/not-a-uuid/cover", None).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.json()["kind"], "validation");

    let not_multipart = app
        .post("/api/forum/media", Some(&admin), json!({ "file": "nope" }))
        .await;
    assert_eq!(not_multipart.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_multipart.json()["kind"], "validation");

    let bad_query = app
        .get("/api/admin/project-quotes?pending=maybe", Some(&admin))
        .await;
    assert_eq!(bad_query.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_query.json()["kind"], "validation");
    assert!(bad_query.json()["error"].is_string());
}
