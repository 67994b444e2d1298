use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, has_premium_access, perms},
    error::{ApiJson, ApiMultipart, ApiPath, AppError, ErrorBody, OrNotFound},
    handlers::media::{Upload, object_key, object_response, range_header, read_upload},
    models::{
        Book, BookProgress, CreateBookRequest, ProgressUpdate, UpdateProgressRequest, UploadResponse,
    },
    storage::sanitize_key,
    validation::non_blank,
};

// One reading session is never credited with more than a day.
const MAX_SECONDS_PER_UPDATE: i64 = 24 * 60 * 60;

/// list_books
///
/// [Public Route] The library catalogue.
#[utoipa::path(
    get,
    path = "/api/books",
    responses((status = 200, description = "Books", body = [Book])),
    tag = "books"
)]
pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(state.repo.list_books().await?))
}

/// book_cover
///
/// [Public Route] Streams the cover image. Honours `Range`.
#[utoipa::path(
    get,
    path = "/api/books/{id}/cover",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Full image"),
        (status = 206, description = "Partial content"),
        (status = 404, description = "No such book or cover", body = ErrorBody)
    ),
    tag = "books"
)]
pub async fn book_cover(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let book = state.repo.get_book(id).await.or_not_found("book")?;
    let key = book.cover_key.ok_or_else(|| AppError::not_found("cover"))?;
    let object = state
        .storage
        .get_object(&state.config.buckets.covers, &key, range_header(&headers))
        .await?;
    object_response(object, &key)
}

/// book_pdf
///
/// [Authenticated Route] Streams the book PDF with byte-range support so
/// readers can fetch pages lazily. Subscriber-only books need premium access.
#[utoipa::path(
    get,
    path = "/api/books/{id}/pdf",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Full PDF"),
        (status = 206, description = "Partial content"),
        (status = 403, description = "Subscription required", body = ErrorBody),
        (status = 416, description = "Range not satisfiable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "books"
)]
#[instrument(skip_all, fields(user_id = %user.id, book_id = %id))]
pub async fn book_pdf(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let book = state.repo.get_book(id).await.or_not_found("book")?;
    if book.subscriber_only && !has_premium_access(Some(&user), &state.config.super_roles) {
        return Err(AppError::Forbidden("subscription required".to_string()));
    }
    let range = range_header(&headers);
    tracing::debug!(range = ?range, "streaming book pdf");
    let object = state
        .storage
        .get_object(&state.config.buckets.books, &book.pdf_key, range)
        .await?;
    object_response(object, &book.pdf_key)
}

/// get_progress
///
/// [Authenticated Route] Caller's reading progress; zeroed if never opened.
#[utoipa::path(
    get,
    path = "/api/books/{id}/progress",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses((status = 200, description = "Progress", body = BookProgress)),
    security(("bearer" = [])),
    tag = "books"
)]
pub async fn get_progress(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<BookProgress>, AppError> {
    let book = state.repo.get_book(id).await.or_not_found("book")?;
    let progress = state
        .repo
        .get_book_progress(user.id, book.id)
        .await?
        .unwrap_or_else(|| BookProgress {
            user_id: user.id,
            book_id: book.id,
            total_pages: book.total_pages,
            last_read_at: Utc::now(),
            ..BookProgress::default()
        });
    Ok(Json(progress))
}

/// update_progress
///
/// [Authenticated Route] Saves the current page and adds `seconds_read` to the
/// accumulated reading time. `completed` is derived, never client-set.
#[utoipa::path(
    put,
    path = "/api/books/{id}/progress",
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "Saved progress", body = BookProgress),
        (status = 400, description = "Page out of range", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "books"
)]
#[instrument(skip_all, fields(user_id = %user.id, book_id = %id))]
pub async fn update_progress(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateProgressRequest>,
) -> Result<Json<BookProgress>, AppError> {
    let book = state.repo.get_book(id).await.or_not_found("book")?;
    let total_pages = payload.total_pages.unwrap_or(book.total_pages);

    if payload.current_page < 0 || total_pages < 0 {
        return Err(AppError::validation("page numbers must not be negative"));
    }
    if total_pages > 0 && payload.current_page > total_pages {
        return Err(AppError::validation("current_page exceeds total_pages"));
    }
    if !(0..=MAX_SECONDS_PER_UPDATE).contains(&payload.seconds_read) {
        return Err(AppError::validation(format!(
            "seconds_read must be between 0 and {MAX_SECONDS_PER_UPDATE}"
        )));
    }

    let progress = state
        .repo
        .upsert_book_progress(ProgressUpdate {
            user_id: user.id,
            book_id: book.id,
            current_page: payload.current_page,
            total_pages,
            seconds_read: payload.seconds_read,
        })
        .await
        .or_not_found("book")?;
    Ok(Json(progress))
}

/// create_book
///
/// [Admin Route] Adds a catalogue entry for a PDF (and optional cover) stored
/// through the upload routes below. Requires `books:create`.
#[utoipa::path(
    post,
    path = "/api/admin/books",
    request_body = CreateBookRequest,
    responses((status = 201, description = "Created", body = Book)),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_book(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    authz::authorize(&state, &user, perms::BOOKS_CREATE).await?;
    payload.title = non_blank("title", &payload.title)?;
    payload.author = non_blank("author", &payload.author)?;
    payload.pdf_key = sanitize_key(&payload.pdf_key);
    if payload.pdf_key.is_empty() {
        return Err(AppError::validation("pdf_key must not be empty"));
    }
    payload.cover_key = payload
        .cover_key
        .map(|k| sanitize_key(&k))
        .filter(|k| !k.is_empty());
    if payload.total_pages < 0 {
        return Err(AppError::validation("total_pages must not be negative"));
    }

    let book = state.repo.create_book(payload).await?;
    tracing::info!(book_id = %book.id, "book added");
    Ok((StatusCode::CREATED, Json(book)))
}

async fn store_book_asset(
    state: &AppState,
    bucket: &str,
    prefix: &str,
    upload: Upload,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let key = object_key(prefix, &upload.file_name);
    let size = upload.bytes.len();
    state
        .storage
        .put_object(bucket, &key, upload.bytes, &upload.content_type)
        .await?;
    tracing::info!(bucket, key = %key, size, "book asset stored");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key,
            content_type: upload.content_type,
            size,
        }),
    ))
}

/// upload_book_pdf
///
/// [Admin Route] Stores a PDF in the books bucket and returns the `pdf_key`
/// to pass to `POST /api/admin/books`. Requires `books:create`.
#[utoipa::path(
    post,
    path = "/api/admin/books/pdf",
    request_body(content_type = "multipart/form-data", description = "Field `file`: the PDF"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing file or not a PDF", body = ErrorBody),
        (status = 403, description = "Missing books:create", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_book_pdf(
    user: AuthUser,
    State(state): State<AppState>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    authz::authorize(&state, &user, perms::BOOKS_CREATE).await?;
    let upload = read_upload(&mut multipart).await?;
    if upload.content_type != "application/pdf" {
        return Err(AppError::validation("books must be uploaded as application/pdf"));
    }
    store_book_asset(&state, &state.config.buckets.books, "books", upload).await
}

/// upload_book_cover
///
/// [Admin Route] Stores a cover image (`image/*`) in the covers bucket.
/// Requires `books:create`.
#[utoipa::path(
    post,
    path = "/api/admin/books/cover",
    request_body(content_type = "multipart/form-data", description = "Field `file`: the cover image"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing file or not an image", body = ErrorBody),
        (status = 403, description = "Missing books:create", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_book_cover(
    user: AuthUser,
    State(state): State<AppState>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    authz::authorize(&state, &user, perms::BOOKS_CREATE).await?;
    let upload = read_upload(&mut multipart).await?;
    if !upload.content_type.starts_with("image/") {
        return Err(AppError::validation("covers must be images"));
    }
    store_book_asset(&state, &state.config.buckets.covers, "covers", upload).await
}
