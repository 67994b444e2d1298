use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use tracing::instrument;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiMultipart, ApiPath, AppError, ErrorBody},
    handlers::media::{object_key, object_response, range_header, read_upload},
    models::UploadResponse,
    storage::sanitize_key,
};

fn accepted_forum_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type == "application/pdf"
}

/// get_forum_media
///
/// [Authenticated Route] Streams an attachment from the forum bucket with
/// `Range` support (video seeking). The key is sanitized before use.
#[utoipa::path(
    get,
    path = "/api/forum/media/{key}",
    params(("key" = String, Path, description = "Object key, may contain '/'")),
    responses(
        (status = 200, description = "Full object"),
        (status = 206, description = "Partial content"),
        (status = 404, description = "No such object", body = ErrorBody),
        (status = 416, description = "Range not satisfiable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "forum"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_forum_media(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let key = sanitize_key(&key);
    if key.is_empty() {
        return Err(AppError::not_found("file"));
    }
    let object = state
        .storage
        .get_object(&state.config.buckets.forum, &key, range_header(&headers))
        .await?;
    object_response(object, &key)
}

/// upload_forum_media
///
/// [Authenticated Route] Stores an image, video or PDF under the caller's
/// prefix and returns the key to embed in a post.
#[utoipa::path(
    post,
    path = "/api/forum/media",
    request_body(content_type = "multipart/form-data", description = "Field `file`: the attachment"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing file or unsupported type", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "forum"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_forum_media(
    user: AuthUser,
    State(state): State<AppState>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let upload = read_upload(&mut multipart).await?;
    if !accepted_forum_type(&upload.content_type) {
        return Err(AppError::validation(
            "forum attachments must be images, videos or PDFs",
        ));
    }

    let key = object_key(&user.id.to_string(), &upload.file_name);
    let size = upload.bytes.len();
    state
        .storage
        .put_object(&state.config.buckets.forum, &key, upload.bytes, &upload.content_type)
        .await?;
    tracing::info!(key = %key, size, "forum media stored");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key,
            content_type: upload.content_type,
            size,
        }),
    ))
}
