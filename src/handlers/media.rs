//! Byte-stream responses for stored objects and multipart upload intake.

use axum::{
    extract::Multipart,
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{StoredObject, content_type_for},
};

/// Upload ceiling applied to the multipart routes.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Raw `Range` header value, passed through to storage untouched.
pub fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|v| v.to_str().ok())
}

fn renders_inline(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type == "application/pdf"
}

fn file_name(key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "download".to_string() } else { cleaned }
}

/// object_response
///
/// 206 with `Content-Range` when storage honoured a range, 200 otherwise.
/// Always advertises `Accept-Ranges: bytes` so PDF and video players seek.
pub fn object_response(object: StoredObject, key: &str) -> Result<Response, AppError> {
    let status = if object.content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let disposition = if renders_inline(&object.content_type) {
        "inline"
    } else {
        "attachment"
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, &object.content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("{disposition}; filename=\"{}\"", file_name(key)),
        );
    if let Some(len) = object.content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }
    if let Some(range) = &object.content_range {
        builder = builder.header(header::CONTENT_RANGE, range);
    }

    builder
        .body(object.body)
        .map_err(|e| AppError::Internal(format!("building media response: {e}")))
}

/// A file received through a multipart `file` field.
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Reads the first `file` field. Other fields are skipped.
pub async fn read_upload(multipart: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(&file_name).to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        if bytes.is_empty() {
            return Err(AppError::validation("uploaded file is empty"));
        }
        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(AppError::validation("multipart field 'file' is required"))
}

/// Builds a collision-free object key under `prefix`, keeping a readable file name.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .take(100)
        .collect();
    format!("{prefix}/{}-{safe}", Uuid::new_v4())
}
