use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Body;
use bytes::Bytes;
use s3::config::http::HttpResponse;
use s3::error::{DisplayErrorContext, SdkError};
use s3::operation::get_object::GetObjectError;
use s3::primitives::ByteStream;
use thiserror::Error;

use crate::range::{self, Resolved};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found")]
    NotFound,
    #[error("requested range not satisfiable")]
    RangeNotSatisfiable,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// StoredObject
///
/// A fetched object ready to be proxied: the body streams straight from the
/// backend and `content_range` is set only when a range was honoured.
pub struct StoredObject {
    pub body: Body,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
}

/// StorageService
///
/// Abstract contract for the object storage layer. Handlers depend on the
/// trait object so the S3 client can be swapped for the in-memory mock in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called at startup in `Env::Local`
    /// to provision MinIO.
    async fn ensure_bucket_exists(&self, bucket: &str);

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Fetches an object. `range` is the raw `Range` header value and is
    /// forwarded to the backend untouched.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> Result<StoredObject, StorageError>;
}

/// S3StorageClient
///
/// Implementation over the AWS SDK. Works against MinIO locally and any
/// S3-compatible provider in production.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
}

impl S3StorageClient {
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is required by MinIO.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
        }
    }
}

fn map_get_error(err: SdkError<GetObjectError, HttpResponse>) -> StorageError {
    if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
        return StorageError::NotFound;
    }
    match err.raw_response().map(|r| r.status().as_u16()) {
        Some(404) => StorageError::NotFound,
        Some(416) => StorageError::RangeNotSatisfiable,
        _ => StorageError::Backend(DisplayErrorContext(&err).to_string()),
    }
}

/// Adapts the SDK byte stream into a body stream without buffering the object.
fn stream_body(stream: ByteStream) -> Body {
    let chunks = futures_util::stream::unfold(stream, |mut stream| async move {
        match stream.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), stream)),
            Some(Err(e)) => Some((Err(std::io::Error::other(e)), stream)),
            None => None,
        }
    });
    Body::from_stream(chunks)
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self, bucket: &str) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self.client.create_bucket().bucket(bucket).send().await {
            tracing::debug!(bucket, error = %DisplayErrorContext(&e), "create_bucket skipped");
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range.map(str::to_string))
            .send()
            .await
            .map_err(map_get_error)?;

        let content_type = output
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(key).to_string());
        let content_length = output.content_length().and_then(|l| u64::try_from(l).ok());
        let content_range = output.content_range().map(str::to_string);

        Ok(StoredObject {
            body: stream_body(output.body),
            content_type,
            content_length,
            content_range,
        })
    }
}

/// sanitize_key
///
/// Removes directory navigation segments (`..`, `.`) and empty segments from
/// a user-provided key, preventing path traversal across prefixes.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Best-effort MIME type from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// MockStorageService
///
/// In-memory `StorageService` for tests. Range headers are interpreted with
/// the same rules as S3, and `should_fail` turns every call into a backend error.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<(String, String), (Bytes, String)>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Seeds an object, returning the service for chaining in test setup.
    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.insert(bucket, key, body.into(), content_type);
        self
    }

    /// Returns the stored bytes, if any. Lets tests assert on uploads.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(bucket.to_string(), sanitize_key(key)))
            .map(|(bytes, _)| bytes.clone())
    }

    fn insert(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                (bucket.to_string(), sanitize_key(key)),
                (body, content_type.to_string()),
            );
    }

    fn fail() -> StorageError {
        StorageError::Backend("Mock Storage Error: Simulation requested".to_string())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self, _bucket: &str) {}

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(Self::fail());
        }
        self.insert(bucket, key, body, content_type);
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        if self.should_fail {
            return Err(Self::fail());
        }
        let (bytes, content_type) = self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(bucket.to_string(), sanitize_key(key)))
            .cloned()
            .ok_or(StorageError::NotFound)?;

        let total = bytes.len() as u64;
        let resolved = range.map_or(Resolved::Full, |r| range::resolve(r, total));
        match resolved {
            Resolved::Unsatisfiable => Err(StorageError::RangeNotSatisfiable),
            Resolved::Full => Ok(StoredObject {
                body: Body::from(bytes),
                content_type,
                content_length: Some(total),
                content_range: None,
            }),
            Resolved::Partial(r) => {
                let slice = bytes.slice(r.start as usize..=r.end as usize);
                Ok(StoredObject {
                    body: Body::from(slice),
                    content_type,
                    content_length: Some(r.len()),
                    content_range: Some(r.content_range(total)),
                })
            }
        }
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_key("forum//./a/b.png"), "forum/a/b.png");
    }

    #[test]
    fn content_type_guess_is_case_insensitive() {
        assert_eq!(content_type_for("Book.PDF"), "application/pdf");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn mock_honours_suffix_range() {
        let storage = MockStorageService::new().with_object("b", "k.txt", "hello world", "text/plain");
        let obj = storage.get_object("b", "k.txt", Some("bytes=-5")).await.unwrap();
        assert_eq!(obj.content_range.as_deref(), Some("bytes 6-10/11"));
        assert_eq!(obj.content_length, Some(5));
    }

    #[tokio::test]
    async fn failing_mock_reports_backend_error() {
        let storage = MockStorageService::new_failing();
        let err = storage.get_object("b", "k", None).await.err().unwrap();
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
