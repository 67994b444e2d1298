use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Multipart, Request,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    auth::TokenError, estimator::EstimateError, password::PasswordError, repository::RepoError,
    storage::StorageError,
};

/// AppError
///
/// The single error type returned by handlers. Every failure crossing the HTTP
/// boundary is mapped onto one of these kinds and rendered as `{"error", "kind"}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("requested range not satisfiable")]
    RangeNotSatisfiable,
    /// The detail is logged, never sent to the client.
    #[error("internal server error")]
    Internal(String),
}

/// ErrorBody
///
/// Wire shape of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::RangeNotSatisfiable => "range_not_satisfiable",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden("insufficient permissions".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("resource not found".to_string()),
            RepoError::Conflict(constraint) => AppError::Conflict(conflict_message(&constraint)),
            RepoError::Invalid(constraint) => AppError::Validation(invalid_message(&constraint)),
            RepoError::Database(e) => AppError::Internal(format!("database: {e}")),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => AppError::NotFound("file not found".to_string()),
            StorageError::RangeNotSatisfiable => AppError::RangeNotSatisfiable,
            StorageError::Backend(e) => AppError::Internal(format!("storage: {e}")),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::Internal(format!("token signing: {e}")),
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<EstimateError> for AppError {
    fn from(err: EstimateError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Names the missing resource in the 404 message instead of the generic one.
pub trait OrNotFound<T> {
    fn or_not_found(self, what: &str) -> Result<T, AppError>;
}

impl<T> OrNotFound<T> for Result<T, RepoError> {
    fn or_not_found(self, what: &str) -> Result<T, AppError> {
        self.map_err(|e| match e {
            RepoError::NotFound => AppError::not_found(what),
            other => other.into(),
        })
    }
}

/// Maps a violated unique constraint onto the message shown to the client.
fn conflict_message(constraint: &str) -> String {
    use crate::repository::constraints::*;
    let msg = match constraint {
        USERS_EMAIL => "email already registered",
        USERS_USERNAME => "username already taken",
        ROLES_NAME => "role already exists",
        ROLE_PERMISSIONS => "role already has this permission",
        PINS_NAME => "a pin with this name already exists",
        USER_PINS => "user already holds this pin",
        ARTICLES_SLUG => "an article with this slug already exists",
        ARTICLE_LIKES => "article already liked",
        REFERIDOS => "referral already recorded",
        _ => "resource already exists",
    };
    msg.to_string()
}

fn invalid_message(constraint: &str) -> String {
    use crate::repository::constraints::*;
    match constraint {
        REFERIDOS_NO_SELF => "users cannot refer themselves".to_string(),
        _ => "invalid data".to_string(),
    }
}

/// ApiJson
///
/// `Json` extractor whose rejection is an `AppError::Validation`, so malformed
/// bodies get the same `{error}` shape as every other failure.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` extractor with `AppError` rejections (bad UUIDs, wrong segment types).
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `Query` extractor with `AppError` rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// ApiMultipart
///
/// `Multipart` extractor whose rejection (missing or malformed boundary) is an
/// `AppError::Validation`.
pub struct ApiMultipart(pub Multipart);

impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(ApiMultipart(Multipart::from_request(req, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::constraints;

    #[test]
    fn conflict_from_repository_keeps_conflict_kind() {
        let err: AppError = RepoError::Conflict(constraints::USERS_EMAIL.to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "email already registered");
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::Internal("connection reset by peer".to_string());
        assert_eq!(err.to_string(), "internal server error");
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn check_violation_is_a_validation_error() {
        let err: AppError = RepoError::Invalid(constraints::REFERIDOS_NO_SELF.to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.to_string(), "users cannot refer themselves");
    }

    #[test]
    fn storage_not_found_maps_to_404() {
        let err: AppError = StorageError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
