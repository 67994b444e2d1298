//! HTTP handlers, one module per feature area.
//!
//! Every handler returns `Result<_, AppError>`. Privileged handlers call
//! [`crate::authz::authorize`] before touching the repository.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

pub mod admin;
pub mod articles;
pub mod auth;
pub mod books;
pub mod forum;
pub mod me;
pub mod media;
pub mod pins;
pub mod quotes;
pub mod referidos;

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub status: &'static str,
}

/// health
///
/// [Public Route] Liveness probe for load balancers.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = Health)),
    tag = "health"
)]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
