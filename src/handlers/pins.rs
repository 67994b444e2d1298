use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, perms},
    error::{ApiJson, ApiPath, AppError, ErrorBody, OrNotFound},
    models::{AwardPinRequest, CreatePinRequest, Pin, PinAward, UpdatePinRequest, UserPin},
    validation::non_blank,
};

/// list_pins
///
/// [Public Route] Active pins, alphabetically.
#[utoipa::path(
    get,
    path = "/api/pins",
    responses((status = 200, description = "Active pins", body = [Pin])),
    tag = "pins"
)]
pub async fn list_pins(State(state): State<AppState>) -> Result<Json<Vec<Pin>>, AppError> {
    Ok(Json(state.repo.list_pins(false).await?))
}

/// admin_list_pins
///
/// [Admin Route] All pins including retired ones. Requires `pins:update`.
#[utoipa::path(
    get,
    path = "/api/admin/pins",
    responses((status = 200, description = "All pins", body = [Pin])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_list_pins(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Pin>>, AppError> {
    authz::authorize(&state, &user, perms::PINS_UPDATE).await?;
    Ok(Json(state.repo.list_pins(true).await?))
}

/// create_pin
///
/// [Admin Route] Adds a pin to the catalogue. Requires `pins:create`.
#[utoipa::path(
    post,
    path = "/api/admin/pins",
    request_body = CreatePinRequest,
    responses(
        (status = 201, description = "Created", body = Pin),
        (status = 409, description = "Name taken", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_pin(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<CreatePinRequest>,
) -> Result<(StatusCode, Json<Pin>), AppError> {
    authz::authorize(&state, &user, perms::PINS_CREATE).await?;
    payload.name = non_blank("name", &payload.name)?;
    let pin = state.repo.create_pin(payload).await?;
    tracing::info!(pin_id = %pin.id, "pin created");
    Ok((StatusCode::CREATED, Json(pin)))
}

/// update_pin
///
/// [Admin Route] Edits or retires a pin. Requires `pins:update`.
#[utoipa::path(
    patch,
    path = "/api/admin/pins/{id}",
    params(("id" = Uuid, Path, description = "Pin ID")),
    request_body = UpdatePinRequest,
    responses((status = 200, description = "Updated", body = Pin)),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_pin(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut payload): ApiJson<UpdatePinRequest>,
) -> Result<Json<Pin>, AppError> {
    authz::authorize(&state, &user, perms::PINS_UPDATE).await?;
    if let Some(name) = &payload.name {
        payload.name = Some(non_blank("name", name)?);
    }
    Ok(Json(state.repo.update_pin(id, payload).await.or_not_found("pin")?))
}

/// award_pin
///
/// [Admin Route] Awards a pin to a user. A user holds a given pin at most
/// once; a repeat award answers 409 and leaves the original award intact.
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/pins",
    params(("id" = Uuid, Path, description = "Recipient user ID")),
    request_body = AwardPinRequest,
    responses(
        (status = 201, description = "Awarded", body = UserPin),
        (status = 404, description = "Unknown user or pin", body = ErrorBody),
        (status = 409, description = "Already awarded", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(granted_by = %user.id, recipient = %recipient))]
pub async fn award_pin(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(recipient): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AwardPinRequest>,
) -> Result<(StatusCode, Json<UserPin>), AppError> {
    authz::authorize(&state, &user, perms::PINS_AWARD).await?;

    let pin = state.repo.get_pin(payload.pin_id).await.or_not_found("pin")?;
    if !pin.is_active {
        return Err(AppError::validation("pin is no longer active"));
    }

    let award = state
        .repo
        .award_pin(PinAward {
            user_id: recipient,
            pin_id: pin.id,
            granted_by: Some(user.id),
            reason: payload.reason,
        })
        .await
        .or_not_found("user")?;
    tracing::info!(pin_id = %pin.id, "pin awarded");
    Ok((StatusCode::CREATED, Json(award)))
}

/// revoke_pin
///
/// [Admin Route] Takes a pin back from a user. Requires `pins:revoke`.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}/pins/{pin_id}",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("pin_id" = Uuid, Path, description = "Pin ID")
    ),
    responses(
        (status = 204, description = "Revoked"),
        (status = 404, description = "User does not hold this pin", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(revoked_by = %user.id))]
pub async fn revoke_pin(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((user_id, pin_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    authz::authorize(&state, &user, perms::PINS_REVOKE).await?;
    state
        .repo
        .revoke_pin(user_id, pin_id)
        .await
        .or_not_found("pin award")?;
    tracing::info!(%user_id, %pin_id, "pin revoked");
    Ok(StatusCode::NO_CONTENT)
}
