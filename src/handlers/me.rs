use axum::{Json, extract::State};
use tracing::instrument;

use crate::{
    AppState,
    auth::AuthUser,
    authz::has_premium_access,
    error::{ApiJson, AppError, ErrorBody, OrNotFound},
    models::{
        ChangePasswordRequest, EarnedPin, MessageResponse, SubscriptionStatus,
        UpdateProfileRequest, User,
    },
    password::{hash_password, verify_password},
    validation::{validate_password, validate_username},
};

/// get_me
///
/// [Authenticated Route] Current user's profile.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> Result<Json<User>, AppError> {
    let me = state.repo.get_user(user.id).await.or_not_found("user")?;
    Ok(Json(me))
}

/// update_me
///
/// [Authenticated Route] Partial profile update (display name, username).
#[utoipa::path(
    patch,
    path = "/api/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 409, description = "Username taken", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    payload.username = payload.username.map(|u| u.trim().to_string());
    if let Some(username) = &payload.username {
        validate_username(username)?;
    }
    payload.display_name = payload
        .display_name
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let updated = state
        .repo
        .update_profile(user.id, payload)
        .await
        .or_not_found("user")?;
    Ok(Json(updated))
}

/// change_password
///
/// [Authenticated Route] Requires the current password.
#[utoipa::path(
    put,
    path = "/api/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password is wrong", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let me = state.repo.get_user(user.id).await.or_not_found("user")?;
    if !verify_password(&payload.current_password, &me.password_hash)? {
        return Err(AppError::Unauthenticated(
            "current password is incorrect".to_string(),
        ));
    }
    validate_password(&payload.new_password)?;

    let hash = hash_password(&payload.new_password)?;
    state.repo.set_password_hash(user.id, &hash).await?;
    tracing::info!("password changed");
    Ok(Json(MessageResponse::new("password updated")))
}

/// my_pins
///
/// [Authenticated Route] Pins earned by the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/me/pins",
    responses((status = 200, description = "Earned pins", body = [EarnedPin])),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn my_pins(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EarnedPin>>, AppError> {
    Ok(Json(state.repo.list_user_pins(user.id).await?))
}

/// subscription_status
///
/// [Authenticated Route] Whether subscriber-only content is unlocked for the caller.
#[utoipa::path(
    get,
    path = "/api/subscription/status",
    responses((status = 200, description = "Subscription status", body = SubscriptionStatus)),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn subscription_status(
    user: AuthUser,
    State(state): State<AppState>,
) -> Json<SubscriptionStatus> {
    let premium_access = has_premium_access(Some(&user), &state.config.super_roles);
    Json(SubscriptionStatus {
        is_subscribed: user.is_subscribed,
        role: user.role,
        premium_access,
    })
}
