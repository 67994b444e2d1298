use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, perms},
    error::{ApiJson, AppError, ErrorBody, OrNotFound},
    models::{CreateReferralRequest, ReferralSummary, Referido},
    validation::normalize_email,
};

/// my_referrals
///
/// [Authenticated Route] People the caller has brought in, newest first.
#[utoipa::path(
    get,
    path = "/api/referidos",
    responses((status = 200, description = "Referral summary", body = ReferralSummary)),
    security(("bearer" = [])),
    tag = "referidos"
)]
pub async fn my_referrals(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReferralSummary>, AppError> {
    let referrals = state.repo.list_referrals_by(user.id).await?;
    Ok(Json(ReferralSummary {
        count: referrals.len(),
        referrals,
    }))
}

/// create_referral
///
/// [Authenticated Route] Records the caller as referrer of an existing user,
/// identified by id or by email.
#[utoipa::path(
    post,
    path = "/api/referidos",
    request_body = CreateReferralRequest,
    responses(
        (status = 201, description = "Recorded", body = Referido),
        (status = 400, description = "No target given, or self-referral", body = ErrorBody),
        (status = 404, description = "Referred user not found", body = ErrorBody),
        (status = 409, description = "Already recorded", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "referidos"
)]
#[instrument(skip_all, fields(referrer = %user.id))]
pub async fn create_referral(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateReferralRequest>,
) -> Result<(StatusCode, Json<Referido>), AppError> {
    let referred_id = match (payload.referred_user_id, payload.referred_email) {
        (Some(id), _) => id,
        (None, Some(email)) => {
            let email = normalize_email(&email)?;
            state
                .repo
                .find_user_by_email(&email)
                .await?
                .ok_or_else(|| AppError::not_found("user"))?
                .id
        }
        (None, None) => {
            return Err(AppError::validation(
                "referred_user_id or referred_email is required",
            ));
        }
    };
    if referred_id == user.id {
        return Err(AppError::validation("you cannot refer yourself"));
    }

    let referral = state
        .repo
        .create_referral(user.id, referred_id)
        .await
        .or_not_found("user")?;
    tracing::info!(%referred_id, "referral recorded");
    Ok((StatusCode::CREATED, Json(referral)))
}

/// admin_list_referrals
///
/// [Admin Route] Every referral edge. Requires `referrals:read`.
#[utoipa::path(
    get,
    path = "/api/admin/referidos",
    responses((status = 200, description = "All referrals", body = [Referido])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_list_referrals(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Referido>>, AppError> {
    authz::authorize(&state, &user, perms::REFERRALS_READ).await?;
    Ok(Json(state.repo.list_all_referrals().await?))
}
