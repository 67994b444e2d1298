use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::{
    AppState,
    auth::TokenSubject,
    error::{ApiJson, AppError, ErrorBody},
    models::{AuthResponse, LoginRequest, MessageResponse, NewUser, RegisterRequest, User},
    password::{hash_password, verify_password},
    validation::{normalize_email, validate_password, validate_username},
};

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthenticated("invalid credentials".to_string())
}

/// register
///
/// [Public Route] Creates an account with the default role and returns a
/// session token. An optional `referral_code` (the referrer's username)
/// records a referral edge; `newsletter: true` subscribes the email.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email or username taken", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    let username = trimmed(payload.username);
    if let Some(username) = &username {
        validate_username(username)?;
    }

    // Resolved first so an unknown code fails before the account exists.
    let referrer = match trimmed(payload.referral_code) {
        Some(code) => Some(
            state
                .repo
                .find_user_by_username(&code)
                .await?
                .ok_or_else(|| AppError::validation("unknown referral code"))?,
        ),
        None => None,
    };

    let user = state
        .repo
        .create_user(NewUser {
            email,
            username,
            password_hash: hash_password(&payload.password)?,
            display_name: trimmed(payload.display_name),
            role_name: state.config.default_role.clone(),
            is_subscribed: false,
        })
        .await?;
    tracing::info!(user_id = %user.id, "user registered");

    if let Some(referrer) = referrer {
        if let Err(e) = state.repo.create_referral(referrer.id, user.id).await {
            tracing::warn!(referrer = %referrer.id, referred = %user.id, error = %e, "referral not recorded");
        }
    }

    if payload.newsletter {
        if let Err(e) = state
            .newsletter
            .subscribe(&user.email, user.display_name.as_deref())
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "newsletter subscription failed");
        }
    }

    let token = state.tokens.issue(&TokenSubject::from(&user))?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn find_by_identifier(state: &AppState, identifier: &str) -> Result<Option<User>, AppError> {
    let found = if identifier.contains('@') {
        state.repo.find_user_by_email(&identifier.to_lowercase()).await?
    } else {
        state.repo.find_user_by_username(identifier).await?
    };
    Ok(found)
}

/// login
///
/// [Public Route] Exchanges email-or-username plus password for a token.
/// Unknown identifiers and wrong passwords get the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 403, description = "Account disabled", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let identifier = payload.identifier.trim();
    let user = find_by_identifier(&state, identifier)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "login rejected: wrong password");
        return Err(invalid_credentials());
    }
    if !user.is_active {
        return Err(AppError::Forbidden("account is disabled".to_string()));
    }

    state.repo.record_login(user.id).await?;
    let token = state.tokens.issue(&TokenSubject::from(&user))?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse { token, user }))
}

/// logout
///
/// Tokens are stateless; the client simply discards its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Acknowledged", body = MessageResponse)),
    tag = "auth"
)]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new("logged out"))
}
