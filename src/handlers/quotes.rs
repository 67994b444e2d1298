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
    error::{ApiJson, ApiPath, ApiQuery, AppError, ErrorBody, OrNotFound},
    estimator,
    models::{CreateQuoteRequest, NewProjectQuote, ProjectQuote, QuoteFilter, RespondQuoteRequest},
    validation::normalize_email,
};

/// submit_quote
///
/// [Public Route] Stores a project questionnaire. The price range is always
/// computed here from `answers`; an `estimate` sent by the client is ignored.
#[utoipa::path(
    post,
    path = "/api/project-quotes",
    request_body = CreateQuoteRequest,
    responses(
        (status = 201, description = "Quote stored with server estimate", body = ProjectQuote),
        (status = 400, description = "Invalid email or answers", body = ErrorBody)
    ),
    tag = "quotes"
)]
#[instrument(skip_all)]
pub async fn submit_quote(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<ProjectQuote>), AppError> {
    let email = normalize_email(&payload.email)?;
    if let Some(client_estimate) = &payload.estimate {
        tracing::debug!(%client_estimate, "discarding client-side estimate");
    }

    let estimate = estimator::estimate(&payload.answers)?;
    let quote = state
        .repo
        .create_quote(NewProjectQuote {
            email,
            answers: payload.answers,
            estimate,
        })
        .await?;
    tracing::info!(
        quote_id = %quote.id,
        min = quote.estimate_min,
        max = quote.estimate_max,
        "project quote received"
    );
    Ok((StatusCode::CREATED, Json(quote)))
}

/// admin_list_quotes
///
/// [Admin Route] Newest first; `?pending=true` hides answered quotes.
#[utoipa::path(
    get,
    path = "/api/admin/project-quotes",
    params(QuoteFilter),
    responses((status = 200, description = "Quotes", body = [ProjectQuote])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_list_quotes(
    user: AuthUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<QuoteFilter>,
) -> Result<Json<Vec<ProjectQuote>>, AppError> {
    authz::authorize(&state, &user, perms::QUOTES_READ).await?;
    Ok(Json(state.repo.list_quotes(filter.pending).await?))
}

/// respond_quote
///
/// [Admin Route] Marks a quote as answered, with an optional note. Requires `quotes:update`.
#[utoipa::path(
    patch,
    path = "/api/admin/project-quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote ID")),
    request_body = RespondQuoteRequest,
    responses(
        (status = 200, description = "Marked as responded", body = ProjectQuote),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, quote_id = %id))]
pub async fn respond_quote(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<RespondQuoteRequest>,
) -> Result<Json<ProjectQuote>, AppError> {
    authz::authorize(&state, &user, perms::QUOTES_UPDATE).await?;
    let note = payload
        .admin_note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let quote = state
        .repo
        .respond_quote(id, note)
        .await
        .or_not_found("quote")?;
    Ok(Json(quote))
}
