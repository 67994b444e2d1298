use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod estimator;
pub mod handlers;
pub mod models;
pub mod newsletter;
pub mod password;
pub mod range;
pub mod repository;
pub mod routes;
pub mod storage;
pub mod validation;

use auth::{AuthUser, TokenKeys};
use handlers::media::MAX_UPLOAD_BYTES;
use routes::{admin, authenticated, public};

pub use config::AppConfig;
pub use newsletter::NewsletterState;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::auth::register, handlers::auth::login, handlers::auth::logout,
        handlers::me::get_me, handlers::me::update_me, handlers::me::change_password,
        handlers::me::my_pins, handlers::me::subscription_status,
        handlers::articles::list_articles, handlers::articles::get_article,
        handlers::articles::list_comments, handlers::articles::like_state,
        handlers::articles::toggle_like, handlers::articles::add_comment,
        handlers::articles::delete_comment, handlers::articles::upload_image,
        handlers::articles::admin_list_articles, handlers::articles::create_article,
        handlers::articles::update_article,
        handlers::books::list_books, handlers::books::book_cover, handlers::books::book_pdf,
        handlers::books::get_progress, handlers::books::update_progress,
        handlers::books::create_book, handlers::books::upload_book_pdf,
        handlers::books::upload_book_cover,
        handlers::forum::get_forum_media, handlers::forum::upload_forum_media,
        handlers::pins::list_pins, handlers::pins::admin_list_pins, handlers::pins::create_pin,
        handlers::pins::update_pin, handlers::pins::award_pin, handlers::pins::revoke_pin,
        handlers::referidos::my_referrals, handlers::referidos::create_referral,
        handlers::referidos::admin_list_referrals,
        handlers::quotes::submit_quote, handlers::quotes::admin_list_quotes,
        handlers::quotes::respond_quote,
        handlers::admin::stats, handlers::admin::list_users, handlers::admin::create_user,
        handlers::admin::update_user_flags, handlers::admin::reset_password,
        handlers::admin::assign_role, handlers::admin::list_roles,
        handlers::admin::list_permissions, handlers::admin::create_role,
        handlers::admin::grant_permission, handlers::admin::revoke_permission,
    ),
    components(
        schemas(
            handlers::Health, error::ErrorBody, estimator::PriceEstimate,
            models::User, models::Role, models::Permission, models::RoleWithPermissions,
            models::RegisterRequest, models::LoginRequest, models::AuthResponse,
            models::MessageResponse, models::UpdateProfileRequest, models::ChangePasswordRequest,
            models::SubscriptionStatus, models::AdminCreateUserRequest, models::UserFlagsUpdate,
            models::ResetPasswordRequest, models::AssignRoleRequest, models::CreateRoleRequest,
            models::GrantPermissionRequest, models::AdminDashboardStats,
            models::Pin, models::CreatePinRequest, models::UpdatePinRequest,
            models::AwardPinRequest, models::UserPin, models::EarnedPin,
            models::Article, models::ArticleView, models::CreateArticleRequest,
            models::UpdateArticleRequest, models::LikeState, models::ArticleComment,
            models::CreateCommentRequest,
            models::Book, models::CreateBookRequest, models::BookProgress,
            models::UpdateProgressRequest,
            models::Referido, models::ReferralEntry, models::ReferralSummary,
            models::CreateReferralRequest,
            models::ProjectQuote, models::CreateQuoteRequest, models::RespondQuoteRequest,
            models::UploadResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "comunidad", description = "Community platform API")
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme referenced by `security(("bearer" = []))`.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// Shared, immutable handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
    pub tokens: TokenKeys,
    pub newsletter: NewsletterState,
}

impl AppState {
    /// Builds the state with token keys derived from `config`.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        config: AppConfig,
        newsletter: NewsletterState,
    ) -> Self {
        let tokens = TokenKeys::from_config(&config);
        Self {
            repo,
            storage,
            config,
            tokens,
            newsletter,
        }
    }
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(app_state: &AppState) -> TokenKeys {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless a valid bearer token for an active
/// user is present. The resolved `AuthUser` is cached in the request
/// extensions, so the handler's own extractor does not hit the database again.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles `/api` (public, authenticated and admin tables), Swagger UI and
/// the request-id / tracing / CORS stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let require_auth = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let api = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes().route_layer(require_auth()))
        .nest("/admin", admin::admin_routes().route_layer(require_auth()));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Span for one request, tagged with its `x-request-id` so every log line of
/// the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
