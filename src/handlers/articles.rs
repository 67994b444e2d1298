use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, has_premium_access, perms},
    error::{ApiJson, ApiMultipart, ApiPath, AppError, ErrorBody, OrNotFound},
    handlers::media::{object_key, read_upload},
    models::{
        Article, ArticleComment, ArticleFilter, ArticleView, CreateArticleRequest,
        CreateCommentRequest, LikeState, UpdateArticleRequest, UploadResponse,
    },
    validation::{non_blank, validate_slug},
};

const MAX_COMMENT_CHARS: usize = 2000;

/// Resolves a slug to an article the caller may see. Drafts and hidden
/// articles are reported as missing unless the caller can edit articles.
async fn visible_article(
    state: &AppState,
    slug: &str,
    user: Option<&AuthUser>,
) -> Result<Article, AppError> {
    let article = state
        .repo
        .get_article_by_slug(slug)
        .await
        .or_not_found("article")?;
    if article.is_published(Utc::now()) {
        return Ok(article);
    }
    match user {
        Some(u) if authz::is_allowed(state, u, perms::ARTICLES_UPDATE).await => Ok(article),
        _ => Err(AppError::not_found("article")),
    }
}

/// list_articles
///
/// [Public Route] Published articles, newest first. Subscriber-only entries
/// are listed but locked for readers without premium access.
#[utoipa::path(
    get,
    path = "/api/articles",
    responses((status = 200, description = "Published articles", body = [ArticleView])),
    tag = "articles"
)]
pub async fn list_articles(
    State(state): State<AppState>,
    user: Option<AuthUser>,
) -> Result<Json<Vec<ArticleView>>, AppError> {
    let premium = has_premium_access(user.as_ref(), &state.config.super_roles);
    let articles = state.repo.list_articles(ArticleFilter::default()).await?;
    Ok(Json(
        articles
            .into_iter()
            .map(|a| ArticleView::from_article(a, premium))
            .collect(),
    ))
}

/// get_article
///
/// [Public Route] Single article by slug. Returns `content: null, locked: true`
/// instead of 403 when the reader lacks premium access.
#[utoipa::path(
    get,
    path = "/api/articles/{slug}",
    params(("slug" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Article", body = ArticleView),
        (status = 404, description = "Not found or unpublished", body = ErrorBody)
    ),
    tag = "articles"
)]
pub async fn get_article(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<ArticleView>, AppError> {
    let article = visible_article(&state, &slug, user.as_ref()).await?;
    let premium = has_premium_access(user.as_ref(), &state.config.super_roles);
    Ok(Json(ArticleView::from_article(article, premium)))
}

/// list_comments
///
/// [Public Route] Comments of a visible article, oldest first.
#[utoipa::path(
    get,
    path = "/api/articles/{slug}/comments",
    params(("slug" = String, Path, description = "Article slug")),
    responses((status = 200, description = "Comments", body = [ArticleComment])),
    tag = "articles"
)]
pub async fn list_comments(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Vec<ArticleComment>>, AppError> {
    let article = visible_article(&state, &slug, user.as_ref()).await?;
    Ok(Json(state.repo.list_article_comments(article.id).await?))
}

/// like_state
///
/// [Public Route] Like count; `liked` reflects the caller when a token is sent.
#[utoipa::path(
    get,
    path = "/api/articles/{slug}/likes",
    params(("slug" = String, Path, description = "Article slug")),
    responses((status = 200, description = "Like state", body = LikeState)),
    tag = "articles"
)]
pub async fn like_state(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<LikeState>, AppError> {
    let article = visible_article(&state, &slug, user.as_ref()).await?;
    let like_state = state
        .repo
        .article_like_state(article.id, user.map(|u| u.id))
        .await?;
    Ok(Json(like_state))
}

/// toggle_like
///
/// [Authenticated Route] Likes the article, or removes the like if already present.
#[utoipa::path(
    post,
    path = "/api/articles/{slug}/likes",
    params(("slug" = String, Path, description = "Article slug")),
    responses((status = 200, description = "Like state after the toggle", body = LikeState)),
    security(("bearer" = [])),
    tag = "articles"
)]
#[instrument(skip_all, fields(user_id = %user.id, slug = %slug))]
pub async fn toggle_like(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<LikeState>, AppError> {
    let article = visible_article(&state, &slug, Some(&user)).await?;
    let like_state = state
        .repo
        .toggle_article_like(article.id, user.id)
        .await
        .or_not_found("article")?;
    tracing::debug!(liked = like_state.liked, count = like_state.count, "like toggled");
    Ok(Json(like_state))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment on a visible article.
#[utoipa::path(
    post,
    path = "/api/articles/{slug}/comments",
    params(("slug" = String, Path, description = "Article slug")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = ArticleComment),
        (status = 400, description = "Empty or oversized comment", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "articles"
)]
#[instrument(skip_all, fields(user_id = %user.id, slug = %slug))]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ArticleComment>), AppError> {
    let body = non_blank("comment", &payload.body)?;
    if body.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(format!(
            "comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    let article = visible_article(&state, &slug, Some(&user)).await?;
    let comment = state
        .repo
        .add_article_comment(article.id, user.id, body)
        .await
        .or_not_found("article")?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Authenticated Route] Authors delete their own comments; anyone else needs
/// `articles:moderate`.
#[utoipa::path(
    delete,
    path = "/api/articles/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author and not a moderator", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "articles"
)]
#[instrument(skip_all, fields(user_id = %user.id, comment_id = id))]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, AppError> {
    let comment = state
        .repo
        .get_article_comment(id)
        .await
        .or_not_found("comment")?;
    if comment.user_id != user.id {
        authz::authorize(&state, &user, perms::ARTICLES_MODERATE).await?;
        tracing::info!(author = %comment.user_id, "moderator removed comment");
    }
    state
        .repo
        .delete_article_comment(id)
        .await
        .or_not_found("comment")?;
    Ok(StatusCode::NO_CONTENT)
}

/// upload_image
///
/// [Authenticated Route] Stores an article image (multipart field `file`,
/// `image/*` only) and returns its key. Requires `articles:create`.
#[utoipa::path(
    post,
    path = "/api/articles/images",
    request_body(content_type = "multipart/form-data", description = "Field `file`: the image"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 400, description = "Missing file or not an image", body = ErrorBody),
        (status = 403, description = "Missing articles:create", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "articles"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_image(
    user: AuthUser,
    State(state): State<AppState>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    authz::authorize(&state, &user, perms::ARTICLES_CREATE).await?;
    let upload = read_upload(&mut multipart).await?;
    if !upload.content_type.starts_with("image/") {
        return Err(AppError::validation("only image uploads are accepted"));
    }

    let key = object_key("articles", &upload.file_name);
    let size = upload.bytes.len();
    state
        .storage
        .put_object(&state.config.buckets.articles, &key, upload.bytes, &upload.content_type)
        .await?;
    tracing::info!(key = %key, size, "article image stored");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key,
            content_type: upload.content_type,
            size,
        }),
    ))
}

// --- Admin ---

/// admin_list_articles
///
/// [Admin Route] Every article, drafts included. Requires `articles:update`.
#[utoipa::path(
    get,
    path = "/api/admin/articles",
    responses((status = 200, description = "All articles", body = [Article])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_list_articles(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Article>>, AppError> {
    authz::authorize(&state, &user, perms::ARTICLES_UPDATE).await?;
    let filter = ArticleFilter {
        include_unpublished: true,
    };
    Ok(Json(state.repo.list_articles(filter).await?))
}

/// create_article
///
/// [Admin Route] Requires `articles:create`. The caller becomes the author.
#[utoipa::path(
    post,
    path = "/api/admin/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = Article),
        (status = 409, description = "Slug taken", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_article(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    authz::authorize(&state, &user, perms::ARTICLES_CREATE).await?;
    payload.slug = payload.slug.trim().to_string();
    validate_slug(&payload.slug)?;
    payload.title = non_blank("title", &payload.title)?;

    let article = state.repo.create_article(user.id, payload).await?;
    tracing::info!(article_id = %article.id, slug = %article.slug, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

/// update_article
///
/// [Admin Route] Partial update, including publish/unpublish. Requires `articles:update`.
#[utoipa::path(
    patch,
    path = "/api/admin/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = Article),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, article_id = %id))]
pub async fn update_article(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut payload): ApiJson<UpdateArticleRequest>,
) -> Result<Json<Article>, AppError> {
    authz::authorize(&state, &user, perms::ARTICLES_UPDATE).await?;
    if let Some(title) = &payload.title {
        payload.title = Some(non_blank("title", title)?);
    }
    let article = state
        .repo
        .update_article(id, payload)
        .await
        .or_not_found("article")?;
    Ok(Json(article))
}
