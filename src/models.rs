use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::estimator::PriceEstimate;

// --- Identity & Access (Mapped to Database) ---

/// User
///
/// A community member joined with the name of their (single) role.
/// The password hash is loaded for credential checks but never serialized.
#[derive(Debug, Clone, Serialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role_id: Uuid,
    // Loaded via JOIN on `roles`.
    pub role_name: String,
    pub is_subscribed: bool,
    pub is_active: bool,
    #[ts(type = "string | null")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown next to comments and referrals.
    pub fn public_name(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Permission
///
/// A (resource, action) pair such as `users:read`. Reference data seeded by migrations.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Permission {
    pub id: Uuid,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
}

impl Permission {
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

#[derive(Debug, Clone, Serialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleWithPermissions {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
}

/// UserAccess
///
/// The compound read used by the authorization check: a user, their role name
/// and the flat set of (resource, action) pairs attached to that role.
#[derive(Debug, Clone, Default)]
pub struct UserAccess {
    pub user_id: Uuid,
    pub is_active: bool,
    pub role_name: String,
    pub permissions: HashSet<(String, String)>,
}

/// Internal insert payload. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role_name: String,
    pub is_subscribed: bool,
}

// --- Auth Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    /// Username of the member who referred this registration.
    pub referral_code: Option<String>,
    #[serde(default)]
    pub newsletter: bool,
}

/// LoginRequest
///
/// `identifier` accepts either the email or the username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct SubscriptionStatus {
    pub is_subscribed: bool,
    pub role: String,
    /// True when subscriber-only content is readable (subscription or super-role).
    pub premium_access: bool,
}

// --- Admin: users & roles ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminCreateUserRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    /// Role name; defaults to the configured default role.
    pub role: Option<String>,
    #[serde(default)]
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserFlagsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_subscribed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignRoleRequest {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GrantPermissionRequest {
    pub permission_id: Uuid,
}

/// AdminDashboardStats
///
/// Counters for the administrative dashboard (GET /api/admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub subscribed_users: i64,
    pub total_articles: i64,
    pub pins_awarded: i64,
    /// Quotes not yet marked as responded.
    pub pending_quotes: i64,
    pub total_referrals: i64,
}

// --- Pins ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Pin {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePinRequest {
    pub name: String,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePinRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AwardPinRequest {
    pub pin_id: Uuid,
    pub reason: Option<String>,
}

/// UserPin
///
/// One award of a pin to a user. (user_id, pin_id) is the primary key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserPin {
    pub user_id: Uuid,
    pub pin_id: Uuid,
    #[ts(type = "string")]
    pub earned_at: DateTime<Utc>,
    pub granted_by: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PinAward {
    pub user_id: Uuid,
    pub pin_id: Uuid,
    pub granted_by: Option<Uuid>,
    pub reason: Option<String>,
}

/// EarnedPin
///
/// A pin as shown on a member's profile (pin catalogue row joined with the award).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EarnedPin {
    pub pin_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub category: Option<String>,
    #[ts(type = "string")]
    pub earned_at: DateTime<Utc>,
    pub reason: Option<String>,
}

// --- Articles ---

/// Article
///
/// Blog entry. `content` is an opaque rich-text document produced by the editor.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    #[schema(value_type = Object)]
    pub content: Value,
    pub cover_image_key: Option<String>,
    pub is_public: bool,
    pub subscriber_only: bool,
    pub author_id: Uuid,
    #[sqlx(default)]
    pub author_name: Option<String>,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.is_public && self.published_at.is_some_and(|at| at <= now)
    }
}

/// ArticleView
///
/// Read model for a single article. Subscriber-only content is withheld
/// (`content: null`, `locked: true`) from readers without premium access.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleView {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub content: Option<Value>,
    pub cover_image_key: Option<String>,
    pub subscriber_only: bool,
    pub locked: bool,
    pub author_name: Option<String>,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ArticleView {
    pub fn from_article(article: Article, premium_access: bool) -> Self {
        let locked = article.subscriber_only && !premium_access;
        Self {
            id: article.id,
            slug: article.slug,
            title: article.title,
            excerpt: article.excerpt,
            content: if locked { None } else { Some(article.content) },
            cover_image_key: article.cover_image_key,
            subscriber_only: article.subscriber_only,
            locked,
            author_name: article.author_name,
            published_at: article.published_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateArticleRequest {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    #[schema(value_type = Object)]
    pub content: Value,
    pub cover_image_key: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub subscriber_only: bool,
    /// Publish immediately (sets `published_at` to now).
    #[serde(default)]
    pub publish: bool,
}

/// UpdateArticleRequest
///
/// Partial update. `publish: Some(true)` stamps `published_at` if unset,
/// `Some(false)` moves the article back to draft.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateArticleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleFilter {
    /// Moderators see drafts and hidden articles too.
    pub include_unpublished: bool,
}

/// LikeState
///
/// Net like state after a toggle: whether the caller likes the article and the total count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, Eq)]
#[ts(export)]
pub struct LikeState {
    pub liked: bool,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ArticleComment {
    pub id: i64,
    pub article_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub body: String,
}

// --- Library ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub pdf_key: String,
    pub cover_key: Option<String>,
    pub total_pages: i32,
    pub subscriber_only: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub pdf_key: String,
    pub cover_key: Option<String>,
    #[serde(default)]
    pub total_pages: i32,
    #[serde(default)]
    pub subscriber_only: bool,
}

/// BookProgress
///
/// Per-user reading position. `completed` is derived from the page counters
/// and `time_spent_seconds` accumulates across updates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BookProgress {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub current_page: i32,
    pub total_pages: i32,
    pub completed: bool,
    pub time_spent_seconds: i64,
    #[ts(type = "string")]
    pub last_read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProgressRequest {
    pub current_page: i32,
    /// Defaults to the catalogue page count.
    pub total_pages: Option<i32>,
    /// Reading time since the previous update.
    #[serde(default)]
    pub seconds_read: i64,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub current_page: i32,
    pub total_pages: i32,
    pub seconds_read: i64,
}

impl ProgressUpdate {
    pub fn completed(&self) -> bool {
        self.total_pages > 0 && self.current_page >= self.total_pages
    }
}

// --- Referrals ---

/// Referido
///
/// Directed referral edge: `referrer_id` brought `referred_id` into the community.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Referido {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ReferralEntry {
    pub id: Uuid,
    pub referred_id: Uuid,
    pub referred_username: Option<String>,
    pub referred_display_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReferralSummary {
    pub count: usize,
    pub referrals: Vec<ReferralEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReferralRequest {
    pub referred_user_id: Option<Uuid>,
    pub referred_email: Option<String>,
}

// --- Project quotes ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ProjectQuote {
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = Object)]
    pub answers: Value,
    pub estimate_min: i64,
    pub estimate_max: i64,
    pub responded: bool,
    #[ts(type = "string | null")]
    pub responded_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// CreateQuoteRequest
///
/// Any client-computed `estimate` is accepted on the wire but never trusted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateQuoteRequest {
    pub email: String,
    #[schema(value_type = Object)]
    pub answers: Value,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub estimate: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct NewProjectQuote {
    pub email: String,
    pub answers: Value,
    pub estimate: PriceEstimate,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RespondQuoteRequest {
    pub admin_note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuoteFilter {
    /// Only quotes that have not been responded to.
    #[serde(default)]
    pub pending: bool,
}

// --- Uploads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadResponse {
    /// Object key to reference the file from other records.
    pub key: String,
    pub content_type: String,
    pub size: usize,
}
