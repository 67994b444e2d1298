use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdminDashboardStats, Article, ArticleComment, ArticleFilter, Book, BookProgress,
    CreateArticleRequest, CreateBookRequest, CreatePinRequest, CreateRoleRequest, EarnedPin,
    LikeState, NewProjectQuote, NewUser, Permission, Pin, PinAward, ProgressUpdate, ProjectQuote,
    ReferralEntry, Referido, Role, RoleWithPermissions, UpdateArticleRequest, UpdatePinRequest,
    UpdateProfileRequest, User, UserAccess, UserFlagsUpdate, UserPin,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Names of the unique constraints declared in the migrations. A violation of
/// any of these surfaces as `RepoError::Conflict(name)`.
pub mod constraints {
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const ROLES_NAME: &str = "roles_name_key";
    pub const ROLE_PERMISSIONS: &str = "role_permissions_pkey";
    pub const PINS_NAME: &str = "pins_name_key";
    pub const USER_PINS: &str = "user_pins_pkey";
    pub const ARTICLES_SLUG: &str = "articles_slug_key";
    pub const ARTICLE_LIKES: &str = "article_likes_pkey";
    pub const REFERIDOS: &str = "referidos_referrer_referred_key";
    pub const REFERIDOS_NO_SELF: &str = "referidos_no_self_referral";
}

/// RepoError
///
/// Persistence failures, split so that handlers can tell a duplicate or a
/// missing row apart from a broken connection.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("row not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    /// A CHECK constraint rejected the row; carries the constraint name.
    #[error("check constraint violated: {0}")]
    Invalid(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    RepoError::Conflict(db.constraint().unwrap_or_default().to_string())
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => RepoError::NotFound,
                sqlx::error::ErrorKind::CheckViolation => {
                    RepoError::Invalid(db.constraint().unwrap_or_default().to_string())
                }
                _ => RepoError::Database(err),
            },
            _ => RepoError::Database(err),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres implementation and the in-memory one
/// used by the integration tests are interchangeable.
///
/// Operations that target a single row return `RepoError::NotFound` when it is
/// missing; lookups that are allowed to miss return `Option`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<User>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Inserts a user with the role named in `new.role_name`. Unknown role → NotFound.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<User>;
    async fn set_password_hash(&self, id: Uuid, hash: &str) -> RepoResult<()>;
    async fn set_user_flags(&self, id: Uuid, flags: UserFlagsUpdate) -> RepoResult<User>;
    async fn set_user_role(&self, id: Uuid, role_id: Uuid) -> RepoResult<User>;
    async fn record_login(&self, id: Uuid) -> RepoResult<()>;
    /// User, role and permission set in a single round trip.
    async fn get_user_access(&self, id: Uuid) -> RepoResult<Option<UserAccess>>;

    // --- Roles & permissions ---
    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
    async fn list_roles(&self) -> RepoResult<Vec<RoleWithPermissions>>;
    async fn create_role(&self, req: CreateRoleRequest) -> RepoResult<Role>;
    async fn list_permissions(&self) -> RepoResult<Vec<Permission>>;
    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> RepoResult<()>;
    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> RepoResult<()>;

    // --- Pins ---
    async fn list_pins(&self, include_inactive: bool) -> RepoResult<Vec<Pin>>;
    /// Active or not.
    async fn get_pin(&self, id: Uuid) -> RepoResult<Pin>;
    async fn create_pin(&self, req: CreatePinRequest) -> RepoResult<Pin>;
    async fn update_pin(&self, id: Uuid, req: UpdatePinRequest) -> RepoResult<Pin>;
    /// At most one award per (user, pin). A repeat award → Conflict(USER_PINS).
    async fn award_pin(&self, award: PinAward) -> RepoResult<UserPin>;
    async fn revoke_pin(&self, user_id: Uuid, pin_id: Uuid) -> RepoResult<()>;
    async fn list_user_pins(&self, user_id: Uuid) -> RepoResult<Vec<EarnedPin>>;

    // --- Articles ---
    async fn list_articles(&self, filter: ArticleFilter) -> RepoResult<Vec<Article>>;
    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Article>;
    async fn create_article(&self, author_id: Uuid, req: CreateArticleRequest)
    -> RepoResult<Article>;
    async fn update_article(&self, id: Uuid, req: UpdateArticleRequest) -> RepoResult<Article>;
    /// Removes the caller's like if present, adds it otherwise.
    async fn toggle_article_like(&self, article_id: Uuid, user_id: Uuid) -> RepoResult<LikeState>;
    async fn article_like_state(
        &self,
        article_id: Uuid,
        user_id: Option<Uuid>,
    ) -> RepoResult<LikeState>;
    async fn add_article_comment(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        body: String,
    ) -> RepoResult<ArticleComment>;
    async fn list_article_comments(&self, article_id: Uuid) -> RepoResult<Vec<ArticleComment>>;
    async fn get_article_comment(&self, id: i64) -> RepoResult<ArticleComment>;
    async fn delete_article_comment(&self, id: i64) -> RepoResult<()>;

    // --- Library ---
    async fn list_books(&self) -> RepoResult<Vec<Book>>;
    async fn get_book(&self, id: Uuid) -> RepoResult<Book>;
    async fn create_book(&self, req: CreateBookRequest) -> RepoResult<Book>;
    async fn get_book_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
    ) -> RepoResult<Option<BookProgress>>;
    /// Adds `seconds_read` to the stored total and recomputes `completed`.
    async fn upsert_book_progress(&self, update: ProgressUpdate) -> RepoResult<BookProgress>;

    // --- Referrals ---
    async fn create_referral(&self, referrer_id: Uuid, referred_id: Uuid) -> RepoResult<Referido>;
    async fn list_referrals_by(&self, referrer_id: Uuid) -> RepoResult<Vec<ReferralEntry>>;
    async fn list_all_referrals(&self) -> RepoResult<Vec<Referido>>;

    // --- Project quotes ---
    async fn create_quote(&self, quote: NewProjectQuote) -> RepoResult<ProjectQuote>;
    async fn list_quotes(&self, pending_only: bool) -> RepoResult<Vec<ProjectQuote>>;
    async fn respond_quote(&self, id: Uuid, admin_note: Option<String>)
    -> RepoResult<ProjectQuote>;

    // --- Dashboard ---
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
