use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository, constraints};
use crate::models::{
    AdminDashboardStats, Article, ArticleComment, ArticleFilter, Book, BookProgress,
    CreateArticleRequest, CreateBookRequest, CreatePinRequest, CreateRoleRequest, EarnedPin,
    LikeState, NewProjectQuote, NewUser, Permission, Pin, PinAward, ProgressUpdate, ProjectQuote,
    ReferralEntry, Referido, Role, RoleWithPermissions, UpdateArticleRequest, UpdatePinRequest,
    UpdateProfileRequest, User, UserAccess, UserFlagsUpdate, UserPin,
};

// Every user read joins the role so `role_name` is always populated.
const USER_COLUMNS: &str = r#"
    u.id, u.email, u.username, u.password_hash, u.display_name, u.role_id,
    r.name AS role_name, u.is_subscribed, u.is_active, u.last_login_at, u.created_at
"#;

const ARTICLE_COLUMNS: &str = r#"
    a.id, a.slug, a.title, a.excerpt, a.content, a.cover_image_key, a.is_public,
    a.subscriber_only, a.author_id, COALESCE(w.display_name, w.username) AS author_name,
    a.published_at, a.created_at, a.updated_at
"#;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.article_id, c.user_id, c.body, c.created_at,
    COALESCE(w.display_name, w.username) AS author_name
"#;

const PIN_COLUMNS: &str = "id, name, description, image_key, category, is_active, created_at";

const BOOK_COLUMNS: &str =
    "id, title, author, description, pdf_key, cover_key, total_pages, subscriber_only, created_at";

const QUOTE_COLUMNS: &str = r#"
    id, email, answers, estimate_min, estimate_max, responded, responded_at, admin_note, created_at
"#;

/// Wraps a data-modifying statement that `RETURNING *` from `users` so the
/// result is joined with its role in the same round trip.
fn user_cte(statement: &str) -> String {
    format!("WITH u AS ({statement}) SELECT {USER_COLUMNS} FROM u JOIN roles r ON r.id = u.role_id")
}

fn article_cte(statement: &str) -> String {
    format!(
        "WITH a AS ({statement}) SELECT {ARTICLE_COLUMNS} FROM a LEFT JOIN users w ON w.id = a.author_id"
    )
}

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Queries are checked at runtime
/// (`query_as::<_, T>`), and constraint violations are translated by
/// `From<sqlx::Error> for RepoError`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE LOWER(u.email) = LOWER($1)"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.username = $1"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_user
    ///
    /// The role is resolved by name inside the INSERT; an unknown role inserts
    /// nothing and surfaces as `RowNotFound` → `RepoError::NotFound`.
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let sql = user_cte(
            r#"
            INSERT INTO users (email, username, password_hash, display_name, role_id, is_subscribed)
            SELECT $1, $2, $3, $4, r.id, $6 FROM roles r WHERE r.name = $5
            RETURNING *
            "#,
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(new.email)
            .bind(new.username)
            .bind(new.password_hash)
            .bind(new.display_name)
            .bind(new.role_name)
            .bind(new.is_subscribed)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id ORDER BY u.created_at DESC"
        );
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    /// update_profile
    ///
    /// Uses `COALESCE` so only the fields present in the request are written.
    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<User> {
        let sql = user_cte(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                username = COALESCE($3, username)
            WHERE id = $1
            RETURNING *
            "#,
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(req.display_name)
            .bind(req.username)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> RepoResult<()> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_user_flags(&self, id: Uuid, flags: UserFlagsUpdate) -> RepoResult<User> {
        let sql = user_cte(
            r#"
            UPDATE users
            SET is_active = COALESCE($2, is_active),
                is_subscribed = COALESCE($3, is_subscribed)
            WHERE id = $1
            RETURNING *
            "#,
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(flags.is_active)
            .bind(flags.is_subscribed)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn set_user_role(&self, id: Uuid, role_id: Uuid) -> RepoResult<User> {
        let sql = user_cte("UPDATE users SET role_id = $2 WHERE id = $1 RETURNING *");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn record_login(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// get_user_access
    ///
    /// One query joining user → role → permissions. The LEFT JOINs keep a row
    /// for roles without any permission attached.
    async fn get_user_access(&self, id: Uuid) -> RepoResult<Option<UserAccess>> {
        let rows = sqlx::query_as::<_, (Uuid, bool, String, Option<String>, Option<String>)>(
            r#"
            SELECT u.id, u.is_active, r.name, p.resource, p.action
            FROM users u
            JOIN roles r ON r.id = u.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let Some((user_id, is_active, role_name, _, _)) = rows.first().cloned() else {
            return Ok(None);
        };
        let permissions: HashSet<(String, String)> = rows
            .into_iter()
            .filter_map(|(_, _, _, resource, action)| Some((resource?, action?)))
            .collect();

        Ok(Some(UserAccess {
            user_id,
            is_active,
            role_name,
            permissions,
        }))
    }

    // --- ROLES & PERMISSIONS ---

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_roles(&self) -> RepoResult<Vec<RoleWithPermissions>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let grants = sqlx::query_as::<_, (Uuid, Uuid, String, String, Option<String>)>(
            r#"
            SELECT rp.role_id, p.id, p.resource, p.action, p.description
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            ORDER BY p.resource, p.action
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_role: HashMap<Uuid, Vec<Permission>> = HashMap::new();
        for (role_id, id, resource, action, description) in grants {
            by_role.entry(role_id).or_default().push(Permission {
                id,
                resource,
                action,
                description,
            });
        }

        Ok(roles
            .into_iter()
            .map(|role| RoleWithPermissions {
                permissions: by_role.remove(&role.id).unwrap_or_default(),
                id: role.id,
                name: role.name,
                description: role.description,
            })
            .collect())
    }

    async fn create_role(&self, req: CreateRoleRequest) -> RepoResult<Role> {
        Ok(sqlx::query_as::<_, Role>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id, name, description, created_at",
        )
        .bind(req.name)
        .bind(req.description)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_permissions(&self) -> RepoResult<Vec<Permission>> {
        Ok(sqlx::query_as::<_, Permission>(
            "SELECT id, resource, action, description FROM permissions ORDER BY resource, action",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> RepoResult<()> {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> RepoResult<()> {
        let res =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&self.pool)
                .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    // --- PINS ---

    async fn list_pins(&self, include_inactive: bool) -> RepoResult<Vec<Pin>> {
        let sql = format!("SELECT {PIN_COLUMNS} FROM pins WHERE ($1 OR is_active) ORDER BY name");
        Ok(sqlx::query_as::<_, Pin>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_pin(&self, id: Uuid) -> RepoResult<Pin> {
        let sql = format!("SELECT {PIN_COLUMNS} FROM pins WHERE id = $1");
        Ok(sqlx::query_as::<_, Pin>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn create_pin(&self, req: CreatePinRequest) -> RepoResult<Pin> {
        let sql = format!(
            "INSERT INTO pins (name, description, image_key, category) VALUES ($1, $2, $3, $4) RETURNING {PIN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Pin>(&sql)
            .bind(req.name)
            .bind(req.description)
            .bind(req.image_key)
            .bind(req.category)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_pin(&self, id: Uuid, req: UpdatePinRequest) -> RepoResult<Pin> {
        let sql = format!(
            r#"
            UPDATE pins
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                image_key = COALESCE($4, image_key),
                category = COALESCE($5, category),
                is_active = COALESCE($6, is_active)
            WHERE id = $1
            RETURNING {PIN_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Pin>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.description)
            .bind(req.image_key)
            .bind(req.category)
            .bind(req.is_active)
            .fetch_one(&self.pool)
            .await?)
    }

    /// award_pin
    ///
    /// Single conditional insert. `ON CONFLICT DO NOTHING RETURNING` yields no
    /// row for a repeat award, which is reported as a conflict on the pair.
    async fn award_pin(&self, award: PinAward) -> RepoResult<UserPin> {
        sqlx::query_as::<_, UserPin>(
            r#"
            INSERT INTO user_pins (user_id, pin_id, granted_by, reason)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, pin_id) DO NOTHING
            RETURNING user_id, pin_id, earned_at, granted_by, reason
            "#,
        )
        .bind(award.user_id)
        .bind(award.pin_id)
        .bind(award.granted_by)
        .bind(award.reason)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::Conflict(constraints::USER_PINS.to_string()))
    }

    async fn revoke_pin(&self, user_id: Uuid, pin_id: Uuid) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM user_pins WHERE user_id = $1 AND pin_id = $2")
            .bind(user_id)
            .bind(pin_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_user_pins(&self, user_id: Uuid) -> RepoResult<Vec<EarnedPin>> {
        Ok(sqlx::query_as::<_, EarnedPin>(
            r#"
            SELECT p.id AS pin_id, p.name, p.description, p.image_key, p.category,
                   up.earned_at, up.reason
            FROM user_pins up
            JOIN pins p ON p.id = up.pin_id
            WHERE up.user_id = $1
            ORDER BY up.earned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // --- ARTICLES ---

    /// list_articles
    ///
    /// Readers only see public articles whose publish date has passed;
    /// `include_unpublished` lifts that restriction for editors.
    async fn list_articles(&self, filter: ArticleFilter) -> RepoResult<Vec<Article>> {
        let sql = format!(
            r#"
            SELECT {ARTICLE_COLUMNS}
            FROM articles a
            LEFT JOIN users w ON w.id = a.author_id
            WHERE $1 OR (a.is_public AND a.published_at IS NOT NULL AND a.published_at <= NOW())
            ORDER BY COALESCE(a.published_at, a.created_at) DESC
            "#
        );
        Ok(sqlx::query_as::<_, Article>(&sql)
            .bind(filter.include_unpublished)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Article> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a LEFT JOIN users w ON w.id = a.author_id WHERE a.slug = $1"
        );
        Ok(sqlx::query_as::<_, Article>(&sql)
            .bind(slug)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn create_article(
        &self,
        author_id: Uuid,
        req: CreateArticleRequest,
    ) -> RepoResult<Article> {
        let sql = article_cte(
            r#"
            INSERT INTO articles
                (slug, title, excerpt, content, cover_image_key, is_public, subscriber_only,
                 author_id, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $9 THEN NOW() ELSE NULL END)
            RETURNING *
            "#,
        );
        Ok(sqlx::query_as::<_, Article>(&sql)
            .bind(req.slug)
            .bind(req.title)
            .bind(req.excerpt)
            .bind(req.content)
            .bind(req.cover_image_key)
            .bind(req.is_public)
            .bind(req.subscriber_only)
            .bind(author_id)
            .bind(req.publish)
            .fetch_one(&self.pool)
            .await?)
    }

    /// update_article
    ///
    /// Partial update through `COALESCE`. `publish = true` keeps an existing
    /// publish date, `publish = false` clears it.
    async fn update_article(&self, id: Uuid, req: UpdateArticleRequest) -> RepoResult<Article> {
        let sql = article_cte(
            r#"
            UPDATE articles
            SET title = COALESCE($2, title),
                excerpt = COALESCE($3, excerpt),
                content = COALESCE($4::jsonb, content),
                cover_image_key = COALESCE($5, cover_image_key),
                is_public = COALESCE($6, is_public),
                subscriber_only = COALESCE($7, subscriber_only),
                published_at = CASE
                    WHEN $8::boolean IS NULL THEN published_at
                    WHEN $8::boolean THEN COALESCE(published_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        );
        Ok(sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.excerpt)
            .bind(req.content)
            .bind(req.cover_image_key)
            .bind(req.is_public)
            .bind(req.subscriber_only)
            .bind(req.publish)
            .fetch_one(&self.pool)
            .await?)
    }

    /// toggle_article_like
    ///
    /// A single statement: delete the caller's like if it exists, otherwise
    /// insert it. Concurrent toggles are serialized by the primary key.
    async fn toggle_article_like(&self, article_id: Uuid, user_id: Uuid) -> RepoResult<LikeState> {
        // A racing toggle can make the insert a no-op; the like still exists then.
        let liked = sqlx::query_scalar::<_, bool>(
            r#"
            WITH removed AS (
                DELETE FROM article_likes WHERE article_id = $1 AND user_id = $2 RETURNING 1
            ), added AS (
                INSERT INTO article_likes (article_id, user_id)
                SELECT $1, $2 WHERE NOT EXISTS (SELECT 1 FROM removed)
                ON CONFLICT DO NOTHING
                RETURNING 1
            )
            SELECT NOT EXISTS (SELECT 1 FROM removed)
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        // The CTE cannot observe its own writes, so the count is a second read.
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM article_likes WHERE article_id = $1")
                .bind(article_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(LikeState { liked, count })
    }

    async fn article_like_state(
        &self,
        article_id: Uuid,
        user_id: Option<Uuid>,
    ) -> RepoResult<LikeState> {
        let (count, liked) = sqlx::query_as::<_, (i64, bool)>(
            r#"
            SELECT COUNT(*), COALESCE(BOOL_OR(user_id = $2), FALSE)
            FROM article_likes
            WHERE article_id = $1
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(LikeState { liked, count })
    }

    async fn add_article_comment(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        body: String,
    ) -> RepoResult<ArticleComment> {
        let sql = format!(
            r#"
            WITH c AS (
                INSERT INTO article_comments (article_id, user_id, body)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS} FROM c LEFT JOIN users w ON w.id = c.user_id
            "#
        );
        Ok(sqlx::query_as::<_, ArticleComment>(&sql)
            .bind(article_id)
            .bind(user_id)
            .bind(body)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_article_comments(&self, article_id: Uuid) -> RepoResult<Vec<ArticleComment>> {
        let sql = format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM article_comments c
            LEFT JOIN users w ON w.id = c.user_id
            WHERE c.article_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#
        );
        Ok(sqlx::query_as::<_, ArticleComment>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_article_comment(&self, id: i64) -> RepoResult<ArticleComment> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM article_comments c LEFT JOIN users w ON w.id = c.user_id WHERE c.id = $1"
        );
        Ok(sqlx::query_as::<_, ArticleComment>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_article_comment(&self, id: i64) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM article_comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    // --- LIBRARY ---

    async fn list_books(&self) -> RepoResult<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY title");
        Ok(sqlx::query_as::<_, Book>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_book(&self, id: Uuid) -> RepoResult<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        Ok(sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn create_book(&self, req: CreateBookRequest) -> RepoResult<Book> {
        let sql = format!(
            r#"
            INSERT INTO books (title, author, description, pdf_key, cover_key, total_pages, subscriber_only)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {BOOK_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Book>(&sql)
            .bind(req.title)
            .bind(req.author)
            .bind(req.description)
            .bind(req.pdf_key)
            .bind(req.cover_key)
            .bind(req.total_pages)
            .bind(req.subscriber_only)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_book_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
    ) -> RepoResult<Option<BookProgress>> {
        Ok(sqlx::query_as::<_, BookProgress>(
            r#"
            SELECT user_id, book_id, current_page, total_pages, completed, time_spent_seconds, last_read_at
            FROM book_progress
            WHERE user_id = $1 AND book_id = $2
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_book_progress(&self, update: ProgressUpdate) -> RepoResult<BookProgress> {
        let completed = update.completed();
        Ok(sqlx::query_as::<_, BookProgress>(
            r#"
            INSERT INTO book_progress
                (user_id, book_id, current_page, total_pages, completed, time_spent_seconds, last_read_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (user_id, book_id) DO UPDATE
            SET current_page = EXCLUDED.current_page,
                total_pages = EXCLUDED.total_pages,
                completed = EXCLUDED.completed,
                time_spent_seconds = book_progress.time_spent_seconds + EXCLUDED.time_spent_seconds,
                last_read_at = NOW()
            RETURNING user_id, book_id, current_page, total_pages, completed, time_spent_seconds, last_read_at
            "#,
        )
        .bind(update.user_id)
        .bind(update.book_id)
        .bind(update.current_page)
        .bind(update.total_pages)
        .bind(completed)
        .bind(update.seconds_read)
        .fetch_one(&self.pool)
        .await?)
    }

    // --- REFERRALS ---

    async fn create_referral(&self, referrer_id: Uuid, referred_id: Uuid) -> RepoResult<Referido> {
        Ok(sqlx::query_as::<_, Referido>(
            r#"
            INSERT INTO referidos (referrer_id, referred_id) VALUES ($1, $2)
            RETURNING id, referrer_id, referred_id, created_at
            "#,
        )
        .bind(referrer_id)
        .bind(referred_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_referrals_by(&self, referrer_id: Uuid) -> RepoResult<Vec<ReferralEntry>> {
        Ok(sqlx::query_as::<_, ReferralEntry>(
            r#"
            SELECT rf.id, rf.referred_id, u.username AS referred_username,
                   u.display_name AS referred_display_name, rf.created_at
            FROM referidos rf
            JOIN users u ON u.id = rf.referred_id
            WHERE rf.referrer_id = $1
            ORDER BY rf.created_at DESC
            "#,
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_all_referrals(&self) -> RepoResult<Vec<Referido>> {
        Ok(sqlx::query_as::<_, Referido>(
            "SELECT id, referrer_id, referred_id, created_at FROM referidos ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    // --- PROJECT QUOTES ---

    async fn create_quote(&self, quote: NewProjectQuote) -> RepoResult<ProjectQuote> {
        let sql = format!(
            r#"
            INSERT INTO project_quotes (email, answers, estimate_min, estimate_max)
            VALUES ($1, $2, $3, $4)
            RETURNING {QUOTE_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, ProjectQuote>(&sql)
            .bind(quote.email)
            .bind(quote.answers)
            .bind(quote.estimate.min)
            .bind(quote.estimate.max)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_quotes(&self, pending_only: bool) -> RepoResult<Vec<ProjectQuote>> {
        let sql = format!(
            "SELECT {QUOTE_COLUMNS} FROM project_quotes WHERE NOT $1 OR NOT responded ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, ProjectQuote>(&sql)
            .bind(pending_only)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn respond_quote(
        &self,
        id: Uuid,
        admin_note: Option<String>,
    ) -> RepoResult<ProjectQuote> {
        let sql = format!(
            r#"
            UPDATE project_quotes
            SET responded = TRUE,
                responded_at = COALESCE(responded_at, NOW()),
                admin_note = COALESCE($2, admin_note)
            WHERE id = $1
            RETURNING {QUOTE_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, ProjectQuote>(&sql)
            .bind(id)
            .bind(admin_note)
            .fetch_one(&self.pool)
            .await?)
    }

    /// get_stats
    ///
    /// Compiles all dashboard counters in a single round trip.
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        let (
            total_users,
            subscribed_users,
            total_articles,
            pins_awarded,
            pending_quotes,
            total_referrals,
        ) = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM users WHERE is_subscribed),
                (SELECT COUNT(*) FROM articles),
                (SELECT COUNT(*) FROM user_pins),
                (SELECT COUNT(*) FROM project_quotes WHERE NOT responded),
                (SELECT COUNT(*) FROM referidos)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboardStats {
            total_users,
            subscribed_users,
            total_articles,
            pins_awarded,
            pending_quotes,
            total_referrals,
        })
    }
}
