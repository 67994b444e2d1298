use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository, constraints};
use crate::models::{
    AdminDashboardStats, Article, ArticleComment, ArticleFilter, Book, BookProgress,
    CreateArticleRequest, CreateBookRequest, CreatePinRequest, CreateRoleRequest, EarnedPin,
    LikeState, NewProjectQuote, NewUser, Permission, Pin, PinAward, ProgressUpdate, ProjectQuote,
    ReferralEntry, Referido, Role, RoleWithPermissions, UpdateArticleRequest, UpdatePinRequest,
    UpdateProfileRequest, User, UserAccess, UserFlagsUpdate, UserPin,
};

const SEED_ROLES: &[&str] = &["admin", "Administrador", "Usuario"];

const SEED_PERMISSIONS: &[(&str, &str)] = &[
    ("users", "read"),
    ("users", "create"),
    ("users", "update"),
    ("roles", "read"),
    ("roles", "manage"),
    ("roles", "assign"),
    ("pins", "create"),
    ("pins", "update"),
    ("pins", "award"),
    ("pins", "revoke"),
    ("articles", "create"),
    ("articles", "update"),
    ("articles", "moderate"),
    ("books", "create"),
    ("quotes", "read"),
    ("quotes", "update"),
    ("referrals", "read"),
    ("stats", "read"),
];

#[derive(Default)]
struct Tables {
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    users: Vec<User>,
    pins: Vec<Pin>,
    user_pins: Vec<UserPin>,
    articles: Vec<Article>,
    likes: HashSet<(Uuid, Uuid)>,
    comments: Vec<ArticleComment>,
    next_comment_id: i64,
    books: Vec<Book>,
    progress: HashMap<(Uuid, Uuid), BookProgress>,
    referidos: Vec<Referido>,
    quotes: Vec<ProjectQuote>,
}

impl Tables {
    fn user_mut(&mut self, id: Uuid) -> RepoResult<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.username.as_deref() == Some(username) && Some(u.id) != except)
    }

    fn author_name(&self, user_id: Uuid) -> Option<String> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .and_then(|u| u.display_name.clone().or_else(|| u.username.clone()))
    }

    fn with_author(&self, mut article: Article) -> Article {
        article.author_name = self.author_name(article.author_id);
        article
    }

    fn with_commenter(&self, mut comment: ArticleComment) -> ArticleComment {
        comment.author_name = self.author_name(comment.user_id);
        comment
    }

    fn like_state(&self, article_id: Uuid, user_id: Option<Uuid>) -> LikeState {
        let count = self.likes.iter().filter(|(a, _)| *a == article_id).count() as i64;
        let liked = user_id.is_some_and(|u| self.likes.contains(&(article_id, u)));
        LikeState { liked, count }
    }
}

/// InMemoryRepository
///
/// `Repository` over plain collections behind a mutex. It is seeded with the
/// same roles and permission catalogue as the migrations and enforces the same
/// unique constraints, so handler tests observe the same conflicts as Postgres.
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        let now = Utc::now();
        let roles = SEED_ROLES
            .iter()
            .map(|name| Role {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: None,
                created_at: now,
            })
            .collect();
        let permissions = SEED_PERMISSIONS
            .iter()
            .map(|(resource, action)| Permission {
                id: Uuid::new_v4(),
                resource: resource.to_string(),
                action: action.to_string(),
                description: None,
            })
            .collect();

        Self {
            tables: Mutex::new(Tables {
                roles,
                permissions,
                next_comment_id: 1,
                ..Tables::default()
            }),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<User> {
        self.tables()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut t = self.tables();
        let role = t
            .roles
            .iter()
            .find(|r| r.name == new.role_name)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(RepoError::Conflict(constraints::USERS_EMAIL.to_string()));
        }
        if let Some(username) = &new.username {
            if t.username_taken(username, None) {
                return Err(RepoError::Conflict(constraints::USERS_USERNAME.to_string()));
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            display_name: new.display_name,
            role_id: role.id,
            role_name: role.name,
            is_subscribed: new.is_subscribed,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut users = self.tables().users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<User> {
        let mut t = self.tables();
        if let Some(username) = &req.username {
            if t.username_taken(username, Some(id)) {
                return Err(RepoError::Conflict(constraints::USERS_USERNAME.to_string()));
            }
        }
        let user = t.user_mut(id)?;
        if let Some(display_name) = req.display_name {
            user.display_name = Some(display_name);
        }
        if let Some(username) = req.username {
            user.username = Some(username);
        }
        Ok(user.clone())
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> RepoResult<()> {
        self.tables().user_mut(id)?.password_hash = hash.to_string();
        Ok(())
    }

    async fn set_user_flags(&self, id: Uuid, flags: UserFlagsUpdate) -> RepoResult<User> {
        let mut t = self.tables();
        let user = t.user_mut(id)?;
        if let Some(active) = flags.is_active {
            user.is_active = active;
        }
        if let Some(subscribed) = flags.is_subscribed {
            user.is_subscribed = subscribed;
        }
        Ok(user.clone())
    }

    async fn set_user_role(&self, id: Uuid, role_id: Uuid) -> RepoResult<User> {
        let mut t = self.tables();
        let role = t
            .roles
            .iter()
            .find(|r| r.id == role_id)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        let user = t.user_mut(id)?;
        user.role_id = role.id;
        user.role_name = role.name;
        Ok(user.clone())
    }

    async fn record_login(&self, id: Uuid) -> RepoResult<()> {
        self.tables().user_mut(id)?.last_login_at = Some(Utc::now());
        Ok(())
    }

    async fn get_user_access(&self, id: Uuid) -> RepoResult<Option<UserAccess>> {
        let t = self.tables();
        let Some(user) = t.users.iter().find(|u| u.id == id) else {
            return Ok(None);
        };
        let permissions = t
            .permissions
            .iter()
            .filter(|p| t.role_permissions.contains(&(user.role_id, p.id)))
            .map(|p| (p.resource.clone(), p.action.clone()))
            .collect();
        Ok(Some(UserAccess {
            user_id: user.id,
            is_active: user.is_active,
            role_name: user.role_name.clone(),
            permissions,
        }))
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        Ok(self.tables().roles.iter().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> RepoResult<Vec<RoleWithPermissions>> {
        let t = self.tables();
        let mut roles: Vec<RoleWithPermissions> = t
            .roles
            .iter()
            .map(|role| RoleWithPermissions {
                id: role.id,
                name: role.name.clone(),
                description: role.description.clone(),
                permissions: t
                    .permissions
                    .iter()
                    .filter(|p| t.role_permissions.contains(&(role.id, p.id)))
                    .cloned()
                    .collect(),
            })
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, req: CreateRoleRequest) -> RepoResult<Role> {
        let mut t = self.tables();
        if t.roles.iter().any(|r| r.name == req.name) {
            return Err(RepoError::Conflict(constraints::ROLES_NAME.to_string()));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            created_at: Utc::now(),
        };
        t.roles.push(role.clone());
        Ok(role)
    }

    async fn list_permissions(&self) -> RepoResult<Vec<Permission>> {
        Ok(self.tables().permissions.clone())
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> RepoResult<()> {
        let mut t = self.tables();
        let role_exists = t.roles.iter().any(|r| r.id == role_id);
        let permission_exists = t.permissions.iter().any(|p| p.id == permission_id);
        if !role_exists || !permission_exists {
            return Err(RepoError::NotFound);
        }
        if !t.role_permissions.insert((role_id, permission_id)) {
            return Err(RepoError::Conflict(constraints::ROLE_PERMISSIONS.to_string()));
        }
        Ok(())
    }

    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> RepoResult<()> {
        if self.tables().role_permissions.remove(&(role_id, permission_id)) {
            Ok(())
        } else {
            Err(RepoError::NotFound)
        }
    }

    async fn list_pins(&self, include_inactive: bool) -> RepoResult<Vec<Pin>> {
        let mut pins: Vec<Pin> = self
            .tables()
            .pins
            .iter()
            .filter(|p| include_inactive || p.is_active)
            .cloned()
            .collect();
        pins.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pins)
    }

    async fn get_pin(&self, id: Uuid) -> RepoResult<Pin> {
        self.tables()
            .pins
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn create_pin(&self, req: CreatePinRequest) -> RepoResult<Pin> {
        let mut t = self.tables();
        if t.pins.iter().any(|p| p.name == req.name) {
            return Err(RepoError::Conflict(constraints::PINS_NAME.to_string()));
        }
        let pin = Pin {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            image_key: req.image_key,
            category: req.category,
            is_active: true,
            created_at: Utc::now(),
        };
        t.pins.push(pin.clone());
        Ok(pin)
    }

    async fn update_pin(&self, id: Uuid, req: UpdatePinRequest) -> RepoResult<Pin> {
        let mut t = self.tables();
        if let Some(name) = &req.name {
            if t.pins.iter().any(|p| &p.name == name && p.id != id) {
                return Err(RepoError::Conflict(constraints::PINS_NAME.to_string()));
            }
        }
        let pin = t
            .pins
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(name) = req.name {
            pin.name = name;
        }
        if req.description.is_some() {
            pin.description = req.description;
        }
        if req.image_key.is_some() {
            pin.image_key = req.image_key;
        }
        if req.category.is_some() {
            pin.category = req.category;
        }
        if let Some(active) = req.is_active {
            pin.is_active = active;
        }
        Ok(pin.clone())
    }

    async fn award_pin(&self, award: PinAward) -> RepoResult<UserPin> {
        let mut t = self.tables();
        let user_exists = t.users.iter().any(|u| u.id == award.user_id);
        let pin_exists = t.pins.iter().any(|p| p.id == award.pin_id);
        if !user_exists || !pin_exists {
            return Err(RepoError::NotFound);
        }
        if t
            .user_pins
            .iter()
            .any(|up| up.user_id == award.user_id && up.pin_id == award.pin_id)
        {
            return Err(RepoError::Conflict(constraints::USER_PINS.to_string()));
        }
        let user_pin = UserPin {
            user_id: award.user_id,
            pin_id: award.pin_id,
            earned_at: Utc::now(),
            granted_by: award.granted_by,
            reason: award.reason,
        };
        t.user_pins.push(user_pin.clone());
        Ok(user_pin)
    }

    async fn revoke_pin(&self, user_id: Uuid, pin_id: Uuid) -> RepoResult<()> {
        let mut t = self.tables();
        let before = t.user_pins.len();
        t.user_pins
            .retain(|up| !(up.user_id == user_id && up.pin_id == pin_id));
        if t.user_pins.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_user_pins(&self, user_id: Uuid) -> RepoResult<Vec<EarnedPin>> {
        let t = self.tables();
        let mut earned: Vec<EarnedPin> = t
            .user_pins
            .iter()
            .filter(|up| up.user_id == user_id)
            .filter_map(|up| {
                let pin = t.pins.iter().find(|p| p.id == up.pin_id)?;
                Some(EarnedPin {
                    pin_id: pin.id,
                    name: pin.name.clone(),
                    description: pin.description.clone(),
                    image_key: pin.image_key.clone(),
                    category: pin.category.clone(),
                    earned_at: up.earned_at,
                    reason: up.reason.clone(),
                })
            })
            .collect();
        earned.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        Ok(earned)
    }

    async fn list_articles(&self, filter: ArticleFilter) -> RepoResult<Vec<Article>> {
        let t = self.tables();
        let now = Utc::now();
        let mut articles: Vec<Article> = t
            .articles
            .iter()
            .filter(|a| filter.include_unpublished || a.is_published(now))
            .cloned()
            .map(|a| t.with_author(a))
            .collect();
        articles.sort_by(|a, b| {
            b.published_at
                .unwrap_or(b.created_at)
                .cmp(&a.published_at.unwrap_or(a.created_at))
        });
        Ok(articles)
    }

    async fn get_article_by_slug(&self, slug: &str) -> RepoResult<Article> {
        let t = self.tables();
        t.articles
            .iter()
            .find(|a| a.slug == slug)
            .cloned()
            .map(|a| t.with_author(a))
            .ok_or(RepoError::NotFound)
    }

    async fn create_article(
        &self,
        author_id: Uuid,
        req: CreateArticleRequest,
    ) -> RepoResult<Article> {
        let mut t = self.tables();
        if !t.users.iter().any(|u| u.id == author_id) {
            return Err(RepoError::NotFound);
        }
        if t.articles.iter().any(|a| a.slug == req.slug) {
            return Err(RepoError::Conflict(constraints::ARTICLES_SLUG.to_string()));
        }
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            slug: req.slug,
            title: req.title,
            excerpt: req.excerpt,
            content: req.content,
            cover_image_key: req.cover_image_key,
            is_public: req.is_public,
            subscriber_only: req.subscriber_only,
            author_id,
            author_name: None,
            published_at: req.publish.then_some(now),
            created_at: now,
            updated_at: now,
        };
        t.articles.push(article.clone());
        Ok(t.with_author(article))
    }

    async fn update_article(&self, id: Uuid, req: UpdateArticleRequest) -> RepoResult<Article> {
        let mut t = self.tables();
        let now = Utc::now();
        let article = t
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(title) = req.title {
            article.title = title;
        }
        if req.excerpt.is_some() {
            article.excerpt = req.excerpt;
        }
        if let Some(content) = req.content {
            article.content = content;
        }
        if req.cover_image_key.is_some() {
            article.cover_image_key = req.cover_image_key;
        }
        if let Some(public) = req.is_public {
            article.is_public = public;
        }
        if let Some(subscriber_only) = req.subscriber_only {
            article.subscriber_only = subscriber_only;
        }
        match req.publish {
            Some(true) => article.published_at = article.published_at.or(Some(now)),
            Some(false) => article.published_at = None,
            None => {}
        }
        article.updated_at = now;
        let updated = article.clone();
        Ok(t.with_author(updated))
    }

    async fn toggle_article_like(&self, article_id: Uuid, user_id: Uuid) -> RepoResult<LikeState> {
        let mut t = self.tables();
        if !t.articles.iter().any(|a| a.id == article_id) {
            return Err(RepoError::NotFound);
        }
        if !t.likes.remove(&(article_id, user_id)) {
            t.likes.insert((article_id, user_id));
        }
        Ok(t.like_state(article_id, Some(user_id)))
    }

    async fn article_like_state(
        &self,
        article_id: Uuid,
        user_id: Option<Uuid>,
    ) -> RepoResult<LikeState> {
        Ok(self.tables().like_state(article_id, user_id))
    }

    async fn add_article_comment(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        body: String,
    ) -> RepoResult<ArticleComment> {
        let mut t = self.tables();
        if !t.articles.iter().any(|a| a.id == article_id) {
            return Err(RepoError::NotFound);
        }
        let comment = ArticleComment {
            id: t.next_comment_id,
            article_id,
            user_id,
            body,
            created_at: Utc::now(),
            author_name: None,
        };
        t.next_comment_id += 1;
        t.comments.push(comment.clone());
        Ok(t.with_commenter(comment))
    }

    async fn list_article_comments(&self, article_id: Uuid) -> RepoResult<Vec<ArticleComment>> {
        let t = self.tables();
        Ok(t.comments
            .iter()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .map(|c| t.with_commenter(c))
            .collect())
    }

    async fn get_article_comment(&self, id: i64) -> RepoResult<ArticleComment> {
        let t = self.tables();
        t.comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(|c| t.with_commenter(c))
            .ok_or(RepoError::NotFound)
    }

    async fn delete_article_comment(&self, id: i64) -> RepoResult<()> {
        let mut t = self.tables();
        let before = t.comments.len();
        t.comments.retain(|c| c.id != id);
        if t.comments.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_books(&self) -> RepoResult<Vec<Book>> {
        let mut books = self.tables().books.clone();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    async fn get_book(&self, id: Uuid) -> RepoResult<Book> {
        self.tables()
            .books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn create_book(&self, req: CreateBookRequest) -> RepoResult<Book> {
        let book = Book {
            id: Uuid::new_v4(),
            title: req.title,
            author: req.author,
            description: req.description,
            pdf_key: req.pdf_key,
            cover_key: req.cover_key,
            total_pages: req.total_pages,
            subscriber_only: req.subscriber_only,
            created_at: Utc::now(),
        };
        self.tables().books.push(book.clone());
        Ok(book)
    }

    async fn get_book_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
    ) -> RepoResult<Option<BookProgress>> {
        Ok(self.tables().progress.get(&(user_id, book_id)).cloned())
    }

    async fn upsert_book_progress(&self, update: ProgressUpdate) -> RepoResult<BookProgress> {
        let mut t = self.tables();
        if !t.books.iter().any(|b| b.id == update.book_id) {
            return Err(RepoError::NotFound);
        }
        let completed = update.completed();
        let entry = t
            .progress
            .entry((update.user_id, update.book_id))
            .or_insert_with(|| BookProgress {
                user_id: update.user_id,
                book_id: update.book_id,
                ..BookProgress::default()
            });
        entry.current_page = update.current_page;
        entry.total_pages = update.total_pages;
        entry.completed = completed;
        entry.time_spent_seconds += update.seconds_read;
        entry.last_read_at = Utc::now();
        Ok(entry.clone())
    }

    async fn create_referral(&self, referrer_id: Uuid, referred_id: Uuid) -> RepoResult<Referido> {
        if referrer_id == referred_id {
            return Err(RepoError::Invalid(constraints::REFERIDOS_NO_SELF.to_string()));
        }
        let mut t = self.tables();
        let both_exist = [referrer_id, referred_id]
            .iter()
            .all(|id| t.users.iter().any(|u| u.id == *id));
        if !both_exist {
            return Err(RepoError::NotFound);
        }
        if t.referidos
            .iter()
            .any(|r| r.referrer_id == referrer_id && r.referred_id == referred_id)
        {
            return Err(RepoError::Conflict(constraints::REFERIDOS.to_string()));
        }
        let referral = Referido {
            id: Uuid::new_v4(),
            referrer_id,
            referred_id,
            created_at: Utc::now(),
        };
        t.referidos.push(referral.clone());
        Ok(referral)
    }

    async fn list_referrals_by(&self, referrer_id: Uuid) -> RepoResult<Vec<ReferralEntry>> {
        let t = self.tables();
        Ok(t.referidos
            .iter()
            .filter(|r| r.referrer_id == referrer_id)
            .filter_map(|r| {
                let referred = t.users.iter().find(|u| u.id == r.referred_id)?;
                Some(ReferralEntry {
                    id: r.id,
                    referred_id: r.referred_id,
                    referred_username: referred.username.clone(),
                    referred_display_name: referred.display_name.clone(),
                    created_at: r.created_at,
                })
            })
            .collect())
    }

    async fn list_all_referrals(&self) -> RepoResult<Vec<Referido>> {
        Ok(self.tables().referidos.clone())
    }

    async fn create_quote(&self, quote: NewProjectQuote) -> RepoResult<ProjectQuote> {
        let record = ProjectQuote {
            id: Uuid::new_v4(),
            email: quote.email,
            answers: quote.answers,
            estimate_min: quote.estimate.min,
            estimate_max: quote.estimate.max,
            responded: false,
            responded_at: None,
            admin_note: None,
            created_at: Utc::now(),
        };
        self.tables().quotes.push(record.clone());
        Ok(record)
    }

    async fn list_quotes(&self, pending_only: bool) -> RepoResult<Vec<ProjectQuote>> {
        let mut quotes: Vec<ProjectQuote> = self
            .tables()
            .quotes
            .iter()
            .filter(|q| !pending_only || !q.responded)
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quotes)
    }

    async fn respond_quote(
        &self,
        id: Uuid,
        admin_note: Option<String>,
    ) -> RepoResult<ProjectQuote> {
        let mut t = self.tables();
        let quote = t
            .quotes
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(RepoError::NotFound)?;
        quote.responded = true;
        quote.responded_at = quote.responded_at.or(Some(Utc::now()));
        if admin_note.is_some() {
            quote.admin_note = admin_note;
        }
        Ok(quote.clone())
    }

    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        let t = self.tables();
        Ok(AdminDashboardStats {
            total_users: t.users.len() as i64,
            subscribed_users: t.users.iter().filter(|u| u.is_subscribed).count() as i64,
            total_articles: t.articles.len() as i64,
            pins_awarded: t.user_pins.len() as i64,
            pending_quotes: t.quotes.iter().filter(|q| !q.responded).count() as i64,
            total_referrals: t.referidos.len() as i64,
        })
    }
}
