use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::{
    AppState,
    handlers::{admin, articles, books, pins, quotes, referidos},
};

/// Back-office routes, nested under `/admin`.
///
/// Authentication is enforced by the layer wrapping this router; each handler
/// then checks its own `(resource, action)` permission, so holding one admin
/// permission never implies the others.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(admin::stats))
        // --- Users & roles ---
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/{id}", patch(admin::update_user_flags))
        .route("/users/{id}/password", put(admin::reset_password))
        .route("/users/{id}/role", put(admin::assign_role))
        .route("/roles", get(admin::list_roles).post(admin::create_role))
        .route("/roles/{id}/permissions", post(admin::grant_permission))
        .route(
            "/roles/{id}/permissions/{permission_id}",
            delete(admin::revoke_permission),
        )
        .route("/permissions", get(admin::list_permissions))
        // --- Pins ---
        .route("/pins", get(pins::admin_list_pins).post(pins::create_pin))
        .route("/pins/{id}", patch(pins::update_pin))
        .route("/users/{id}/pins", post(pins::award_pin))
        .route("/users/{id}/pins/{pin_id}", delete(pins::revoke_pin))
        // --- Content ---
        .route(
            "/articles",
            get(articles::admin_list_articles).post(articles::create_article),
        )
        .route("/articles/{id}", patch(articles::update_article))
        .route("/books", post(books::create_book))
        .route("/books/pdf", post(books::upload_book_pdf))
        .route("/books/cover", post(books::upload_book_cover))
        // --- Leads & referrals ---
        .route("/project-quotes", get(quotes::admin_list_quotes))
        .route("/project-quotes/{id}", patch(quotes::respond_quote))
        .route("/referidos", get(referidos::admin_list_referrals))
}
