use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    handlers::{articles, books, forum, me, referidos},
};

/// Routes for any signed-in, active user. Paths shared with the public table
/// (likes, comments) differ only by method and are merged by axum.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me::get_me).patch(me::update_me))
        .route("/me/password", put(me::change_password))
        .route("/me/pins", get(me::my_pins))
        .route("/subscription/status", get(me::subscription_status))
        // --- Articles ---
        .route("/articles/images", post(articles::upload_image))
        .route("/articles/{slug}/likes", post(articles::toggle_like))
        .route("/articles/{slug}/comments", post(articles::add_comment))
        .route("/articles/comments/{id}", delete(articles::delete_comment))
        // --- Library ---
        .route("/books/{id}/pdf", get(books::book_pdf))
        .route(
            "/books/{id}/progress",
            get(books::get_progress).put(books::update_progress),
        )
        // --- Forum attachments ---
        .route("/forum/media", post(forum::upload_forum_media))
        .route("/forum/media/{*key}", get(forum::get_forum_media))
        // --- Referrals ---
        .route(
            "/referidos",
            get(referidos::my_referrals).post(referidos::create_referral),
        )
}
