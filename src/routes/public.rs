use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{self, articles, auth, books, pins, quotes},
};

/// Anonymous routes. Article reads accept an optional bearer token to unlock
/// subscriber-only content and report `liked`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/articles", get(articles::list_articles))
        .route("/articles/{slug}", get(articles::get_article))
        .route("/articles/{slug}/comments", get(articles::list_comments))
        .route("/articles/{slug}/likes", get(articles::like_state))
        .route("/books", get(books::list_books))
        .route("/books/{id}/cover", get(books::book_cover))
        .route("/pins", get(pins::list_pins))
        .route("/project-quotes", post(quotes::submit_quote))
}
