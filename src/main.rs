use comunidad::{
    AppState,
    config::{AppConfig, Env},
    create_router, newsletter,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, connects Postgres (running
/// pending migrations) and S3, then serves the router until the process exits.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "comunidad=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.super_roles.len() > 1 {
        tracing::warn!(
            roles = ?config.super_roles,
            "more than one role label grants unrestricted access"
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("FATAL: database migrations failed");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
    );

    // MinIO in docker-compose starts empty.
    if config.env == Env::Local {
        let buckets = &config.buckets;
        for bucket in [&buckets.books, &buckets.covers, &buckets.forum, &buckets.articles] {
            s3_client.ensure_bucket_exists(bucket).await;
        }
    }

    let storage = Arc::new(s3_client) as StorageState;
    let newsletter = newsletter::from_config(config.newsletter.as_ref());
    let bind_addr = config.bind_addr.clone();

    let app = create_router(AppState::new(repo, storage, config, newsletter));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: could not bind listener address");

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: server terminated unexpectedly");
}
