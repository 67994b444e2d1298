use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::NewsletterConfig;

#[derive(Debug, Error)]
pub enum NewsletterError {
    #[error("newsletter request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("newsletter service answered {0}")]
    Rejected(u16),
}

/// NewsletterService
///
/// Third-party mailing list. Subscription is best effort: callers log
/// failures and carry on.
#[async_trait]
pub trait NewsletterService: Send + Sync {
    async fn subscribe(&self, email: &str, name: Option<&str>) -> Result<(), NewsletterError>;
}

pub type NewsletterState = Arc<dyn NewsletterService>;

#[derive(Serialize)]
struct SubscribePayload<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// HTTP client for the mailing-list provider. Authenticates with an `api-key` header.
pub struct HttpNewsletter {
    client: reqwest::Client,
    config: NewsletterConfig,
}

impl HttpNewsletter {
    pub fn new(config: NewsletterConfig) -> Result<Self, NewsletterError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NewsletterService for HttpNewsletter {
    async fn subscribe(&self, email: &str, name: Option<&str>) -> Result<(), NewsletterError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .json(&SubscribePayload { email, name })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsletterError::Rejected(status.as_u16()));
        }
        tracing::debug!(email, "newsletter subscription sent");
        Ok(())
    }
}

/// Used when no provider is configured.
pub struct DisabledNewsletter;

#[async_trait]
impl NewsletterService for DisabledNewsletter {
    async fn subscribe(&self, email: &str, _name: Option<&str>) -> Result<(), NewsletterError> {
        tracing::debug!(email, "newsletter disabled; skipping subscription");
        Ok(())
    }
}

/// Picks the HTTP client when configured, the no-op otherwise.
pub fn from_config(config: Option<&NewsletterConfig>) -> NewsletterState {
    match config {
        Some(cfg) => match HttpNewsletter::new(cfg.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!(error = %e, "newsletter client unavailable; subscriptions disabled");
                Arc::new(DisabledNewsletter)
            }
        },
        None => Arc::new(DisabledNewsletter),
    }
}
