//! Forwarding accepted ratings to the external mission database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use sentinel_common::RatingValue;
use serde::Serialize;
use std::time::Duration;

use super::ledger::RatingEvent;
use crate::config::RatingConfig;

/// Where accepted ratings go
#[async_trait]
pub trait RatingSink: Send + Sync {
    async fn forward(&self, event: &RatingEvent) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RatePayload<'a> {
    value: RatingValue,
    discord_user_id: &'a str,
    history_entry_id: Option<&'a str>,
}

/// POSTs each rating with the shared secret header
pub struct HttpRatingSink {
    client: Client,
    endpoint_base: String,
    api_secret: String,
}

impl HttpRatingSink {
    pub fn new(config: &RatingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build rating HTTP client")?;

        Ok(Self {
            client,
            endpoint_base: config.endpoint_base.trim_end_matches('/').to_string(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn rate_url(&self, item_id: &str) -> String {
        format!(
            "{}/api/reforger-missions/{}/rate_mission",
            self.endpoint_base, item_id
        )
    }
}

#[async_trait]
impl RatingSink for HttpRatingSink {
    async fn forward(&self, event: &RatingEvent) -> Result<()> {
        let url = self.rate_url(&event.item_id);
        let payload = RatePayload {
            value: event.value,
            discord_user_id: &event.user_id,
            history_entry_id: event.correlation_id.as_deref(),
        };

        tracing::debug!("Forwarding rating to {}", url);
        let response = self
            .client
            .post(&url)
            .header("x-api-secret", &self.api_secret)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to POST rating to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Rating endpoint returned {}: {}", status, body);
        }

        tracing::info!(
            "Rating forwarded: {} rated {} as {}",
            event.user_id,
            event.item_id,
            event.value
        );
        Ok(())
    }
}
