use anyhow::{Context, Result};
use serde::Deserialize;

/// Body of the relay's `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub upstream_connected: bool,
    pub clients: usize,
    pub last_event_id: Option<String>,
}

pub struct HealthClient {
    client: reqwest::Client,
    base_url: String,
}

impl HealthClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn fetch(&self) -> Result<Health> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("GET {} returned {}", url, response.status());
        }

        response
            .json::<Health>()
            .await
            .context("Health response was not valid JSON")
    }
}
