// Shared HTTP plumbing for the ThingsBoard REST API
use crate::domain::entity::EntityRef;
use anyhow::{Context, Result};
use std::time::Duration;

pub const AUTH_HEADER: &str = "X-Authorization";

#[derive(Debug, Clone)]
pub struct ThingsboardApi {
    base_url: String,
    client: reqwest::Client,
}

impl ThingsboardApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/api/plugins/telemetry/{entityType}/{id}/{suffix}` with encoded segments.
    pub fn telemetry_url(&self, entity: &EntityRef, suffix: &str) -> String {
        format!(
            "{}/api/plugins/telemetry/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&entity.entity_type),
            urlencoding::encode(&entity.id),
            suffix
        )
    }

    pub fn device_url(&self, id: &str) -> String {
        format!("{}/api/device/{}", self.base_url, urlencoding::encode(id))
    }
}

/// Status code and body of a non-success response.
pub async fn failure_parts(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}
