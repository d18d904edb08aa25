// Alias notifiers - tell dependent views to re-fetch after a write
use crate::application::collaborators::AliasNotifier;
use crate::domain::telemetry::now_ms;
use serde::Serialize;

pub struct LoggingAliasNotifier;

impl AliasNotifier for LoggingAliasNotifier {
    fn update_aliases(&self) {
        tracing::info!("Aliases updated");
    }
}

#[derive(Debug, Serialize)]
struct AliasEvent {
    event: &'static str,
    ts: i64,
}

/// Posts the notification to a webhook on a background task.
pub struct WebhookAliasNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookAliasNotifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

impl AliasNotifier for WebhookAliasNotifier {
    fn update_aliases(&self) {
        let request = self.client.post(&self.url).json(&AliasEvent {
            event: "updateAliases",
            ts: now_ms(),
        });
        let url = self.url.clone();
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(url = %url, "Alias webhook delivered");
                }
                Ok(response) => {
                    tracing::warn!(url = %url, status = %response.status(), "Alias webhook rejected");
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "Alias webhook failed"),
            }
        });
    }
}
