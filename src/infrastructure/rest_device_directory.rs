// Device lookup through the ThingsBoard device endpoint
use crate::application::collaborators::{AuthProvider, DeviceDirectory};
use crate::domain::auth::AuthToken;
use crate::domain::entity::Device;
use crate::domain::error::{AuthError, LoadError};
use crate::infrastructure::rest_auth_provider::RestAuthProvider;
use crate::infrastructure::thingsboard_api::{AUTH_HEADER, ThingsboardApi, failure_parts};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves devices with the host session credential.
pub struct RestDeviceDirectory {
    api: ThingsboardApi,
    session: Arc<RestAuthProvider>,
}

impl RestDeviceDirectory {
    pub fn new(api: ThingsboardApi, session: Arc<RestAuthProvider>) -> Self {
        Self { api, session }
    }

    async fn fetch(&self, id: &str, token: &AuthToken) -> Result<Device, LoadError> {
        let response = self
            .api
            .client()
            .get(self.api.device_url(id))
            .header(AUTH_HEADER, token.bearer())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = failure_parts(response).await;
            return Err(LoadError::Status { status, body });
        }

        response
            .json::<Device>()
            .await
            .map_err(|e| LoadError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DeviceDirectory for RestDeviceDirectory {
    async fn get_device(&self, id: &str) -> Result<Device, LoadError> {
        let token = self.session.session_token().await.map_err(no_session)?;

        match self.fetch(id, &token).await {
            Err(LoadError::Status { status: 401, .. }) => {
                tracing::info!(device_id = id, "Session token rejected, refreshing before retry");
                let token = self.session.refresh_token().await.map_err(no_session)?;
                self.fetch(id, &token).await
            }
            other => other,
        }
    }
}

fn no_session(e: AuthError) -> LoadError {
    LoadError::Transport(format!("no session credential: {}", e))
}
