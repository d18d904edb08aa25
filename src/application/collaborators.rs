// Collaborator traits consumed by the dialog core
use crate::domain::auth::AuthToken;
use crate::domain::entity::{Device, EntityRef};
use crate::domain::error::{AuthError, LoadError, WriteFailure};
use crate::domain::telemetry::{TelemetrySample, TimeWindow};
use async_trait::async_trait;

#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn get_device(&self, id: &str) -> Result<Device, LoadError>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Request a brand new bearer credential.
    async fn refresh_token(&self) -> Result<AuthToken, AuthError>;
}

/// Fire-and-forget signal that dependent views should re-fetch.
pub trait AliasNotifier: Send + Sync {
    fn update_aliases(&self);
}

/// Telemetry read/write access. Implementations hold no per-entity state.
#[async_trait]
pub trait TelemetryGateway: Send + Sync {
    /// Most recent sample of `key` inside `window`, or `None` for an empty series.
    async fn fetch_latest(
        &self,
        entity: &EntityRef,
        key: &str,
        window: TimeWindow,
        token: &AuthToken,
    ) -> Result<Option<TelemetrySample>, LoadError>;

    /// Write one sample stamped with the current time. Exactly one request per call.
    async fn write(
        &self,
        entity: &EntityRef,
        key: &str,
        value: f64,
        token: &AuthToken,
    ) -> Result<(), WriteFailure>;
}
