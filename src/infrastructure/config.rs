use serde::Deserialize;
use std::time::Duration;

use crate::application::dialog_controller::DialogSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    pub server: ServerSettings,
    pub thingsboard: ThingsboardSettings,
    pub dialog: DialogConfig,
    #[serde(default)]
    pub aliases: AliasSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThingsboardSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DialogConfig {
    pub telemetry_key: String,
    pub lookback_secs: u64,
    pub token_refresh_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AliasSettings {
    pub webhook_url: Option<String>,
}

impl ThingsboardSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DialogConfig {
    pub fn settings(&self) -> DialogSettings {
        DialogSettings {
            telemetry_key: self.telemetry_key.clone(),
            lookback: Duration::from_secs(self.lookback_secs),
        }
    }

    pub fn token_refresh(&self) -> Duration {
        Duration::from_secs(self.token_refresh_secs)
    }
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("thingsboard.base_url", "http://localhost:9090")?
        .set_default("thingsboard.request_timeout_secs", 10)?
        .set_default("dialog.telemetry_key", "temperature")?
        .set_default("dialog.lookback_secs", 60)?
        .set_default("dialog.token_refresh_secs", 300)?)
}

/// `config/editor` (optional) layered under `EDITOR__*` environment variables.
pub fn load_editor_config() -> anyhow::Result<EditorConfig> {
    let settings = builder()?
        .add_source(config::File::with_name("config/editor").required(false))
        .add_source(config::Environment::with_prefix("EDITOR").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
