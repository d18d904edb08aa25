// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::collaborators::AliasNotifier;
use crate::application::dialog_service::DialogService;
use crate::infrastructure::alias_notifier::{LoggingAliasNotifier, WebhookAliasNotifier};
use crate::infrastructure::config::load_editor_config;
use crate::infrastructure::rest_auth_provider::RestAuthProvider;
use crate::infrastructure::rest_device_directory::RestDeviceDirectory;
use crate::infrastructure::rest_telemetry_gateway::RestTelemetryGateway;
use crate::infrastructure::thingsboard_api::ThingsboardApi;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    cancel_dialog, edit_dialog, get_dialog, health_check, open_dialog, submit_dialog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_editor_config()?;

    // Create adapters (infrastructure layer)
    let api = ThingsboardApi::new(&config.thingsboard.base_url, config.thingsboard.request_timeout())?;
    let auth = Arc::new(RestAuthProvider::new(
        api.clone(),
        config.thingsboard.username.clone(),
        config.thingsboard.password.clone(),
    ));
    let devices = Arc::new(RestDeviceDirectory::new(api.clone(), auth.clone()));
    let gateway = Arc::new(RestTelemetryGateway::new(api.clone()));
    let aliases: Arc<dyn AliasNotifier> = match &config.aliases.webhook_url {
        Some(url) => Arc::new(WebhookAliasNotifier::new(api.client().clone(), url.clone())),
        None => Arc::new(LoggingAliasNotifier),
    };

    // Create services (application layer)
    let dialogs = DialogService::new(
        devices,
        gateway,
        auth,
        aliases,
        config.dialog.settings(),
        config.dialog.token_refresh(),
    );

    // Create application state
    let state = Arc::new(AppState {
        dialogs: dialogs.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dialogs", post(open_dialog))
        .route(
            "/dialogs/:id",
            get(get_dialog).patch(edit_dialog).delete(cancel_dialog),
        )
        .route("/dialogs/:id/submit", post(submit_dialog))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!(%addr, base_url = %config.thingsboard.base_url, "Starting telemetry-editor service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Every exit path releases the dialogs' refresh timers.
    dialogs.close_all();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
