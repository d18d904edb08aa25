// Infrastructure layer - External dependencies and adapters
pub mod alias_notifier;
pub mod config;
pub mod http_response;
pub mod rest_auth_provider;
pub mod rest_device_directory;
pub mod rest_telemetry_gateway;
pub mod thingsboard_api;
