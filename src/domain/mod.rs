// Domain layer - Plain data shared by the dialog core
pub mod auth;
pub mod dialog;
pub mod entity;
pub mod error;
pub mod form;
pub mod telemetry;
