// Dialog state machine data
use crate::domain::error::{DialogError, ValidationError};
use crate::domain::form::FormState;
use crate::domain::telemetry::TelemetrySample;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogState {
    Loading,
    Ready,
    Saving,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    Saved,
    Cancelled,
}

/// Everything the controller owns about one dialog.
#[derive(Debug, Clone)]
pub struct DialogModel {
    pub state: DialogState,
    pub form: FormState,
    pub latest: Option<TelemetrySample>,
    pub last_error: Option<DialogError>,
    pub close_reason: Option<CloseReason>,
}

impl DialogModel {
    pub fn loading() -> Self {
        Self {
            state: DialogState::Loading,
            form: FormState::new(),
            latest: None,
            last_error: None,
            close_reason: None,
        }
    }

    pub fn snapshot(&self) -> DialogSnapshot {
        DialogSnapshot {
            state: self.state,
            device_name: self.form.device_name().to_string(),
            telemetry_value: self.form.telemetry_value(),
            latest_telemetry: self.latest,
            valid: self.form.is_valid(),
            dirty: self.form.is_dirty(),
            can_submit: self.state == DialogState::Ready && self.form.can_submit(),
            last_error: self.last_error.as_ref().map(ErrorView::from),
            close_reason: self.close_reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    pub message: String,
}

impl From<&DialogError> for ErrorView {
    fn from(error: &DialogError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Read-only view handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogSnapshot {
    pub state: DialogState,
    pub device_name: String,
    pub telemetry_value: Option<f64>,
    pub latest_telemetry: Option<TelemetrySample>,
    pub valid: bool,
    pub dirty: bool,
    pub can_submit: bool,
    pub last_error: Option<ErrorView>,
    pub close_reason: Option<CloseReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "camelCase")]
pub enum SubmitOutcome {
    Saved,
    Failed(ErrorView),
    Rejected(String),
    Ignored(DialogState),
}

impl SubmitOutcome {
    pub fn failed(error: &DialogError) -> Self {
        SubmitOutcome::Failed(ErrorView::from(error))
    }

    pub fn rejected(error: ValidationError) -> Self {
        SubmitOutcome::Rejected(error.to_string())
    }
}
