// HTTP request handlers
use crate::application::dialog_controller::DialogController;
use crate::application::dialog_service::DialogId;
use crate::domain::dialog::{DialogSnapshot, SubmitOutcome};
use crate::domain::entity::EntityRef;
use crate::infrastructure::http_response::{ApiError, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize, Default)]
pub struct SnapshotQuery {
    pub settled: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub telemetry_value: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedDialog {
    pub dialog_id: DialogId,
    pub dialog: DialogSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub result: SubmitOutcome,
    pub dialog: DialogSnapshot,
}

fn lookup(state: &AppState, id: DialogId) -> Result<Arc<DialogController>, ApiError> {
    state.dialogs.get(id).ok_or(ApiError::NotFound(id))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Open an edit dialog for an entity
pub async fn open_dialog(State(state): State<Arc<AppState>>, Json(entity): Json<EntityRef>) -> Response {
    let (dialog_id, dialog) = state.dialogs.open(entity);
    json_response(
        StatusCode::CREATED,
        OpenedDialog {
            dialog_id,
            dialog: dialog.snapshot(),
        },
    )
}

pub async fn get_dialog(
    Path(id): Path<DialogId>,
    Query(query): Query<SnapshotQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DialogSnapshot>, ApiError> {
    let dialog = lookup(&state, id)?;
    if query.settled.unwrap_or(false) {
        dialog.loaded().await;
    }
    Ok(Json(dialog.snapshot()))
}

pub async fn edit_dialog(
    Path(id): Path<DialogId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<EditRequest>,
) -> Result<Json<DialogSnapshot>, ApiError> {
    let dialog = lookup(&state, id)?;
    if !dialog.edit_value(request.telemetry_value) {
        return Err(ApiError::Conflict(format!(
            "dialog {} is {:?} and cannot be edited",
            id,
            dialog.state()
        )));
    }
    Ok(Json(dialog.snapshot()))
}

pub async fn submit_dialog(
    Path(id): Path<DialogId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let dialog = lookup(&state, id)?;
    let result = dialog.submit().await;
    Ok(Json(SubmitResponse {
        result,
        dialog: dialog.snapshot(),
    }))
}

pub async fn cancel_dialog(
    Path(id): Path<DialogId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DialogSnapshot>, ApiError> {
    let dialog = lookup(&state, id)?;
    if !dialog.cancel() {
        return Err(ApiError::Conflict(format!(
            "dialog {} is {:?} and cannot be cancelled",
            id,
            dialog.state()
        )));
    }
    Ok(Json(dialog.snapshot()))
}
