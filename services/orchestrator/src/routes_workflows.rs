use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use tuning::WorkflowView;
use uuid::Uuid;

use crate::state::{SharedState, WorkflowHandle};
use crate::types::{workflow_failure, ApiResult, WorkflowCreated};

pub async fn create_workflow(State(state): State<SharedState>) -> ApiResult<(StatusCode, Json<WorkflowCreated>)> {
    let handle = WorkflowHandle::new(state.access.clone()).map_err(workflow_failure)?;
    let view = handle.workflow.view().map_err(workflow_failure)?;
    let workflow_id = state.insert_workflow(handle).await;
    info!(workflow_id=%workflow_id, step=?view.step, "workflow opened");
    Ok((StatusCode::CREATED, Json(WorkflowCreated { workflow_id, view })))
}

/// Re-evaluates the gate, then projects.
pub async fn get_workflow(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.refresh().map_err(workflow_failure)?;
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}

pub async fn delete_workflow(State(state): State<SharedState>, Path(id): Path<Uuid>) -> StatusCode {
    match state.remove_workflow(id).await {
        Some(handle) => {
            handle.lock().await.drop_run();
            info!(workflow_id=%id, "workflow closed");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

pub async fn open_gate(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.open_gate().map_err(workflow_failure)?;
    h.gate.reset();
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}

pub async fn dismiss_gate(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.dismiss_gate().map_err(workflow_failure)?;
    h.gate.reset();
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}

/// RESULTS -> UPLOAD, or ACCESS_GATE when the budget is spent.
pub async fn reset_workflow(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    let step = h.workflow.reset().map_err(workflow_failure)?;
    h.drop_run();
    h.gate.reset();
    info!(workflow_id=%id, step=?step, "workflow reset");
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}
