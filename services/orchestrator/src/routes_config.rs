use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tuning::{DraftUpdate, WorkflowView};
use uuid::Uuid;

use crate::state::SharedState;
use crate::types::{api_error, workflow_failure, AdviceResp, ApiResult};

pub async fn update_draft(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(update): Json<DraftUpdate>,
) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.update_draft(update).map_err(workflow_failure)?;
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}

/// Model suggestion for the dataset under configuration. Never fails on the remote side.
pub async fn get_advice(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<AdviceResp>> {
    let handle = state.workflow(id).await?;
    let dataset = {
        let h = handle.lock().await;
        match h.workflow.stage() {
            tuning::Stage::Config { dataset, .. } => dataset.clone(),
            _ => return Err(api_error(StatusCode::CONFLICT, "No dataset under configuration")),
        }
    };

    let advice = state.collaborator.advise(&dataset).await;
    Ok(Json(AdviceResp { advice }))
}

pub async fn back_to_upload(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.back_to_upload().map_err(workflow_failure)?;
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}
