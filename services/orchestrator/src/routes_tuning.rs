use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tuning::{supervise, RunTicket, TuningRun};
use uuid::Uuid;

use crate::state::{SharedState, WorkflowHandle};
use crate::types::{api_error, workflow_failure, ApiResult, TuningResp};

/// Starts the pipeline for the workflow's pending ticket and routes its outcome back.
fn start_pipeline(state: &SharedState, id: Uuid, handle: &Arc<Mutex<WorkflowHandle>>, h: &mut WorkflowHandle) -> ApiResult<RunTicket> {
    let (ticket, dataset, config) = h
        .workflow
        .pending_run()
        .map(|(t, d, c)| (t, d.clone(), c.clone()))
        .ok_or_else(|| api_error(StatusCode::CONFLICT, "No tuning run is pending"))?;

    h.drop_run();
    let run = Arc::new(TuningRun::new(ticket.0, state.collaborator.clone(), dataset, config, state.timing.clone()));
    h.run = Some(run.clone());

    let handle = handle.clone();
    tokio::spawn(async move {
        let outcome = match supervise(run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(workflow_id=%id, run=%ticket, error=%e, "pipeline refused to start");
                return;
            }
        };
        debug!(workflow_id=%id, run=%ticket, ?outcome, "pipeline finished");
        let mut h = handle.lock().await;
        if let Err(e) = h.workflow.apply_outcome(ticket, outcome) {
            // The tab moved on (back, reset or retry) before the run finished.
            debug!(workflow_id=%id, run=%ticket, error=%e, "pipeline outcome discarded");
        }
    });

    info!(workflow_id=%id, run=%ticket, "pipeline started");
    Ok(ticket)
}

fn tuning_resp(h: &WorkflowHandle) -> ApiResult<TuningResp> {
    let view = h.workflow.view().map_err(workflow_failure)?;
    Ok(TuningResp { run: h.run.as_ref().map(|r| r.snapshot()), ticket: view.run_ticket, view })
}

pub async fn submit_tuning(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<TuningResp>)> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.submit_config().map_err(workflow_failure)?;
    start_pipeline(&state, id, &handle, &mut h)?;
    Ok((StatusCode::ACCEPTED, Json(tuning_resp(&h)?)))
}

pub async fn get_tuning(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<TuningResp>> {
    let handle = state.workflow(id).await?;
    let h = handle.lock().await;
    if h.run.is_none() {
        return Err(api_error(StatusCode::NOT_FOUND, "No tuning run for this workflow"));
    }
    Ok(Json(tuning_resp(&h)?))
}

/// Recovery boundary: run the same config again under a fresh ticket.
pub async fn retry_tuning(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<TuningResp>)> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.retry_tuning().map_err(workflow_failure)?;
    start_pipeline(&state, id, &handle, &mut h)?;
    Ok((StatusCode::ACCEPTED, Json(tuning_resp(&h)?)))
}

pub async fn back_to_config(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<tuning::WorkflowView>> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;
    h.workflow.back_to_config().map_err(workflow_failure)?;
    h.drop_run();
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}
