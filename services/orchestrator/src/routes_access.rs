use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use tuning::{GateState, WorkflowStep};
use uuid::Uuid;

use crate::state::SharedState;
use crate::types::{access_failure, api_error, workflow_failure, ApiResult, GateResp, LoginReq, MintReq, MintResp};

pub async fn login(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<GateResp>> {
    let handle = state.workflow(id).await?;
    let mut guard = handle.lock().await;
    let h = &mut *guard;

    if h.workflow.step() != WorkflowStep::AccessGate {
        return Err(api_error(StatusCode::CONFLICT, "The access gate is not open"));
    }

    let gate = h.gate.submit(&req.code).await.map_err(access_failure)?.clone();
    if let GateState::Granted { session } = &gate {
        h.workflow.grant_access(session.clone()).map_err(workflow_failure)?;
        h.gate.reset();
    }

    Ok(Json(GateResp { gate, view: h.workflow.view().map_err(workflow_failure)? }))
}

pub async fn mint_code(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MintReq>,
) -> ApiResult<(StatusCode, Json<MintResp>)> {
    let handle = state.workflow(id).await?;
    let mut h = handle.lock().await;

    let code = h.gate.mint_code(&req.user_name, req.duration_days).map_err(access_failure)?;
    info!(workflow_id=%id, days = req.duration_days, "access code issued");
    Ok((StatusCode::CREATED, Json(MintResp { code, gate: h.gate.state().clone() })))
}

pub async fn enter_as_admin(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Json<GateResp>> {
    let handle = state.workflow(id).await?;
    let mut guard = handle.lock().await;
    let h = &mut *guard;

    if h.workflow.step() != WorkflowStep::AccessGate {
        return Err(api_error(StatusCode::CONFLICT, "The access gate is not open"));
    }
    let session = h.gate.enter_as_admin().map_err(access_failure)?;
    let gate = h.gate.state().clone();
    h.workflow.grant_access(session).map_err(workflow_failure)?;
    h.gate.reset();

    Ok(Json(GateResp { gate, view: h.workflow.view().map_err(workflow_failure)? }))
}
