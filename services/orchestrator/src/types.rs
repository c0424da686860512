use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tuning::{AccessError, GateState, IngestError, PipelineSnapshot, RunTicket, WorkflowError, WorkflowView};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);
pub type ApiResult<T> = Result<T, ApiFailure>;

pub fn api_error(status: StatusCode, error: impl ToString) -> ApiFailure {
    (status, Json(ApiError { error: error.to_string() }))
}

pub fn access_failure(e: AccessError) -> ApiFailure {
    let status = match &e {
        AccessError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AccessError::InvalidCode => StatusCode::UNAUTHORIZED,
        AccessError::NotAdmin => StatusCode::FORBIDDEN,
        AccessError::CodeSpaceExhausted { .. } => StatusCode::CONFLICT,
        AccessError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e)
}

pub fn workflow_failure(e: WorkflowError) -> ApiFailure {
    match e {
        WorkflowError::Access(inner) => access_failure(inner),
        e @ (WorkflowError::InvalidTransition { .. } | WorkflowError::StaleRun(_)) => api_error(StatusCode::CONFLICT, e),
        e @ WorkflowError::Locked => api_error(StatusCode::FORBIDDEN, e),
        e @ WorkflowError::Config(_) => api_error(StatusCode::UNPROCESSABLE_ENTITY, e),
        e @ WorkflowError::Store(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

pub fn ingest_failure(e: IngestError) -> ApiFailure {
    let status = match &e {
        IngestError::Format { .. } => StatusCode::BAD_REQUEST,
        IngestError::Size { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        IngestError::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e)
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowCreated {
    pub workflow_id: Uuid,
    pub view: WorkflowView,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginReq {
    pub code: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct GateResp {
    pub gate: GateState,
    pub view: WorkflowView,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MintReq {
    pub user_name: String,
    pub duration_days: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct MintResp {
    pub code: String,
    pub gate: GateState,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdviceResp {
    pub advice: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TuningResp {
    pub run: Option<PipelineSnapshot>,
    pub ticket: Option<RunTicket>,
    pub view: WorkflowView,
}
