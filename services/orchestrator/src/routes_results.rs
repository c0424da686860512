use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use tracing::info;
use tuning::{params_artifact, script_artifact, shap_artifact, Artifact, Stage};
use uuid::Uuid;

use crate::state::SharedState;
use crate::types::{api_error, ApiResult};

fn attachment(artifact: Artifact) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", artifact.filename)),
        ],
        artifact.body,
    )
}

fn no_result() -> crate::types::ApiFailure {
    api_error(StatusCode::CONFLICT, "No results yet")
}

pub async fn download_script(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let handle = state.workflow(id).await?;
    let h = handle.lock().await;
    let result = h.workflow.stage().result().ok_or_else(no_result)?;
    Ok(attachment(script_artifact(result)))
}

pub async fn download_params(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let handle = state.workflow(id).await?;
    let h = handle.lock().await;
    let result = h.workflow.stage().result().ok_or_else(no_result)?;
    let artifact = params_artifact(result).map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(attachment(artifact))
}

/// One remote call per request; failures come back as an error comment in the script.
pub async fn generate_shap(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let handle = state.workflow(id).await?;
    let (dataset, config) = {
        let h = handle.lock().await;
        match h.workflow.stage() {
            Stage::Results { dataset, config, .. } => (dataset.clone(), config.clone()),
            _ => return Err(no_result()),
        }
    };

    let script = state.collaborator.explain(&dataset, &config).await;
    info!(workflow_id=%id, model=%config.model_type, "shap script generated");
    Ok(attachment(shap_artifact(script)))
}
