use axum::{extract::State, Json};

use crate::runtime::RuntimeStatus;

pub async fn get_runtime(State(state): State<crate::state::SharedState>) -> Json<serde_json::Value> {
    let rt = state.runtime.lock().await;
    let info = rt.provider.info();

    let (checked_at, error, kind) = match &rt.status {
        RuntimeStatus::Unknown => (None, None, None),
        RuntimeStatus::Ready { checked_at } => (Some(*checked_at), None, None),
        RuntimeStatus::Failed { error, kind, failed_at } => (Some(*failed_at), Some(error.clone()), Some(*kind)),
    };

    Json(serde_json::json!({
        "provider": info,
        "phase": rt.status.phase(),
        "checked_at": checked_at,
        "error": error,
        "kind": kind
    }))
}
