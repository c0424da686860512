use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use tuning::{IngestError, WorkflowView};
use uuid::Uuid;

use crate::state::SharedState;
use crate::types::{api_error, ingest_failure, workflow_failure, ApiResult};

fn keep_prefix(prefix: &mut Vec<u8>, chunk: &[u8], cap: usize) {
    if prefix.len() < cap {
        let take = (cap - prefix.len()).min(chunk.len());
        prefix.extend_from_slice(&chunk[..take]);
    }
}

/// Multipart `file` (and optional `size`, for clients that only send a prefix).
/// The body is streamed; only the first `prefix_len` bytes are kept.
pub async fn upload_dataset(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> ApiResult<Json<WorkflowView>> {
    let handle = state.workflow(id).await?;
    let limits = &state.ingest_limits;

    let mut filename: Option<String> = None;
    let mut declared_size: Option<u64> = None;
    let mut streamed: u64 = 0;
    let mut prefix = Vec::with_capacity(limits.prefix_len.min(64 * 1024));

    while let Some(mut field) = mp.next_field().await.map_err(|e| api_error(StatusCode::BAD_REQUEST, e))? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("size") => {
                let text = field.text().await.map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
                let size = text
                    .trim()
                    .parse()
                    .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("Invalid size field: {text:?}")))?;
                declared_size = Some(size);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                limits.check_format(&name).map_err(ingest_failure)?;
                filename = Some(name);
                while let Some(chunk) = field.chunk().await.map_err(|e| api_error(StatusCode::BAD_REQUEST, e))? {
                    streamed += chunk.len() as u64;
                    if streamed > limits.max_size {
                        return Err(ingest_failure(IngestError::Size { size: streamed, max: limits.max_size }));
                    }
                    keep_prefix(&mut prefix, &chunk, limits.prefix_len);
                }
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing file"))?;
    let total_size = declared_size.map_or(streamed, |d| d.max(streamed));
    let preview = tuning::ingest_bytes(&filename, total_size, &prefix, limits).map_err(ingest_failure)?;

    info!(
        workflow_id=%id,
        filename=%preview.filename,
        columns = preview.columns.len(),
        truncated = preview.truncated,
        fingerprint=%hex::encode(&preview.prefix_hash[..8]),
        "dataset ingested"
    );

    let mut h = handle.lock().await;
    h.workflow.ingest(preview).map_err(workflow_failure)?;
    Ok(Json(h.workflow.view().map_err(workflow_failure)?))
}
