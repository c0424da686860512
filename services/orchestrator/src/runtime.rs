use std::sync::Arc;

use chrono::{DateTime, Utc};
use tuning::RemoteErrorKind;

use crate::provider::LLMProvider;

#[derive(Debug, Clone)]
pub enum RuntimeStatus {
    Unknown,
    Ready { checked_at: DateTime<Utc> },
    Failed { error: String, kind: RemoteErrorKind, failed_at: DateTime<Utc> },
}

impl RuntimeStatus {
    pub fn phase(&self) -> &'static str {
        match self {
            RuntimeStatus::Unknown => "Unknown",
            RuntimeStatus::Ready { .. } => "Ready",
            RuntimeStatus::Failed { .. } => "Failed",
        }
    }
}

/// Generation provider plus the result of its last health probe.
pub struct ProviderRuntime {
    pub status: RuntimeStatus,
    pub provider: Arc<dyn LLMProvider>,
}

impl ProviderRuntime {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { status: RuntimeStatus::Unknown, provider }
    }
}
