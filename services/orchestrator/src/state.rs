use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, Instant};
use tracing::info;
use tuning::{
    AccessController, AccessGate, GenerationCollaborator, IngestLimits, PipelineTiming, SessionStore, SystemClock,
    TuningRun, Workflow, WorkflowError,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::generation::LlmCollaborator;
use crate::provider::LLMProvider;
use crate::runtime::ProviderRuntime;
use crate::types::{api_error, ApiResult};

pub type SharedState = Arc<AppState>;

/// One browser tab: its workflow, its login form and the run it is watching.
pub struct WorkflowHandle {
    pub workflow: Workflow,
    pub gate: AccessGate,
    pub run: Option<Arc<TuningRun>>,
}

impl WorkflowHandle {
    pub fn new(access: AccessController) -> Result<Self, WorkflowError> {
        Ok(Self {
            workflow: Workflow::new(access.clone(), None)?,
            gate: AccessGate::new(access),
            run: None,
        })
    }

    /// Cancels and forgets the current run, if any.
    pub fn drop_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel();
        }
    }
}

/// A registered workflow and when a request last reached it.
pub struct WorkflowSlot {
    pub handle: Arc<Mutex<WorkflowHandle>>,
    pub touched: Instant,
}

pub struct AppState {
    pub access: AccessController,
    pub collaborator: Arc<dyn GenerationCollaborator>,
    pub runtime: Arc<Mutex<ProviderRuntime>>,
    pub workflows: Arc<RwLock<HashMap<Uuid, WorkflowSlot>>>,
    pub ingest_limits: IngestLimits,
    pub timing: PipelineTiming,
    pub workflow_idle: Duration,
}

impl AppState {
    pub fn new(cfg: &AppConfig, store: Arc<dyn SessionStore>, provider: Arc<dyn LLMProvider>) -> Self {
        let collaborator = Arc::new(LlmCollaborator::new(provider.clone()));
        Self::with_collaborator(cfg, store, provider, collaborator)
    }

    pub fn with_collaborator(
        cfg: &AppConfig,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn LLMProvider>,
        collaborator: Arc<dyn GenerationCollaborator>,
    ) -> Self {
        let access = AccessController::new(cfg.access_policy(), store, Arc::new(SystemClock));
        Self {
            access,
            collaborator,
            runtime: Arc::new(Mutex::new(ProviderRuntime::new(provider))),
            workflows: Arc::new(RwLock::new(HashMap::new())),
            ingest_limits: cfg.ingest_limits(),
            timing: cfg.pipeline_timing(),
            workflow_idle: cfg.workflow_idle(),
        }
    }

    pub async fn insert_workflow(&self, handle: WorkflowHandle) -> Uuid {
        let id = Uuid::new_v4();
        let slot = WorkflowSlot { handle: Arc::new(Mutex::new(handle)), touched: Instant::now() };
        self.workflows.write().await.insert(id, slot);
        id
    }

    /// Looks up a workflow and marks it as recently used.
    pub async fn workflow(&self, id: Uuid) -> ApiResult<Arc<Mutex<WorkflowHandle>>> {
        let mut workflows = self.workflows.write().await;
        let slot = workflows
            .get_mut(&id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown workflow {id}")))?;
        slot.touched = Instant::now();
        Ok(slot.handle.clone())
    }

    pub async fn remove_workflow(&self, id: Uuid) -> Option<Arc<Mutex<WorkflowHandle>>> {
        self.workflows.write().await.remove(&id).map(|slot| slot.handle)
    }

    /// Drops workflows untouched for at least `max_idle` and cancels their runs.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<(Uuid, WorkflowSlot)> = {
            let mut workflows = self.workflows.write().await;
            let stale: Vec<Uuid> = workflows
                .iter()
                .filter(|(_, slot)| now.duration_since(slot.touched) >= max_idle)
                .map(|(id, _)| *id)
                .collect();
            stale.into_iter().filter_map(|id| workflows.remove(&id).map(|slot| (id, slot))).collect()
        };

        for (id, slot) in &evicted {
            slot.handle.lock().await.drop_run();
            info!(workflow_id=%id, "idle workflow evicted");
        }
        evicted.len()
    }
}
