//! Workflow state machine.
//!
//! Each stage carries exactly the slots it needs, so a RESULTS stage without a
//! result (or a CONFIG stage without a dataset) cannot be represented.

use kvstore::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::access::{AccessController, AccessError};
use crate::configurator::{ConfigDraft, ConfigError, DraftUpdate};
use crate::pipeline::PipelineOutcome;
use crate::schema::{DatasetPreview, Session, TuningConfig, TuningResult, WorkflowStep};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} while at {step:?}")]
    InvalidTransition { step: WorkflowStep, action: &'static str },

    #[error("Free trial limit reached, an access code is required")]
    Locked,

    #[error("Run {0} is no longer current")]
    StaleRun(RunTicket),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Access(AccessError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<AccessError> for WorkflowError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Store(s) => WorkflowError::Store(s),
            other => WorkflowError::Access(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Identifies one entry into TUNING. Outcomes for older tickets are refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunTicket(pub Uuid);

impl RunTicket {
    fn fresh() -> Self {
        RunTicket(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TuningStatus {
    Running,
    /// Error payload or thrown call; the dashboard stays up.
    Stopped,
    /// Defect caught by the recovery boundary.
    Crashed { message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    AccessGate,
    Upload,
    Config {
        dataset: DatasetPreview,
        draft: ConfigDraft,
    },
    Tuning {
        dataset: DatasetPreview,
        config: TuningConfig,
        ticket: RunTicket,
        status: TuningStatus,
    },
    Results {
        dataset: DatasetPreview,
        config: TuningConfig,
        result: TuningResult,
    },
}

impl Stage {
    pub fn step(&self) -> WorkflowStep {
        match self {
            Stage::AccessGate => WorkflowStep::AccessGate,
            Stage::Upload => WorkflowStep::Upload,
            Stage::Config { .. } => WorkflowStep::Config,
            Stage::Tuning { .. } => WorkflowStep::Tuning,
            Stage::Results { .. } => WorkflowStep::Results,
        }
    }

    pub fn dataset(&self) -> Option<&DatasetPreview> {
        match self {
            Stage::Config { dataset, .. } | Stage::Tuning { dataset, .. } | Stage::Results { dataset, .. } => {
                Some(dataset)
            }
            _ => None,
        }
    }

    pub fn config(&self) -> Option<&TuningConfig> {
        match self {
            Stage::Tuning { config, .. } | Stage::Results { config, .. } => Some(config),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&TuningResult> {
        match self {
            Stage::Results { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Serializable projection a renderer draws from.
#[derive(Clone, Debug, Serialize)]
pub struct WorkflowView {
    pub step: WorkflowStep,
    pub session: Option<Session>,
    pub usage_count: u64,
    pub free_limit: u64,
    pub locked: bool,
    pub dataset: Option<DatasetPreview>,
    pub draft: Option<ConfigDraft>,
    pub config: Option<TuningConfig>,
    pub result: Option<TuningResult>,
    pub run_ticket: Option<RunTicket>,
    pub tuning_status: Option<TuningStatus>,
}

pub struct Workflow {
    stage: Stage,
    session: Option<Session>,
    access: AccessController,
}

impl Workflow {
    /// Starts at the gate if the trial budget is already spent.
    pub fn new(access: AccessController, session: Option<Session>) -> Result<Self> {
        let locked = access.is_locked(session.as_ref())?;
        let stage = if locked { Stage::AccessGate } else { Stage::Upload };
        debug!(step=?stage.step(), "workflow created");
        Ok(Self { stage, session, access })
    }

    pub fn step(&self) -> WorkflowStep {
        self.stage.step()
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn access(&self) -> &AccessController {
        &self.access
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition { step: self.step(), action }
    }

    fn set_stage(&mut self, stage: Stage) {
        debug!(from=?self.step(), to=?stage.step(), "workflow transition");
        self.stage = stage;
    }

    fn is_locked(&self) -> Result<bool> {
        Ok(self.access.is_locked(self.session.as_ref())?)
    }

    /// Lock check, edge-triggered at UPLOAD only.
    pub fn refresh(&mut self) -> Result<WorkflowStep> {
        if matches!(self.stage, Stage::Upload) && self.is_locked()? {
            info!("trial budget exhausted, showing access gate");
            self.set_stage(Stage::AccessGate);
        }
        Ok(self.step())
    }

    pub fn open_gate(&mut self) -> Result<()> {
        if !matches!(self.stage, Stage::Upload) {
            return Err(self.invalid("open the access gate"));
        }
        self.set_stage(Stage::AccessGate);
        Ok(())
    }

    pub fn dismiss_gate(&mut self) -> Result<()> {
        if !matches!(self.stage, Stage::AccessGate) {
            return Err(self.invalid("dismiss the access gate"));
        }
        if self.is_locked()? {
            return Err(WorkflowError::Locked);
        }
        self.set_stage(Stage::Upload);
        Ok(())
    }

    pub fn grant_access(&mut self, session: Session) -> Result<()> {
        if !matches!(self.stage, Stage::AccessGate) {
            return Err(self.invalid("grant access"));
        }
        info!(admin = session.is_admin, expiry=%session.expiry, "session started");
        self.session = Some(session);
        self.set_stage(Stage::Upload);
        self.refresh()?;
        Ok(())
    }

    /// Counts one trial and moves to CONFIG.
    pub fn ingest(&mut self, dataset: DatasetPreview) -> Result<()> {
        if !matches!(self.stage, Stage::Upload) {
            return Err(self.invalid("upload a dataset"));
        }
        if self.refresh()? != WorkflowStep::Upload {
            return Err(WorkflowError::Locked);
        }
        self.access.increment_usage()?;
        let draft = ConfigDraft::new(&dataset);
        self.set_stage(Stage::Config { dataset, draft });
        Ok(())
    }

    pub fn update_draft(&mut self, update: DraftUpdate) -> Result<&ConfigDraft> {
        let step = self.step();
        match &mut self.stage {
            Stage::Config { dataset, draft } => {
                draft.apply(update, dataset)?;
                Ok(draft)
            }
            _ => Err(WorkflowError::InvalidTransition { step, action: "edit the configuration" }),
        }
    }

    pub fn back_to_upload(&mut self) -> Result<WorkflowStep> {
        if !matches!(self.stage, Stage::Config { .. }) {
            return Err(self.invalid("go back to upload"));
        }
        self.set_stage(Stage::Upload);
        self.refresh()
    }

    pub fn submit_config(&mut self) -> Result<RunTicket> {
        let Stage::Config { dataset, draft } = &self.stage else {
            return Err(self.invalid("start tuning"));
        };
        let config = draft.build(dataset)?;
        let dataset = dataset.clone();
        let ticket = RunTicket::fresh();
        info!(run=%ticket, model=%config.model_type, method=%config.tuning_method, "tuning submitted");
        self.set_stage(Stage::Tuning { dataset, config, ticket, status: TuningStatus::Running });
        Ok(ticket)
    }

    /// Dataset, config and ticket of the active run, if one should be executing.
    pub fn pending_run(&self) -> Option<(RunTicket, &DatasetPreview, &TuningConfig)> {
        match &self.stage {
            Stage::Tuning { dataset, config, ticket, status: TuningStatus::Running } => {
                Some((*ticket, dataset, config))
            }
            _ => None,
        }
    }

    fn current_run(&mut self, ticket: RunTicket) -> Result<&mut TuningStatus> {
        match &mut self.stage {
            Stage::Tuning { ticket: current, status, .. } if *current == ticket => Ok(status),
            _ => Err(WorkflowError::StaleRun(ticket)),
        }
    }

    pub fn complete_tuning(&mut self, ticket: RunTicket, result: TuningResult) -> Result<()> {
        if *self.current_run(ticket)? != TuningStatus::Running {
            return Err(WorkflowError::StaleRun(ticket));
        }
        let Stage::Tuning { dataset, config, .. } = std::mem::replace(&mut self.stage, Stage::Upload) else {
            unreachable!("current_run matched a tuning stage");
        };
        self.set_stage(Stage::Results { dataset, config, result });
        Ok(())
    }

    pub fn stop_tuning(&mut self, ticket: RunTicket) -> Result<()> {
        let status = self.current_run(ticket)?;
        if *status == TuningStatus::Running {
            *status = TuningStatus::Stopped;
        }
        Ok(())
    }

    /// Recovery boundary: the run hit a defect.
    pub fn trip_boundary(&mut self, ticket: RunTicket, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        error!(run=%ticket, %message, "recovery boundary tripped");
        *self.current_run(ticket)? = TuningStatus::Crashed { message };
        Ok(())
    }

    /// Routes a pipeline outcome to the matching transition.
    pub fn apply_outcome(&mut self, ticket: RunTicket, outcome: PipelineOutcome) -> Result<()> {
        match outcome {
            PipelineOutcome::Completed(result) => self.complete_tuning(ticket, result),
            PipelineOutcome::Rejected | PipelineOutcome::Faulted { .. } => self.stop_tuning(ticket),
            PipelineOutcome::Crashed { message } => self.trip_boundary(ticket, message),
            PipelineOutcome::Cancelled => Ok(()),
        }
    }

    /// Fresh ticket for the same config. Only after a crash.
    pub fn retry_tuning(&mut self) -> Result<RunTicket> {
        match &mut self.stage {
            Stage::Tuning { ticket, status: status @ TuningStatus::Crashed { .. }, .. } => {
                *ticket = RunTicket::fresh();
                *status = TuningStatus::Running;
                info!(run=%ticket, "tuning retried");
                Ok(*ticket)
            }
            _ => Err(self.invalid("retry tuning")),
        }
    }

    pub fn back_to_config(&mut self) -> Result<()> {
        match &self.stage {
            Stage::Tuning { status, .. } if *status != TuningStatus::Running => {}
            _ => return Err(self.invalid("go back to configuration")),
        }
        let Stage::Tuning { dataset, config, .. } = std::mem::replace(&mut self.stage, Stage::Upload) else {
            unreachable!("checked above");
        };
        let draft = ConfigDraft::from_config(&config);
        self.set_stage(Stage::Config { dataset, draft });
        Ok(())
    }

    /// Drops dataset, config and result in one step; re-checks the gate.
    pub fn reset(&mut self) -> Result<WorkflowStep> {
        if !matches!(self.stage, Stage::Results { .. }) {
            return Err(self.invalid("reset"));
        }
        let next = if self.is_locked()? { Stage::AccessGate } else { Stage::Upload };
        self.set_stage(next);
        Ok(self.step())
    }

    pub fn view(&self) -> Result<WorkflowView> {
        let usage_count = self.access.usage_count()?;
        let free_limit = self.access.policy().free_limit;
        let locked = crate::access::is_locked(self.session.as_ref(), usage_count, free_limit, self.access.now());
        let (run_ticket, tuning_status) = match &self.stage {
            Stage::Tuning { ticket, status, .. } => (Some(*ticket), Some(status.clone())),
            _ => (None, None),
        };
        let draft = match &self.stage {
            Stage::Config { draft, .. } => Some(draft.clone()),
            _ => None,
        };
        Ok(WorkflowView {
            step: self.step(),
            session: self.session.clone(),
            usage_count,
            free_limit,
            locked,
            dataset: self.stage.dataset().cloned(),
            draft,
            config: self.stage.config().cloned(),
            result: self.stage.result().cloned(),
            run_ticket,
            tuning_status,
        })
    }
}
