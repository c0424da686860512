//! HyperTune workflow core
//!
//! Access gating, dataset preview, experiment configuration and the
//! two-phase generation pipeline, sequenced by a single workflow state machine.

mod access;
mod artifacts;
mod clock;
mod collaborator;
mod configurator;
mod ingest;
mod pipeline;
mod presets;
mod schema;
mod store;
mod workflow;

pub use access::{
    is_locked, login, resolve_duration, validate_code, AccessController, AccessError, AccessGate,
    AccessPolicy, CodeValidation, GateState,
};
pub use artifacts::{params_artifact, script_artifact, shap_artifact, Artifact};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborator::{
    parse_generation_reply, strip_code_fence, validate_request, GenerationCollaborator, RemoteErrorKind,
    ADVICE_FALLBACK, ERROR_MARKER, SHAP_FALLBACK,
};
pub use configurator::{parse_count, ConfigDraft, ConfigError, DraftUpdate, PresetSelection};
pub use ingest::{ingest_bytes, ingest_file, IngestError, IngestLimits};
pub use pipeline::{
    supervise, PipelineError, PipelineOutcome, PipelinePhase, PipelineSnapshot, PipelineTiming,
    TuningRun, BOOT_LINE, COMPLETION_LINES, STARTUP_LINES, TRANSITION_LINES,
};
pub use presets::{default_preset, detect_preset, preset_text, presets_for, CUSTOM_PRESET};
pub use schema::{
    DatasetPreview, GenerationResult, Hash32, ModelType, Session, TuningConfig, TuningMethod,
    TuningResult, WorkflowStep, TEST_SIZE,
};
pub use store::{KvSessionStore, SessionStore};
pub use workflow::{RunTicket, Stage, TuningStatus, Workflow, WorkflowError, WorkflowView};
