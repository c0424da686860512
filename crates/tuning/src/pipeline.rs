//! Two-phase generation pipeline.
//!
//! Startup lines tick while the remote call is in flight; once it resolves the
//! startup ticker stops and the remote log lines are played back at a fast
//! fixed pace. Progress and logs are published on a `watch` channel.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collaborator::{validate_request, GenerationCollaborator, RemoteErrorKind};
use crate::schema::{DatasetPreview, GenerationResult, TuningConfig, TuningResult};

pub const BOOT_LINE: &str = "System boot sequence initiated.";

pub const STARTUP_LINES: [&str; 7] = [
    "Initializing secure worker environment...",
    "Allocating GPU/CPU resources...",
    "Loading dataset into memory...",
    "Validating schema compatibility...",
    "Setting up cross-validation strategy...",
    "Importing machine learning libraries...",
    "Establishing connection to optimization engine...",
];

pub const TRANSITION_LINES: [&str; 2] = ["Optimization plan generated successfully.", "Starting trials..."];
pub const COMPLETION_LINES: [&str; 2] = ["Optimization complete.", "Finalizing artifact..."];

const STARTUP_STEP: f64 = 8.0;
const STARTUP_CAP: f64 = 50.0;
const PLAYBACK_FLOOR: f64 = 55.0;
const PLAYBACK_CEILING: f64 = 98.0;
const DONE: f64 = 100.0;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline run {0} already started")]
    AlreadyStarted(Uuid),
}

#[derive(Clone, Debug)]
pub struct PipelineTiming {
    pub startup_interval: Duration,
    pub playback_interval: Duration,
    pub finalize_delay: Duration,
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            startup_interval: Duration::from_millis(80),
            playback_interval: Duration::from_millis(5),
            finalize_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Pending,
    Startup,
    Playback,
    Finalizing,
    Completed,
    /// Error-flagged reply; logs shown, no completion.
    Rejected,
    /// Remote call threw.
    Faulted,
    Crashed,
    Cancelled,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Completed
                | PipelinePhase::Rejected
                | PipelinePhase::Faulted
                | PipelinePhase::Crashed
                | PipelinePhase::Cancelled
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub run_id: Uuid,
    pub phase: PipelinePhase,
    pub progress: f64,
    pub logs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PipelineOutcome {
    Completed(TuningResult),
    Rejected,
    Faulted { message: String },
    Crashed { message: String },
    Cancelled,
}

pub struct TuningRun {
    id: Uuid,
    collaborator: Arc<dyn GenerationCollaborator>,
    dataset: DatasetPreview,
    config: TuningConfig,
    timing: PipelineTiming,
    cancel: CancellationToken,
    started: AtomicBool,
    snapshot: watch::Sender<PipelineSnapshot>,
}

impl TuningRun {
    pub fn new(
        id: Uuid,
        collaborator: Arc<dyn GenerationCollaborator>,
        dataset: DatasetPreview,
        config: TuningConfig,
        timing: PipelineTiming,
    ) -> Self {
        let (snapshot, _) = watch::channel(PipelineSnapshot {
            run_id: id,
            phase: PipelinePhase::Pending,
            progress: 0.0,
            logs: Vec::new(),
        });
        Self {
            id,
            collaborator,
            dataset,
            config,
            timing,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            snapshot,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot.subscribe()
    }

    /// Stops both tickers. An in-flight remote call is left to finish and its reply is dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn publish(&self, f: impl FnOnce(&mut PipelineSnapshot)) {
        self.snapshot.send_modify(f);
    }

    fn push_line(&self, line: impl Into<String>, progress: impl FnOnce(f64) -> f64) {
        let line = line.into();
        self.publish(|s| {
            s.logs.push(line);
            s.progress = progress(s.progress);
        });
    }

    fn enter(&self, phase: PipelinePhase) {
        debug!(run_id=%self.id, ?phase, "pipeline phase");
        self.publish(|s| s.phase = phase);
    }

    fn cancelled(&self) -> PipelineOutcome {
        info!(run_id=%self.id, "pipeline cancelled");
        self.enter(PipelinePhase::Cancelled);
        PipelineOutcome::Cancelled
    }

    /// Runs the pipeline once. Exactly one terminal outcome per run.
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadyStarted(self.id));
        }

        self.enter(PipelinePhase::Startup);
        self.push_line(BOOT_LINE, |p| p);

        let collaborator = self.collaborator.clone();
        let dataset = self.dataset.clone();
        let config = self.config.clone();
        let mut remote = tokio::spawn(async move {
            validate_request(&dataset, &config)?;
            collaborator.generate(&dataset, &config).await
        });

        let period = self.timing.startup_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shown = 0usize;

        let joined = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(self.cancelled()),
                joined = &mut remote => break joined,
                _ = ticker.tick(), if shown < STARTUP_LINES.len() => {
                    self.push_line(STARTUP_LINES[shown], |p| (p + STARTUP_STEP).min(STARTUP_CAP));
                    shown += 1;
                }
            }
        };

        let reply = match joined {
            Ok(reply) => reply,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(anyhow::anyhow!(e)),
        };

        match reply {
            Err(e) => {
                let mut message = e.to_string();
                if message.is_empty() {
                    message = "Unknown error occurred.".to_string();
                }
                warn!(run_id=%self.id, kind=?RemoteErrorKind::classify(&message), error=%message, "generation call failed");
                self.push_line(format!("Critical Error: {message}"), |p| p);
                self.enter(PipelinePhase::Faulted);
                Ok(PipelineOutcome::Faulted { message })
            }
            Ok(result) if result.is_error() => {
                warn!(run_id=%self.id, reason=?result.logs.first(), "generation returned an error payload");
                self.publish(|s| {
                    s.logs.extend(result.logs.iter().cloned());
                    s.progress = DONE;
                });
                self.enter(PipelinePhase::Rejected);
                Ok(PipelineOutcome::Rejected)
            }
            Ok(result) => self.play_back(result).await,
        }
    }

    async fn play_back(&self, result: GenerationResult) -> Result<PipelineOutcome, PipelineError> {
        self.enter(PipelinePhase::Playback);
        for line in TRANSITION_LINES {
            self.push_line(line, |p| p.max(PLAYBACK_FLOOR));
        }

        let total = result.logs.len();
        for (i, line) in result.logs.iter().enumerate() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(self.cancelled()),
                _ = sleep(self.timing.playback_interval) => {}
            }
            let progress = PLAYBACK_FLOOR + ((i + 1) as f64 / total as f64) * (PLAYBACK_CEILING - PLAYBACK_FLOOR);
            self.push_line(line.clone(), |_| progress.min(PLAYBACK_CEILING));
        }

        self.enter(PipelinePhase::Finalizing);
        for line in COMPLETION_LINES {
            self.push_line(line, |_| DONE);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(self.cancelled()),
            _ = sleep(self.timing.finalize_delay) => {}
        }

        let tuning = TuningResult {
            best_params: result.best_params,
            best_score: result.best_score,
            metric: result.metric,
            python_script: result.script,
            execution_log: self.snapshot.borrow().logs.clone(),
        };
        info!(run_id=%self.id, score = tuning.best_score, metric=%tuning.metric, "pipeline completed");
        self.enter(PipelinePhase::Completed);
        Ok(PipelineOutcome::Completed(tuning))
    }

    fn crashed(&self, message: &str) {
        self.publish(|s| {
            s.logs.push(format!("Critical Error: {message}"));
            s.phase = PipelinePhase::Crashed;
        });
    }
}

impl Drop for TuningRun {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}

/// Runs `run` on its own task; a panic anywhere inside becomes `Crashed`.
pub async fn supervise(run: Arc<TuningRun>) -> Result<PipelineOutcome, PipelineError> {
    let task_run = run.clone();
    match tokio::spawn(async move { task_run.run().await }).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(run_id=%run.id(), %message, "pipeline crashed");
            run.crashed(&message);
            Ok(PipelineOutcome::Crashed { message })
        }
        Err(_) => Ok(PipelineOutcome::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ModelType, TuningMethod};
    use async_trait::async_trait;

    struct Instant3;

    #[async_trait]
    impl GenerationCollaborator for Instant3 {
        async fn generate(&self, _: &DatasetPreview, _: &TuningConfig) -> anyhow::Result<GenerationResult> {
            Ok(GenerationResult {
                script: "print(1)".into(),
                logs: vec!["a".into(), "b".into(), "c".into()],
                best_params: serde_json::Map::new(),
                best_score: 0.5,
                metric: "Accuracy".into(),
            })
        }
    }

    fn run_with(collab: Arc<dyn GenerationCollaborator>) -> TuningRun {
        let dataset = DatasetPreview {
            filename: "d.csv".into(),
            columns: vec!["x".into(), "y".into()],
            row_count: 2,
            truncated: false,
            sample_data: Vec::new(),
            prefix_hash: [0; 32],
        };
        let config = TuningConfig {
            target_column: "y".into(),
            model_type: ModelType::RandomForest,
            tuning_method: TuningMethod::RandomSearch,
            test_size: 0.2,
            n_trials: 5,
            cv_folds: 3,
            hyperparams: String::new(),
        };
        TuningRun::new(Uuid::new_v4(), collab, dataset, config, PipelineTiming::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_refused() {
        let run = run_with(Arc::new(Instant3));
        assert!(matches!(run.run().await, Ok(PipelineOutcome::Completed(_))));
        assert!(matches!(run.run().await, Err(PipelineError::AlreadyStarted(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_progress_is_monotonic() {
        let run = run_with(Arc::new(Instant3));
        let mut rx = run.subscribe();
        let watcher = tokio::spawn(async move {
            let mut seen = vec![rx.borrow().progress];
            while rx.changed().await.is_ok() {
                seen.push(rx.borrow().progress);
            }
            seen
        });
        run.run().await.unwrap();
        assert_eq!(run.snapshot().progress, 100.0);
        drop(run);

        let seen = watcher.await.unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let run = run_with(Arc::new(Instant3));
        run.cancel();
        assert_eq!(run.run().await.unwrap(), PipelineOutcome::Cancelled);
        assert_eq!(run.snapshot().phase, PipelinePhase::Cancelled);
    }
}
