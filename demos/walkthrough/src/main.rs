//! Offline walkthrough
//!
//! Drives one tab through the whole workflow with a scripted collaborator:
//! 1. Two free experiments, then the access gate
//! 2. Admin mints a code, user logs in with it
//! 3. Upload, configure, tune, download

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use kvstore::InMemoryStorage;
use tuning::{
    supervise, AccessController, AccessGate, AccessPolicy, DatasetPreview, DraftUpdate, GateState,
    GenerationCollaborator, GenerationResult, IngestLimits, KvSessionStore, PipelineTiming, SystemClock,
    TuningConfig, TuningMethod, TuningRun, Workflow,
};

const CSV: &[u8] = b"age,income,tenure,churn\n34,52000,3,no\n51,61000,12,no\n23,18000,1,yes\n45,75000,7,no\n";

struct Scripted;

#[async_trait]
impl GenerationCollaborator for Scripted {
    async fn generate(&self, dataset: &DatasetPreview, config: &TuningConfig) -> Result<GenerationResult> {
        tuning::validate_request(dataset, config)?;
        tokio::time::sleep(Duration::from_millis(400)).await;
        let mut best_params = serde_json::Map::new();
        best_params.insert("max_depth".into(), 6.into());
        best_params.insert("learning_rate".into(), 0.05.into());
        Ok(GenerationResult {
            script: format!("import optuna\n# {} on {}\n", config.model_type, config.target_column),
            logs: vec![
                "Imputed 0 missing values, encoded 1 categorical column".into(),
                "Trial 0 finished with value: 0.8412".into(),
                "Best trial: 0.8731".into(),
            ],
            best_params,
            best_score: 0.8731,
            metric: "Accuracy".into(),
        })
    }

    async fn advise(&self, _dataset: &DatasetPreview) -> String {
        "XGBoost for Classification: a small tabular churn set with mixed feature scales.".into()
    }
}

fn preview() -> Result<DatasetPreview> {
    Ok(tuning::ingest_bytes("churn.csv", CSV.len() as u64, CSV, &IngestLimits::default())?)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("HyperTune walkthrough (offline)\n");

    let policy = AccessPolicy { verify_delay: Duration::from_millis(200), ..AccessPolicy::default() };
    let store = Arc::new(KvSessionStore::new(InMemoryStorage::new()));
    let access = AccessController::new(policy, store, Arc::new(SystemClock));
    let mut wf = Workflow::new(access.clone(), None)?;

    println!("Step 1: free trial");
    for n in 1..=2 {
        wf.ingest(preview()?)?;
        println!("   experiment {n}: step={:?} usage={}", wf.step(), access.usage_count()?);
        wf.back_to_upload()?;
    }
    println!("   budget spent, now at {:?}\n", wf.step());

    println!("Step 2: admin console");
    let mut gate = AccessGate::new(access.clone());
    gate.submit("kopihitamenak").await?;
    let code = gate.mint_code("Ada Lovelace", 3)?;
    println!("   minted {code} (3 days)");

    let mut user_gate = AccessGate::new(access.clone());
    if user_gate.submit("NOT-A-CODE").await.is_err() {
        println!("   wrong code rejected: {:?}", user_gate.state());
    }
    user_gate.submit(&code).await?;
    let GateState::Granted { session } = user_gate.state().clone() else {
        return Err(anyhow!("expected a session"));
    };
    println!("   session until {}", session.expiry);
    wf.grant_access(session)?;
    println!("   step={:?}\n", wf.step());

    println!("Step 3: upload and configure");
    let dataset = preview()?;
    println!(
        "   {} columns, {} rows, prefix {}",
        dataset.columns.len(),
        dataset.row_count,
        hex::encode(&dataset.prefix_hash[..8])
    );
    println!("   advice: {}", Scripted.advise(&dataset).await);
    wf.ingest(dataset)?;
    wf.update_draft(DraftUpdate::SelectMethod { method: TuningMethod::Hyperband })?;
    wf.update_draft(DraftUpdate::SetTrials { input: "40".into() })?;
    let draft = wf.update_draft(DraftUpdate::SelectPreset { name: "Fast".into() })?;
    println!("   target={:?} preset={} trials={}\n", draft.target_column, draft.preset.label(), draft.n_trials);

    println!("Step 4: tuning");
    let ticket = wf.submit_config()?;
    let (_, dataset, config) = wf.pending_run().ok_or_else(|| anyhow!("no pending run"))?;
    let run = Arc::new(TuningRun::new(
        ticket.0,
        Arc::new(Scripted),
        dataset.clone(),
        config.clone(),
        PipelineTiming::default(),
    ));

    let mut updates = run.subscribe();
    let printer = tokio::spawn(async move {
        let mut shown = 0;
        while updates.changed().await.is_ok() {
            let snap = updates.borrow_and_update().clone();
            for line in &snap.logs[shown..] {
                println!("   [{:>5.1}%] {line}", snap.progress);
            }
            shown = snap.logs.len();
            if snap.phase.is_terminal() {
                break;
            }
        }
    });

    let outcome = supervise(run).await?;
    printer.await?;
    wf.apply_outcome(ticket, outcome)?;

    println!("\nStep 5: results ({:?})", wf.step());
    let result = wf.stage().result().ok_or_else(|| anyhow!("run did not complete"))?;
    println!("   best {} = {}", result.metric, result.best_score);
    let script = tuning::script_artifact(result);
    let params = tuning::params_artifact(result)?;
    println!("   {} ({} bytes)", script.filename, script.body.len());
    println!("   {}:\n{}", params.filename, params.body);

    let next = wf.reset()?;
    println!("\nReset -> {next:?}");
    Ok(())
}
