use std::sync::Arc;

use chrono::{Duration, Utc};
use kvstore::{FileBackedStorage, InMemoryStorage};
use tuning::{
    AccessController, AccessGate, AccessPolicy, Clock, DatasetPreview, GateState, IngestLimits, KvSessionStore,
    ManualClock, SessionStore, TuningResult, Workflow, WorkflowError, WorkflowStep,
};

fn policy() -> AccessPolicy {
    AccessPolicy { verify_delay: std::time::Duration::ZERO, ..AccessPolicy::default() }
}

fn controller(store: Arc<dyn SessionStore>) -> (AccessController, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    (AccessController::new(policy(), store, clock.clone()), clock)
}

fn fresh() -> (Workflow, Arc<ManualClock>) {
    let (access, clock) = controller(Arc::new(KvSessionStore::new(InMemoryStorage::new())));
    (Workflow::new(access, None).unwrap(), clock)
}

fn dataset() -> DatasetPreview {
    let body = b"a,b,c\n1,2,3\n4,5,6\n7,8,9\n10,11,12\n13,14,15\n";
    tuning::ingest_bytes("abc.csv", body.len() as u64, body, &IngestLimits::default()).unwrap()
}

fn result() -> TuningResult {
    TuningResult {
        best_params: serde_json::Map::new(),
        best_score: 0.75,
        metric: "RMSE".into(),
        python_script: "print('ok')".into(),
        execution_log: vec!["done".into()],
    }
}

fn run_to_results(wf: &mut Workflow) {
    wf.ingest(dataset()).unwrap();
    let ticket = wf.submit_config().unwrap();
    wf.complete_tuning(ticket, result()).unwrap();
    assert_eq!(wf.step(), WorkflowStep::Results);
}

#[test]
fn test_ingestion_counts_once_and_moves_to_config() {
    let (mut wf, _) = fresh();
    assert_eq!(wf.step(), WorkflowStep::Upload);
    wf.ingest(dataset()).unwrap();
    assert_eq!(wf.step(), WorkflowStep::Config);
    assert_eq!(wf.access().usage_count().unwrap(), 1);
}

#[test]
fn test_second_ingestion_forces_gate_on_next_upload() {
    let (mut wf, _) = fresh();
    wf.ingest(dataset()).unwrap();
    assert_eq!(wf.back_to_upload().unwrap(), WorkflowStep::Upload);

    wf.ingest(dataset()).unwrap();
    // Budget is spent, but the experiment in progress is not interrupted.
    assert_eq!(wf.refresh().unwrap(), WorkflowStep::Config);

    assert_eq!(wf.back_to_upload().unwrap(), WorkflowStep::AccessGate);
    assert!(matches!(wf.dismiss_gate(), Err(WorkflowError::Locked)));
}

#[test]
fn test_reset_when_locked_goes_to_gate() {
    let (mut wf, _) = fresh();
    wf.ingest(dataset()).unwrap();
    wf.back_to_upload().unwrap();
    run_to_results(&mut wf);

    assert_eq!(wf.reset().unwrap(), WorkflowStep::AccessGate);
    let view = wf.view().unwrap();
    assert!(view.dataset.is_none() && view.config.is_none() && view.result.is_none());
    assert!(view.locked);
}

#[test]
fn test_reset_when_unlocked_goes_to_upload() {
    let (mut wf, _) = fresh();
    run_to_results(&mut wf);
    assert_eq!(wf.reset().unwrap(), WorkflowStep::Upload);
}

#[tokio::test]
async fn test_login_unlocks_until_session_expires() {
    let store: Arc<dyn SessionStore> = Arc::new(KvSessionStore::new(InMemoryStorage::new()));
    store.increment_usage().unwrap();
    store.increment_usage().unwrap();

    let (access, clock) = controller(store);
    let mut wf = Workflow::new(access.clone(), None).unwrap();
    assert_eq!(wf.step(), WorkflowStep::AccessGate);

    let mut gate = AccessGate::new(access);
    assert!(gate.submit("not-a-code").await.is_err());
    assert_eq!(wf.step(), WorkflowStep::AccessGate);

    gate.submit("HYPER-2025").await.unwrap();
    let GateState::Granted { session } = gate.state().clone() else {
        panic!("expected a session");
    };
    wf.grant_access(session).unwrap();
    assert_eq!(wf.step(), WorkflowStep::Upload);

    clock.advance(Duration::hours(25));
    assert_eq!(wf.refresh().unwrap(), WorkflowStep::AccessGate);
}

#[tokio::test]
async fn test_admin_minted_code_unlocks_another_workflow() {
    let store: Arc<dyn SessionStore> = Arc::new(KvSessionStore::new(InMemoryStorage::new()));
    let (access, clock) = controller(store.clone());

    let mut admin_gate = AccessGate::new(access.clone());
    admin_gate.submit("kopihitamenak").await.unwrap();
    let code = admin_gate.mint_code("Grace Hopper", 3).unwrap();
    assert!(code.starts_with("GRACEHOPPER-"));
    assert_eq!(store.issued_codes().unwrap().len(), 1);

    let mut user_gate = AccessGate::new(access);
    user_gate.submit(&code).await.unwrap();
    let GateState::Granted { session } = user_gate.state() else {
        panic!("expected a session");
    };
    assert_eq!(session.expiry, clock.now() + Duration::days(3));
}

#[test]
fn test_usage_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");

    {
        let store = Arc::new(KvSessionStore::new(FileBackedStorage::open(&path).unwrap()));
        let (access, _) = controller(store);
        let mut wf = Workflow::new(access, None).unwrap();
        wf.ingest(dataset()).unwrap();
        wf.back_to_upload().unwrap();
        wf.ingest(dataset()).unwrap();
    }

    let store = Arc::new(KvSessionStore::new(FileBackedStorage::open(&path).unwrap()));
    let (access, _) = controller(store);
    let wf = Workflow::new(access, None).unwrap();
    assert_eq!(wf.step(), WorkflowStep::AccessGate);
}
