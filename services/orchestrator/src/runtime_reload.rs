use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use crate::runtime::RuntimeStatus;
use crate::state::SharedState;

/// Pings the provider once and records the result. Failures are logged, never fatal.
pub async fn probe_once(state: &SharedState) -> bool {
    let (provider, was_ready) = {
        let rt = state.runtime.lock().await;
        (rt.provider.clone(), matches!(rt.status, RuntimeStatus::Ready { .. }))
    };
    let info = provider.info();

    // Ping without holding the lock.
    let status = match provider.ping().await {
        Ok(()) => {
            if !was_ready {
                info!(provider=%info.name, base_url=%info.base_url, model=%info.model, "provider reachable");
            }
            RuntimeStatus::Ready { checked_at: Utc::now() }
        }
        Err(e) => {
            let kind = e.kind();
            warn!(provider=%info.name, base_url=%info.base_url, ?kind, error=%e, "provider probe failed");
            RuntimeStatus::Failed { error: e.to_string(), kind, failed_at: Utc::now() }
        }
    };

    let ready = matches!(status, RuntimeStatus::Ready { .. });
    state.runtime.lock().await.status = status;
    ready
}

pub async fn health_loop(state: SharedState, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately and startup already probed.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        probe_once(&state).await;
    }
}

/// Periodically evicts workflows whose tab stopped calling in.
pub async fn sweep_loop(state: SharedState, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let evicted = state.evict_idle(state.workflow_idle).await;
        if evicted > 0 {
            info!(evicted, "idle workflows swept");
        }
    }
}
