mod app;
mod config;
mod generation;
mod provider;
mod provider_gemini;
mod provider_lmstudio;
mod routes_access;
mod routes_catalog;
mod routes_config;
mod routes_dataset;
mod routes_results;
mod routes_runtime;
mod routes_tuning;
mod routes_workflows;
mod runtime;
mod runtime_reload;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kvstore::FileBackedStorage;
use tracing::{info, warn};
use tuning::KvSessionStore;

use crate::config::{AppConfig, ProviderKind};
use crate::provider::LLMProvider;
use crate::state::AppState;

fn build_provider(cfg: &AppConfig) -> Result<Arc<dyn LLMProvider>> {
    Ok(match cfg.provider {
        ProviderKind::Gemini => {
            let key = cfg.gemini_api_key.clone().context("Missing required env var: GEMINI_API_KEY")?;
            Arc::new(provider_gemini::GeminiProvider::new(
                provider_gemini::GEMINI_BASE_URL.to_string(),
                key,
                cfg.gemini_model.clone(),
                cfg.provider_timeout(),
            )?)
        }
        ProviderKind::LmStudio => Arc::new(provider_lmstudio::LmStudioProvider::new(
            cfg.lmstudio_url.clone(),
            cfg.lmstudio_model.clone(),
            cfg.provider_timeout(),
        )?),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    let storage = FileBackedStorage::open(cfg.store_path.clone())
        .with_context(|| format!("Failed to open store at {}", cfg.store_path.display()))?;
    let store = Arc::new(KvSessionStore::new(storage));
    let provider = build_provider(&cfg)?;

    let app_state = Arc::new(AppState::new(&cfg, store, provider));

    // Startup probe: an unreachable provider is reported, not fatal.
    if !runtime_reload::probe_once(&app_state).await {
        warn!("generation provider not reachable at startup; runs will report errors until it is");
    }
    tokio::spawn(runtime_reload::health_loop(
        app_state.clone(),
        Duration::from_secs(cfg.health_every_secs),
    ));
    tokio::spawn(runtime_reload::sweep_loop(
        app_state.clone(),
        (cfg.workflow_idle() / 4).max(Duration::from_secs(1)),
    ));

    let app = app::router(app_state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, provider=?cfg.provider, "hypertune orchestrator listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
