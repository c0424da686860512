use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tuning::{AccessPolicy, IngestLimits, PipelineTiming};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    LmStudio,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,

    pub provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub lmstudio_url: String,
    pub lmstudio_model: String,
    pub provider_timeout_secs: u64,

    pub store_path: PathBuf,
    pub free_trial_limit: u64,
    pub access_codes: Vec<String>,
    pub admin_code: String,
    pub session_hours: i64,
    pub verify_delay_ms: u64,

    pub startup_interval_ms: u64,
    pub playback_interval_ms: u64,
    pub finalize_delay_ms: u64,
    pub health_every_secs: u64,
    pub workflow_idle_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let provider = match var("HT_PROVIDER", "gemini").to_ascii_lowercase().as_str() {
            "gemini" => ProviderKind::Gemini,
            "lmstudio" => ProviderKind::LmStudio,
            other => bail!("HT_PROVIDER must be gemini or lmstudio, got {other:?}"),
        };

        let gemini_api_key = match provider {
            ProviderKind::Gemini => Some(
                get(&lookup, "GEMINI_API_KEY")
                    .or_else(|_| get(&lookup, "API_KEY"))
                    .context("HT_PROVIDER=gemini needs GEMINI_API_KEY (or API_KEY)")?,
            ),
            ProviderKind::LmStudio => lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")),
        };

        let lmstudio_url = var("HT_LMSTUDIO_URL", "http://127.0.0.1:1234");
        let access_codes: Vec<String> = var("HT_ACCESS_CODES", "DEMO-123,HYPER-2025")
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let admin_code = var("HT_ADMIN_CODE", "kopihitamenak");

        let cfg = Self {
            bind_addr: var("HT_BIND_ADDR", "127.0.0.1:8080"),
            provider,
            gemini_api_key,
            gemini_model: var("HT_GEMINI_MODEL", "gemini-2.5-flash"),
            lmstudio_url: lmstudio_url.trim_end_matches('/').to_string(),
            lmstudio_model: var("HT_LMSTUDIO_MODEL", "default"),
            provider_timeout_secs: parse(&lookup, "HT_PROVIDER_TIMEOUT_SECS", 120)?,
            store_path: PathBuf::from(var("HT_STORE_PATH", "hypertune_store.json")),
            free_trial_limit: parse(&lookup, "HT_FREE_TRIAL_LIMIT", 2)?,
            access_codes,
            admin_code,
            session_hours: parse(&lookup, "HT_SESSION_HOURS", 24)?,
            verify_delay_ms: parse(&lookup, "HT_VERIFY_DELAY_MS", 800)?,
            startup_interval_ms: parse(&lookup, "HT_STARTUP_INTERVAL_MS", 80)?,
            playback_interval_ms: parse(&lookup, "HT_PLAYBACK_INTERVAL_MS", 5)?,
            finalize_delay_ms: parse(&lookup, "HT_FINALIZE_DELAY_MS", 300)?,
            health_every_secs: parse(&lookup, "HT_HEALTH_EVERY_SECS", 60)?,
            workflow_idle_secs: parse(&lookup, "HT_WORKFLOW_IDLE_SECS", 3600)?,
        };

        // Tiny sanity checks (fail fast, fail loud)
        if !cfg.lmstudio_url.starts_with("http://") && !cfg.lmstudio_url.starts_with("https://") {
            bail!("HT_LMSTUDIO_URL must start with http:// or https://");
        }
        if cfg.admin_code.trim().is_empty() {
            bail!("HT_ADMIN_CODE must not be empty");
        }
        if cfg.session_hours <= 0 {
            bail!("HT_SESSION_HOURS must be positive");
        }
        if cfg.startup_interval_ms == 0 {
            bail!("HT_STARTUP_INTERVAL_MS must be positive");
        }
        if cfg.provider_timeout_secs == 0 {
            bail!("HT_PROVIDER_TIMEOUT_SECS must be positive");
        }
        if cfg.health_every_secs == 0 {
            bail!("HT_HEALTH_EVERY_SECS must be positive");
        }
        if cfg.workflow_idle_secs == 0 {
            bail!("HT_WORKFLOW_IDLE_SECS must be positive");
        }

        Ok(cfg)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            builtin_codes: self.access_codes.clone(),
            admin_code: self.admin_code.clone(),
            default_session: chrono::Duration::hours(self.session_hours),
            free_limit: self.free_trial_limit,
            verify_delay: Duration::from_millis(self.verify_delay_ms),
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn workflow_idle(&self) -> Duration {
        Duration::from_secs(self.workflow_idle_secs)
    }

    pub fn pipeline_timing(&self) -> PipelineTiming {
        PipelineTiming {
            startup_interval: Duration::from_millis(self.startup_interval_ms),
            playback_interval: Duration::from_millis(self.playback_interval_ms),
            finalize_delay: Duration::from_millis(self.finalize_delay_ms),
        }
    }

    pub fn ingest_limits(&self) -> IngestLimits {
        IngestLimits::default()
    }
}

fn get(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Missing required env var: {key}"))
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {raw:?} ({e})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults_with_key() {
        let c = cfg(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(c.provider, ProviderKind::Gemini);
        assert_eq!(c.bind_addr, "127.0.0.1:8080");
        assert_eq!(c.free_trial_limit, 2);
        assert_eq!(c.access_codes, vec!["DEMO-123", "HYPER-2025"]);
        assert_eq!(c.pipeline_timing().startup_interval, Duration::from_millis(80));
        assert_eq!(c.access_policy().default_session, chrono::Duration::hours(24));
        assert_eq!(c.provider_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_gemini_requires_key() {
        assert!(cfg(&[]).is_err());
        assert!(cfg(&[("API_KEY", "legacy")]).is_ok());
    }

    #[test]
    fn test_lmstudio_needs_no_key() {
        let c = cfg(&[("HT_PROVIDER", "lmstudio"), ("HT_LMSTUDIO_URL", "http://localhost:1234/")]).unwrap();
        assert_eq!(c.lmstudio_url, "http://localhost:1234");
        assert!(c.gemini_api_key.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(cfg(&[("GEMINI_API_KEY", "k"), ("HT_FREE_TRIAL_LIMIT", "two")]).is_err());
        assert!(cfg(&[("HT_PROVIDER", "lmstudio"), ("HT_LMSTUDIO_URL", "localhost:1234")]).is_err());
        assert!(cfg(&[("HT_PROVIDER", "openai")]).is_err());
        assert!(cfg(&[("HT_PROVIDER", "lmstudio"), ("HT_PROVIDER_TIMEOUT_SECS", "0")]).is_err());
    }
}
