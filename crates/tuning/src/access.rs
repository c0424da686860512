//! Trial gating, access codes and the login state machine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kvstore::StoreError;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::schema::Session;
use crate::store::SessionStore;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;
const MAX_ISSUE_ATTEMPTS: u32 = 64;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid access code")]
    InvalidCode,

    #[error("Admin privileges required")]
    NotAdmin,

    #[error("No free code left for prefix {prefix} after {attempts} attempts")]
    CodeSpaceExhausted { prefix: String, attempts: u32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug)]
pub struct AccessPolicy {
    pub builtin_codes: Vec<String>,
    /// Always accepted, in addition to `builtin_codes`.
    pub admin_code: String,
    pub default_session: Duration,
    pub free_limit: u64,
    pub verify_delay: std::time::Duration,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            builtin_codes: vec!["DEMO-123".to_string(), "HYPER-2025".to_string()],
            admin_code: "kopihitamenak".to_string(),
            default_session: Duration::hours(24),
            free_limit: 2,
            verify_delay: std::time::Duration::from_millis(800),
        }
    }
}

impl AccessPolicy {
    /// Built-in set including the admin code.
    pub fn builtins(&self) -> Vec<String> {
        let mut all = self.builtin_codes.clone();
        if !all.contains(&self.admin_code) {
            all.push(self.admin_code.clone());
        }
        all
    }

    pub fn default_session_ms(&self) -> u64 {
        self.default_session.num_milliseconds().max(0) as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CodeValidation {
    pub valid: bool,
    pub is_admin: bool,
}

/// A live session always unlocks; otherwise the free budget decides.
pub fn is_locked(session: Option<&Session>, usage_count: u64, free_limit: u64, now: DateTime<Utc>) -> bool {
    if session.map_or(false, |s| s.is_valid_at(now)) {
        return false;
    }
    usage_count >= free_limit
}

pub fn validate_code(code: &str, builtins: &[String], issued: &[String], admin_code: &str) -> CodeValidation {
    let code = code.trim();
    if code.is_empty() {
        return CodeValidation { valid: false, is_admin: false };
    }
    let valid = builtins.iter().any(|c| c == code) || issued.iter().any(|c| c == code);
    CodeValidation { valid, is_admin: valid && code == admin_code }
}

pub fn resolve_duration(code: &str, durations: &HashMap<String, u64>, default_ms: u64) -> u64 {
    durations.get(code).copied().unwrap_or(default_ms)
}

pub fn login(code: &str, is_admin: bool, duration_ms: u64, now: DateTime<Utc>) -> Session {
    let duration = Duration::milliseconds(i64::try_from(duration_ms).unwrap_or(i64::MAX));
    let expiry = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
    Session { access_code: code.to_string(), expiry, is_admin }
}

fn clean_name(user_name: &str) -> String {
    user_name
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Session/usage policy bound to a store and a clock.
#[derive(Clone)]
pub struct AccessController {
    policy: AccessPolicy,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl AccessController {
    pub fn new(policy: AccessPolicy, store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { policy, store, clock }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn usage_count(&self) -> Result<u64, AccessError> {
        Ok(self.store.usage_count()?)
    }

    pub fn increment_usage(&self) -> Result<u64, AccessError> {
        Ok(self.store.increment_usage()?)
    }

    pub fn is_locked(&self, session: Option<&Session>) -> Result<bool, AccessError> {
        let usage = self.store.usage_count()?;
        Ok(is_locked(session, usage, self.policy.free_limit, self.clock.now()))
    }

    pub fn validate(&self, code: &str) -> Result<CodeValidation, AccessError> {
        let issued = self.store.issued_codes()?;
        Ok(validate_code(code, &self.policy.builtins(), &issued, &self.policy.admin_code))
    }

    /// Session for an already validated code, using its registered duration.
    pub fn open_session(&self, code: &str, is_admin: bool) -> Result<Session, AccessError> {
        let code = code.trim();
        let durations = self.store.code_durations()?;
        let ms = resolve_duration(code, &durations, self.policy.default_session_ms());
        Ok(login(code, is_admin, ms, self.clock.now()))
    }

    pub fn admin_session(&self) -> Session {
        login(&self.policy.admin_code, true, self.policy.default_session_ms(), self.clock.now())
    }

    pub fn issue_code(&self, user_name: &str, duration_days: u32) -> Result<String, AccessError> {
        self.issue_code_with(&mut rand::thread_rng(), user_name, duration_days)
    }

    pub fn issue_code_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        user_name: &str,
        duration_days: u32,
    ) -> Result<String, AccessError> {
        if user_name.trim().is_empty() {
            return Err(AccessError::Validation("user name must not be empty".into()));
        }
        let prefix = clean_name(user_name);
        if prefix.is_empty() {
            return Err(AccessError::Validation(
                "user name must contain at least one letter or digit".into(),
            ));
        }
        if duration_days == 0 {
            return Err(AccessError::Validation("duration must be at least one day".into()));
        }
        let duration_ms = u64::from(duration_days) * MS_PER_DAY;
        let builtins = self.policy.builtins();

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let code = format!("{}-{}", prefix, rng.gen_range(1000..=9999));
            if builtins.contains(&code) {
                continue;
            }
            if self.store.record_code(&code, duration_ms)? {
                info!(code=%code, duration_days, "access code issued");
                return Ok(code);
            }
            debug!(code=%code, "access code collision, redrawing");
        }
        Err(AccessError::CodeSpaceExhausted { prefix, attempts: MAX_ISSUE_ATTEMPTS })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    Idle,
    Verifying,
    Granted { session: Session },
    AdminUnlocked { minted: Vec<String> },
    Rejected { message: String },
}

/// One login attempt at a time: Idle -> Verifying -> Granted | AdminUnlocked | Rejected.
pub struct AccessGate {
    controller: AccessController,
    state: GateState,
}

impl AccessGate {
    pub fn new(controller: AccessController) -> Self {
        Self { controller, state: GateState::Idle }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }

    /// Validates `code` after the configured pacing delay.
    pub async fn submit(&mut self, code: &str) -> Result<&GateState, AccessError> {
        self.state = GateState::Verifying;

        let delay = self.controller.policy().verify_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.controller.validate(code).and_then(|v| {
            if !v.valid {
                Err(AccessError::InvalidCode)
            } else if v.is_admin {
                Ok(GateState::AdminUnlocked { minted: Vec::new() })
            } else {
                let session = self.controller.open_session(code, false)?;
                Ok(GateState::Granted { session })
            }
        });

        match outcome {
            Ok(next) => {
                if matches!(next, GateState::AdminUnlocked { .. }) {
                    info!("admin console unlocked");
                } else {
                    info!("access granted");
                }
                self.state = next;
                Ok(&self.state)
            }
            Err(e) => {
                warn!(error=%e, "login attempt failed");
                self.state = GateState::Rejected { message: e.to_string() };
                Err(e)
            }
        }
    }

    /// Only from the admin console. Stays in the console.
    pub fn mint_code(&mut self, user_name: &str, duration_days: u32) -> Result<String, AccessError> {
        let GateState::AdminUnlocked { minted } = &mut self.state else {
            return Err(AccessError::NotAdmin);
        };
        let code = self.controller.issue_code(user_name, duration_days)?;
        minted.push(code.clone());
        Ok(code)
    }

    pub fn enter_as_admin(&mut self) -> Result<Session, AccessError> {
        if !matches!(self.state, GateState::AdminUnlocked { .. }) {
            return Err(AccessError::NotAdmin);
        }
        let session = self.controller.admin_session();
        self.state = GateState::Granted { session: session.clone() };
        Ok(session)
    }
}
