//! Boundary with the external generation service.

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{DatasetPreview, GenerationResult, TuningConfig};

/// Prefix of `script` in an error-flagged payload.
pub const ERROR_MARKER: &str = "# Error";
pub const ADVICE_FALLBACK: &str = "Ready to configure parameters.";
pub const SHAP_FALLBACK: &str = "# Error generating SHAP script. Please try again.";

#[async_trait]
pub trait GenerationCollaborator: Send + Sync {
    /// Anticipated remote failures come back as error-flagged payloads.
    /// `Err` means the call itself blew up.
    async fn generate(&self, dataset: &DatasetPreview, config: &TuningConfig) -> anyhow::Result<GenerationResult>;

    /// SHAP script text, or an error comment.
    async fn explain(&self, _dataset: &DatasetPreview, _config: &TuningConfig) -> String {
        SHAP_FALLBACK.to_string()
    }

    /// One-line model suggestion for the configuration screen.
    async fn advise(&self, _dataset: &DatasetPreview) -> String {
        ADVICE_FALLBACK.to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    RateLimited,
    Unauthorized,
    Unavailable,
    Blocked,
    MalformedOutput,
    Generic,
}

impl RemoteErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => RemoteErrorKind::RateLimited,
            401 | 403 => RemoteErrorKind::Unauthorized,
            500..=599 => RemoteErrorKind::Unavailable,
            _ => RemoteErrorKind::Generic,
        }
    }

    /// Best-effort category from a free-form error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if message.contains("429") {
            RemoteErrorKind::RateLimited
        } else if message.contains("401") || message.contains("403") {
            RemoteErrorKind::Unauthorized
        } else if message.contains("SAFETY") {
            RemoteErrorKind::Blocked
        } else if ["500", "502", "503", "504"].iter().any(|c| message.contains(c))
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection")
        {
            RemoteErrorKind::Unavailable
        } else {
            RemoteErrorKind::Generic
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            RemoteErrorKind::RateLimited => "Service is busy (Rate Limit). Please wait a moment and try again.",
            RemoteErrorKind::Unauthorized => "Access denied. Please check your API key or billing status.",
            RemoteErrorKind::Unavailable => "The generation service is temporarily unavailable. Please try again shortly.",
            RemoteErrorKind::Blocked => "The request was blocked by safety filters.",
            RemoteErrorKind::MalformedOutput => "Failed to parse AI response. The model output was not valid JSON.",
            RemoteErrorKind::Generic => "Optimization failed due to an unexpected error.",
        }
    }
}

impl GenerationResult {
    pub fn failure(kind: RemoteErrorKind, detail: &str) -> Self {
        let message = kind.user_message();
        Self {
            script: format!("{ERROR_MARKER}: {message}\n# Details: {detail}"),
            logs: vec![format!("Error: {message}")],
            best_params: serde_json::Map::new(),
            best_score: 0.0,
            metric: "Error".to_string(),
        }
    }
}

/// Thrown-error checks that run before any remote call.
pub fn validate_request(dataset: &DatasetPreview, config: &TuningConfig) -> anyhow::Result<()> {
    if dataset.columns.is_empty() {
        bail!("Dataset is empty or invalid.");
    }
    if config.target_column.is_empty() || !dataset.columns.contains(&config.target_column) {
        bail!("Target column \"{}\" not found in dataset.", config.target_column);
    }
    Ok(())
}

/// Strips a surrounding Markdown code fence and its language tag, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Normalizes a raw model reply. Never fails: bad replies become error-flagged payloads.
pub fn parse_generation_reply(text: &str) -> GenerationResult {
    let data: Value = match serde_json::from_str(strip_code_fence(text)) {
        Ok(v) => v,
        Err(e) => return GenerationResult::failure(RemoteErrorKind::MalformedOutput, &e.to_string()),
    };

    let script = data.get("script").and_then(Value::as_str).filter(|s| !s.is_empty());
    let logs = data.get("logs").and_then(Value::as_array);
    let (Some(script), Some(logs)) = (script, logs) else {
        return GenerationResult::failure(
            RemoteErrorKind::MalformedOutput,
            "Invalid AI response structure: Missing script or logs.",
        );
    };

    let logs = logs
        .iter()
        .map(|l| match l {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    GenerationResult {
        script: script.to_string(),
        logs,
        best_params: data
            .get("best_params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        best_score: data.get("best_score").and_then(Value::as_f64).unwrap_or(0.0),
        metric: data
            .get("metric")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("Score")
            .to_string(),
    }
}
