use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tuning::RemoteErrorKind;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub base_url: String,
    pub model: String,
}

/// What the caller expects back from `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SAFETY: {0}")]
    Blocked(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("empty response from provider")]
    Empty,
}

impl ProviderError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            ProviderError::Status { status, .. } => RemoteErrorKind::from_status(*status),
            ProviderError::Blocked(_) => RemoteErrorKind::Blocked,
            ProviderError::Transport(_) => RemoteErrorKind::Unavailable,
            ProviderError::Empty => RemoteErrorKind::MalformedOutput,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ProviderError::Status { status: status.as_u16(), body: e.to_string() },
            None => ProviderError::Transport(e.to_string()),
        }
    }
}

/// Shared HTTP client for providers. `timeout` bounds every request end to end,
/// so a hung provider surfaces as a transport error.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turns a non-2xx response into `ProviderError::Status`, keeping the body for the log.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Status { status: status.as_u16(), body })
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String, ProviderError>;
    async fn ping(&self) -> Result<(), ProviderError>;
    fn info(&self) -> ProviderInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let status = |s| ProviderError::Status { status: s, body: String::new() };
        assert_eq!(status(429).kind(), RemoteErrorKind::RateLimited);
        assert_eq!(status(403).kind(), RemoteErrorKind::Unauthorized);
        assert_eq!(status(503).kind(), RemoteErrorKind::Unavailable);
        assert_eq!(status(400).kind(), RemoteErrorKind::Generic);
        assert_eq!(ProviderError::Blocked("x".into()).kind(), RemoteErrorKind::Blocked);
        assert_eq!(ProviderError::Transport("reset".into()).kind(), RemoteErrorKind::Unavailable);
    }
}
