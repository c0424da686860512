use std::time::Duration;

use async_trait::async_trait;

use crate::provider::{check_status, http_client, LLMProvider, ProviderError, ProviderInfo, ResponseFormat};

/// Any OpenAI-compatible local endpoint (LM Studio, llama.cpp server, ...).
pub struct LmStudioProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LmStudioProvider {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self { base_url, model, client: http_client(timeout)? })
    }
}

fn extract_content(json: &serde_json::Value) -> Result<String, ProviderError> {
    let choice = &json["choices"][0];
    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(ProviderError::Blocked("content_filter".to_string()));
    }
    match choice["message"]["content"].as_str() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(ProviderError::Empty),
    }
}

#[async_trait]
impl LLMProvider for LmStudioProvider {
    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String, ProviderError> {
        let mut messages = Vec::new();
        if format == ResponseFormat::Json {
            messages.push(serde_json::json!({
                "role": "system",
                "content": "Reply with a single JSON object and nothing else."
            }));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = check_status(self.client.post(url).json(&body).send().await?).await?;
        let json: serde_json::Value = resp.json().await?;
        extract_content(&json)
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let url = format!("{}/v1/models", self.base_url);
        check_status(self.client.get(url).send().await?).await?;
        Ok(())
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "lmstudio".to_string(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }
    }
}
