use std::time::Duration;

use async_trait::async_trait;

use crate::provider::{check_status, http_client, LLMProvider, ProviderError, ProviderInfo, ResponseFormat};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Generative Language API (`generateContent`).
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self { base_url, api_key, model, client: http_client(timeout)? })
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }
}

fn request_body(prompt: &str, format: ResponseFormat) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": [{"parts": [{"text": prompt}]}]
    });
    if format == ResponseFormat::Json {
        body["generationConfig"] = serde_json::json!({"responseMimeType": "application/json"});
    }
    body
}

fn extract_text(json: &serde_json::Value) -> Result<String, ProviderError> {
    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return Err(ProviderError::Blocked(reason.to_string()));
    }
    let candidate = &json["candidates"][0];
    if candidate["finishReason"].as_str() == Some("SAFETY") {
        return Err(ProviderError::Blocked("finishReason SAFETY".to_string()));
    }

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::Empty);
    }
    Ok(text)
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String, ProviderError> {
        let url = format!("{}:generateContent", self.model_url());
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt, format))
            .send()
            .await?;
        let json: serde_json::Value = check_status(resp).await?.json().await?;
        extract_text(&json)
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let resp = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "gemini".to_string(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_mode_sets_mime_type() {
        let body = request_body("hi", ResponseFormat::Json);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(request_body("hi", ResponseFormat::Text).get("generationConfig").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let reply = json!({"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]});
        assert_eq!(extract_text(&reply).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_safety_blocks() {
        let prompt_blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(extract_text(&prompt_blocked), Err(ProviderError::Blocked(_))));

        let finish_blocked = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert!(matches!(extract_text(&finish_blocked), Err(ProviderError::Blocked(_))));
    }

    #[test]
    fn test_empty_candidate() {
        assert!(matches!(extract_text(&json!({"candidates": []})), Err(ProviderError::Empty)));
    }
}
