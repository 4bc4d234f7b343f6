use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const SUPPORTED_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-4"];

const SYSTEM_PROMPT: &str =
    "You are an expert e-invoice data analyst for the UAE. Answer only from the data provided.";
const MAX_TOKENS: u32 = 800;

/// Failures a generative backend can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("No API credential configured")]
    MissingCredential,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Backend call timed out after {0}s")]
    Timeout(u64),

    #[error("Quota or rate limit exceeded: {0}")]
    Quota(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Generative text backend used by the answer generator.
#[async_trait]
pub trait BackendClient: Send + Sync {
    fn has_credential(&self) -> bool;

    async fn complete(&self, prompt: &str, model: &str) -> Result<String, BackendError>;
}

/// OpenAI-compatible chat completions client.
pub struct LlmClient {
    api_key: Option<String>,
    base_url: String,
    temperature: f32,
    timeout: Duration,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_settings(api_key, DEFAULT_BASE_URL.to_string(), 0.7, Duration::from_secs(30))
    }

    pub fn with_settings(
        api_key: Option<String>,
        base_url: String,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: temperature.clamp(0.0, 1.0),
            timeout,
            http,
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[async_trait]
impl BackendClient for LlmClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or(BackendError::MissingCredential)?;

        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": MAX_TOKENS,
        });

        debug!("Calling {} with model {}", self.base_url, model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout.as_secs())
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Backend returned {}", status);
            return Err(classify_status(status.as_u16(), error_text));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(format!("invalid JSON: {}", e)))?;

        extract_content(&response_json)
    }
}

fn classify_status(status: u16, body: String) -> BackendError {
    match status {
        401 | 403 => BackendError::Auth(format!("HTTP {}: {}", status, body)),
        429 => BackendError::Quota(format!("HTTP {}: {}", status, body)),
        408 | 504 => BackendError::Timeout(0),
        _ => BackendError::Network(format!("HTTP {}: {}", status, body)),
    }
}

/// Pull the first choice's message content out of a chat completion body.
fn extract_content(response_json: &serde_json::Value) -> Result<String, BackendError> {
    if let Some(error) = response_json.get("error") {
        return Err(BackendError::MalformedResponse(format!("error payload: {}", error)));
    }

    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| BackendError::MalformedResponse("no choices array".to_string()))?;

    let first = choices
        .first()
        .ok_or_else(|| BackendError::MalformedResponse("empty choices array".to_string()))?;

    if first.get("finish_reason").and_then(|r| r.as_str()) == Some("content_filter") {
        return Err(BackendError::MalformedResponse(
            "response filtered by content policy".to_string(),
        ));
    }

    let content = first["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| BackendError::MalformedResponse("no content in first choice".to_string()))?;

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_key_has_no_credential() {
        assert!(!LlmClient::new(None).has_credential());
        assert!(!LlmClient::new(Some("  ".to_string())).has_credential());
        assert!(LlmClient::new(Some("sk-test".to_string())).has_credential());
    }

    #[test]
    fn test_temperature_is_clamped() {
        let client = LlmClient::with_settings(None, DEFAULT_BASE_URL.to_string(), 3.0, Duration::from_secs(1));
        assert_eq!(client.temperature(), 1.0);
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let client = LlmClient::new(None);
        let err = client.complete("hi", DEFAULT_MODEL).await.unwrap_err();
        assert_eq!(err, BackendError::MissingCredential);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(classify_status(401, String::new()), BackendError::Auth(_)));
        assert!(matches!(classify_status(429, String::new()), BackendError::Quota(_)));
        assert!(matches!(classify_status(500, String::new()), BackendError::Network(_)));
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"choices": [{"message": {"content": " Total VAT: 10 "}, "finish_reason": "stop"}]});
        assert_eq!(extract_content(&ok).unwrap(), "Total VAT: 10");

        let empty = json!({"choices": []});
        assert!(matches!(extract_content(&empty), Err(BackendError::MalformedResponse(_))));

        let no_content = json!({"choices": [{"message": {}}]});
        assert!(matches!(extract_content(&no_content), Err(BackendError::MalformedResponse(_))));

        let error = json!({"error": {"message": "bad"}});
        assert!(matches!(extract_content(&error), Err(BackendError::MalformedResponse(_))));
    }
}
