use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{CallParams, LlmProvider};
use crate::error::{Result, TrendingError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ClaudeProvider {
    /// Creates a provider for `{base_url}/v1/messages`
    pub fn new(base_url: &str, api_key: Option<String>, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrendingError::Llm(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn call(&self, prompt: &str, params: &CallParams) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TrendingError::Llm("ANTHROPIC_API_KEY is not set".into()))?;

        debug!("Calling Claude model {}", self.model);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": params.max_tokens,
                "temperature": params.temperature,
                "system": params.system_prompt,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .map_err(|e| TrendingError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrendingError::Llm(format!(
                "Claude request failed: HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| TrendingError::Llm(e.to_string()))?;

        let text: String = result["content"]
            .as_array()
            .ok_or_else(|| TrendingError::Llm("Invalid Claude response format".into()))?
            .iter()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect();

        if text.is_empty() {
            return Err(TrendingError::Llm("Claude returned no text".into()));
        }
        Ok(text)
    }

    async fn is_available(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn params() -> CallParams {
        CallParams {
            system_prompt: "system".into(),
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    #[tokio::test]
    async fn test_call_extracts_text_blocks() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(json!({"model": "claude-test", "system": "system"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": [{"type": "text", "text": "{\"summary\": "}, {"type": "text", "text": "\"x\"}"}]}"#)
            .create_async()
            .await;

        let provider = ClaudeProvider::new(
            &server.url(),
            Some("sk-ant".into()),
            "claude-test".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let text = provider.call("hello", &params()).await.unwrap();

        assert_eq!(text, r#"{"summary": "x"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_llm_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let provider = ClaudeProvider::new(
            &server.url(),
            Some("bad".into()),
            "claude-test".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = provider.call("hello", &params()).await.unwrap_err();
        assert!(matches!(err, TrendingError::Llm(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let provider =
            ClaudeProvider::new("http://127.0.0.1:9", None, "m".into(), Duration::from_secs(1)).unwrap();
        assert!(!provider.is_available().await);
        assert!(matches!(
            provider.call("x", &params()).await,
            Err(TrendingError::Llm(_))
        ));
    }
}
