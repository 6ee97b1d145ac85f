use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{CallParams, LlmProvider, ProviderKind};
use crate::error::{Result, TrendingError};

/// Any server speaking the OpenAI chat-completions protocol
///
/// Used for OpenAI, DeepSeek and Ollama. A provider with a `health_url`
/// (Ollama) is available when that URL answers; the others when a key is set.
pub struct ChatCompletionsProvider {
    kind: ProviderKind,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    health_url: Option<String>,
}

impl ChatCompletionsProvider {
    /// Creates a provider posting to `{base_url}/chat/completions`
    pub fn new(
        kind: ProviderKind,
        base_url: &str,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
        health_url: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrendingError::Llm(e.to_string()))?;
        Ok(Self {
            kind,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            health_url,
        })
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    async fn call(&self, prompt: &str, params: &CallParams) -> Result<String> {
        if self.health_url.is_none() && self.api_key.is_none() {
            return Err(TrendingError::Llm(format!("No API key configured for {}", self.kind)));
        }

        debug!("Calling {} model {}", self.kind, self.model);
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "max_tokens": params.max_tokens,
                "temperature": params.temperature,
                "messages": [
                    {"role": "system", "content": params.system_prompt},
                    {"role": "user", "content": prompt},
                ],
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrendingError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrendingError::Llm(format!(
                "{} request failed: HTTP {}: {}",
                self.kind,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| TrendingError::Llm(e.to_string()))?;

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TrendingError::Llm(format!("Invalid {} response format", self.kind)))
    }

    async fn is_available(&self) -> bool {
        match &self.health_url {
            Some(url) => self
                .client
                .get(url)
                .timeout(Duration::from_secs(2))
                .send()
                .await
                .map_or(false, |r| r.status().is_success()),
            None => self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
