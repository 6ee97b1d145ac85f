//! LLM providers behind one `call(prompt) -> text` contract

mod claude;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;

pub use claude::ClaudeProvider;
pub use openai::ChatCompletionsProvider;

/// Supported providers
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic messages API
    #[default]
    Claude,
    /// OpenAI chat completions
    Openai,
    /// DeepSeek, OpenAI-compatible
    Deepseek,
    /// Local Ollama server, OpenAI-compatible
    Ollama,
}

impl ProviderKind {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Openai => "openai",
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call generation parameters
#[derive(Debug, Clone)]
pub struct CallParams {
    /// System instructions
    pub system_prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// A text-in, text-out language model
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends `prompt` and returns the raw reply text
    async fn call(&self, prompt: &str, params: &CallParams) -> Result<String>;

    /// Whether the provider can be called at all (key present, server up)
    async fn is_available(&self) -> bool;

    /// Model identifier, part of the analysis cache key
    fn model_name(&self) -> &str;
}

/// The provider chosen at startup
pub enum Provider {
    /// Anthropic Claude
    Claude(ClaudeProvider),
    /// OpenAI, DeepSeek or Ollama
    ChatCompletions(ChatCompletionsProvider),
}

impl Provider {
    /// Builds the provider `kind` from configuration, with an optional model override
    pub fn from_config(config: &Config, kind: ProviderKind, model: Option<&str>) -> Result<Self> {
        let settings = config.provider_settings(kind);
        let model = model.unwrap_or(settings.model.as_str()).to_string();
        let api_key = config.provider_api_key(kind);
        let timeout = Duration::from_secs(config.llm.timeout_secs);
        let base = settings.base_url.trim_end_matches('/');

        Ok(match kind {
            ProviderKind::Claude => {
                Provider::Claude(ClaudeProvider::new(base, api_key, model, timeout)?)
            }
            ProviderKind::Openai | ProviderKind::Deepseek => Provider::ChatCompletions(
                ChatCompletionsProvider::new(kind, base, api_key, model, timeout, None)?,
            ),
            ProviderKind::Ollama => Provider::ChatCompletions(ChatCompletionsProvider::new(
                kind,
                &format!("{}/v1", base),
                None,
                model,
                timeout,
                Some(format!("{}/api/tags", base)),
            )?),
        })
    }
}

#[async_trait]
impl LlmProvider for Provider {
    async fn call(&self, prompt: &str, params: &CallParams) -> Result<String> {
        match self {
            Provider::Claude(p) => p.call(prompt, params).await,
            Provider::ChatCompletions(p) => p.call(prompt, params).await,
        }
    }

    async fn is_available(&self) -> bool {
        match self {
            Provider::Claude(p) => p.is_available().await,
            Provider::ChatCompletions(p) => p.is_available().await,
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Provider::Claude(p) => p.model_name(),
            Provider::ChatCompletions(p) => p.model_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_from_config_uses_override() {
        let mut config = Config::default();
        config.llm.openai.api_key = Some("sk-test".into());

        let provider = Provider::from_config(&config, ProviderKind::Openai, Some("gpt-4o-mini")).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o-mini");
        assert!(provider.is_available().await);

        let claude = Provider::from_config(&config, ProviderKind::Claude, None).unwrap();
        assert_eq!(claude.model_name(), config.llm.claude.model);
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let mut config = Config::default();
        config.api_keys.deepseek = None;
        config.llm.deepseek.api_key = None;

        let provider = Provider::from_config(&config, ProviderKind::Deepseek, None).unwrap();
        assert!(!provider.is_available().await);
    }
}
