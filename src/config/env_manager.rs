use crate::llm::ProviderKind;

/// Stores API keys picked up from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    /// GitHub token sent to the REST API host
    pub github_token: Option<String>,
    /// Anthropic API key for the Claude provider
    pub anthropic: Option<String>,
    /// OpenAI API key
    pub openai: Option<String>,
    /// DeepSeek API key
    pub deepseek: Option<String>,
}

impl ApiKeys {
    /// Loads API keys from the process environment
    pub fn from_env() -> Self {
        Self {
            github_token: get_env_value("GITHUB_TOKEN"),
            anthropic: get_env_value("ANTHROPIC_API_KEY"),
            openai: get_env_value("OPENAI_API_KEY"),
            deepseek: get_env_value("DEEPSEEK_API_KEY"),
        }
    }

    /// Key for the given provider; Ollama runs locally and never needs one
    pub fn for_provider(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Claude => self.anthropic.as_deref(),
            ProviderKind::Openai => self.openai.as_deref(),
            ProviderKind::Deepseek => self.deepseek.as_deref(),
            ProviderKind::Ollama => None,
        }
    }
}

/// Reads an environment variable, treating empty values as unset
pub fn get_env_value(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
