mod env_manager;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::DetailLevel;
use crate::error::{Result, TrendingError};
use crate::llm::ProviderKind;
use crate::rate_limiter::TokenBucket;

pub use env_manager::{get_env_value, ApiKeys};

const APP_DIR: &str = "github-trending";

/// Main configuration struct for the application
///
/// Every knob the core consumes lives here: limiter capacity and refill rate,
/// retry parameters, cache TTLs, README budgets, proxy and provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP settings
    pub http: HttpConfig,
    /// Token bucket applied per host
    pub rate_limit: RateLimitConfig,
    /// Retry and backoff for transient fetch failures
    pub retry: RetryConfig,
    /// Trend cache and analysis cache settings
    pub cache: CacheConfig,
    /// README length budget per detail level
    pub readme_budgets: ReadmeBudgets,
    /// GitHub hosts, overridable for mirrors and tests
    pub github: GitHubEndpoints,
    /// LLM provider selection and settings
    pub llm: LlmConfig,
    /// Snapshot history location
    pub storage: StorageConfig,
    /// Keys read from the environment, never serialized
    #[serde(skip)]
    pub api_keys: ApiKeys,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Optional proxy, e.g. `http://127.0.0.1:7890`
    pub proxy: Option<String>,
    /// User-agent pool rotated per request
    pub user_agents: Vec<String>,
}

/// Token bucket parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity in tokens
    pub capacity: u32,
    /// Refill rate in tokens per second
    pub refill_per_sec: f64,
}

/// Retry parameters for the fetch client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further attempt
    pub initial_delay_ms: u64,
    /// Upper bound on a single backoff delay
    pub max_delay_ms: u64,
}

/// Cache locations and lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory; the two caches live in subdirectories
    pub dir: PathBuf,
    /// Lifetime of cached trending results
    pub trending_ttl_secs: u64,
    /// Lifetime of cached analyses
    pub analysis_ttl_secs: u64,
    /// Master switch for both caches
    pub enabled: bool,
}

/// README truncation budgets in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadmeBudgets {
    /// Budget for brief analyses
    pub brief: usize,
    /// Budget for standard analyses
    pub standard: usize,
    /// Budget for deep analyses
    pub deep: usize,
}

/// GitHub hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubEndpoints {
    /// Website host (trending page, repository pages)
    pub web_base: String,
    /// REST API host
    pub api_base: String,
    /// Raw content host
    pub raw_base: String,
}

/// Settings for a single LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key; falls back to the provider's environment variable
    pub api_key: Option<String>,
    /// Model identifier, also part of the analysis cache key
    pub model: String,
    /// Base URL of the provider API
    pub base_url: String,
}

/// LLM selection and call parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider used when none is given on the command line
    pub provider: ProviderKind,
    /// Maximum tokens requested per call
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Repositories analyzed concurrently
    pub concurrency: usize,
    /// Timeout for a single provider call in seconds
    pub timeout_secs: u64,
    /// Anthropic Claude
    pub claude: ProviderSettings,
    /// OpenAI
    pub openai: ProviderSettings,
    /// DeepSeek
    pub deepseek: ProviderSettings,
    /// Local Ollama
    pub ollama: ProviderSettings,
}

/// Snapshot history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON-lines file receiving saved snapshots
    pub history_file: PathBuf,
}

impl Config {
    /// Loads configuration from an explicit path or the default location
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. $XDG_CONFIG_HOME/github-trending/config.toml
    ///
    /// A missing default file yields the default configuration.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => {
                return Err(TrendingError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )))
            }
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(p) => Self::load_from_path(&p)?,
            None => Self::default(),
        };
        config.api_keys = ApiKeys::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML config file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrendingError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string; absent fields take defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Rejects settings the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.capacity == 0 {
            return Err(TrendingError::Config(
                "rate_limit.capacity must be at least 1".into(),
            ));
        }
        if !(self.rate_limit.refill_per_sec > 0.0) {
            return Err(TrendingError::Config(
                "rate_limit.refill_per_sec must be positive".into(),
            ));
        }
        TokenBucket::new(self.rate_limit.capacity, self.rate_limit.refill_per_sec)?;
        let b = &self.readme_budgets;
        if !(b.brief < b.standard && b.standard < b.deep) {
            return Err(TrendingError::Config(format!(
                "readme_budgets must satisfy brief < standard < deep (got {} / {} / {})",
                b.brief, b.standard, b.deep
            )));
        }
        if self.http.user_agents.is_empty() {
            return Err(TrendingError::Config(
                "http.user_agents must not be empty".into(),
            ));
        }
        if self.llm.concurrency == 0 {
            return Err(TrendingError::Config(
                "llm.concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Ensures the cache and history directories exist
    pub async fn ensure_directories_exist(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.cache.trending_dir()).await?;
        tokio::fs::create_dir_all(self.cache.analysis_dir()).await?;
        if let Some(parent) = self.storage.history_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Settings block for a provider
    pub fn provider_settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Claude => &self.llm.claude,
            ProviderKind::Openai => &self.llm.openai,
            ProviderKind::Deepseek => &self.llm.deepseek,
            ProviderKind::Ollama => &self.llm.ollama,
        }
    }

    /// API key for a provider: config file first, then environment
    pub fn provider_api_key(&self, kind: ProviderKind) -> Option<String> {
        self.provider_settings(kind)
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_keys.for_provider(kind).map(str::to_string))
    }
}

impl HttpConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Cap on a single backoff delay
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl CacheConfig {
    /// Directory of the trend cache
    pub fn trending_dir(&self) -> PathBuf {
        self.dir.join("trending")
    }

    /// Directory of the analysis cache
    pub fn analysis_dir(&self) -> PathBuf {
        self.dir.join("analysis")
    }

    /// Lifetime of trending entries
    pub fn trending_ttl(&self) -> Duration {
        Duration::from_secs(self.trending_ttl_secs)
    }

    /// Lifetime of analysis entries
    pub fn analysis_ttl(&self) -> Duration {
        Duration::from_secs(self.analysis_ttl_secs)
    }
}

impl ReadmeBudgets {
    /// Character budget for a detail level
    pub fn for_level(&self, level: DetailLevel) -> usize {
        match level {
            DetailLevel::Brief => self.brief,
            DetailLevel::Standard => self.standard,
            DetailLevel::Deep => self.deep,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            proxy: None,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string(),
            ],
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_per_sec: 1.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let dir = dirs::cache_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".cache").join(APP_DIR));
        Self {
            dir,
            trending_ttl_secs: 3600,
            analysis_ttl_secs: 24 * 3600,
            enabled: true,
        }
    }
}

impl Default for ReadmeBudgets {
    fn default() -> Self {
        Self {
            brief: 2000,
            standard: 8000,
            deep: 20000,
        }
    }
}

impl Default for GitHubEndpoints {
    fn default() -> Self {
        Self {
            web_base: "https://github.com".to_string(),
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Claude,
            max_tokens: 4096,
            temperature: 0.7,
            concurrency: 2,
            timeout_secs: 120,
            claude: ProviderSettings {
                api_key: None,
                model: "claude-3-5-sonnet-20241022".to_string(),
                base_url: "https://api.anthropic.com".to_string(),
            },
            openai: ProviderSettings {
                api_key: None,
                model: "gpt-4".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            },
            deepseek: ProviderSettings {
                api_key: None,
                model: "deepseek-chat".to_string(),
                base_url: "https://api.deepseek.com".to_string(),
            },
            ollama: ProviderSettings {
                api_key: None,
                model: "llama3".to_string(),
                base_url: "http://localhost:11434".to_string(),
            },
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let history_file = dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("data"))
            .join("history.jsonl");
        Self { history_file }
    }
}
