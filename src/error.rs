use std::io;
use thiserror::Error;

/// Custom result type alias for the crate
pub type Result<T> = std::result::Result<T, TrendingError>;

/// Errors that can occur while fetching, parsing, caching or analyzing trending data
#[derive(Debug, Error)]
pub enum TrendingError {
    /// Network or HTTP failure after retries were exhausted, or a terminal status
    #[error("Fetch error for {url}: {message}")]
    Fetch {
        /// URL that was being requested
        url: String,
        /// Last HTTP status received, if the server answered at all
        status: Option<u16>,
        /// Cause of the last failure
        message: String,
    },

    /// The trending page structure was not recognizable
    #[error("Parse error: {0}")]
    Parse(String),

    /// Every README source failed for a repository
    #[error("README unavailable for {0}")]
    ReadmeUnavailable(String),

    /// The LLM response was malformed or missed required fields
    #[error("Analysis validation error: {0}")]
    AnalysisValidation(String),

    /// Reading or writing a cache entry failed
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// Invalid configuration, including rate limiter misuse
    #[error("Config error: {0}")]
    Config(String),

    /// LLM provider transport or protocol errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP client errors that happen outside the retrying fetch path
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// TOML config parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TrendingError {
    /// Builds a fetch error without an HTTP status (transport failure)
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Builds a fetch error for an HTTP status answer
    pub fn fetch_status(url: impl Into<String>, status: u16) -> Self {
        Self::Fetch {
            url: url.into(),
            status: Some(status),
            message: format!("HTTP {}", status),
        }
    }

    /// HTTP status attached to a fetch error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }

    /// Checks if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { status: None, .. } => true,
            Self::Fetch {
                status: Some(code), ..
            } => is_retryable_status(*code),
            Self::Http(_) | Self::Io(_) | Self::Llm(_) => true,
            // Not cached, so the next invocation asks the provider again
            Self::AnalysisValidation(_) => true,
            _ => false,
        }
    }

    /// Checks if this error is fatal and should terminate processing
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// 429 and every 5xx are retried; other statuses are terminal
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
