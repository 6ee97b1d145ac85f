//! LLM analysis of repository READMEs
//!
//! [`engine::AnalysisEngine`] resolves the README, consults the
//! content-addressed [`cache::AnalysisCache`], and on a miss asks the
//! configured provider, validating its answer through [`response`].

pub mod cache;
pub mod engine;
pub mod response;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrendingError;

pub use cache::{analysis_key, AnalysisCache};
pub use engine::{AnalysisEngine, AnalysisOutcome, AnalysisSource, AnalyzeOptions, BatchItem};

/// How much README text the model sees and how verbose the prompt is
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Short README excerpt, one-line answers
    Brief,
    /// Default budget
    #[default]
    Standard,
    /// Largest README budget, thorough answers
    Deep,
}

impl DetailLevel {
    /// Lowercase name, also hashed into analysis cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Brief => "brief",
            DetailLevel::Standard => "standard",
            DetailLevel::Deep => "deep",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered rating of how much a developer would learn from a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningValue {
    #[allow(missing_docs)]
    Low,
    #[allow(missing_docs)]
    Medium,
    #[allow(missing_docs)]
    High,
}

impl LearningValue {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningValue::Low => "low",
            LearningValue::Medium => "medium",
            LearningValue::High => "high",
        }
    }
}

impl fmt::Display for LearningValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningValue {
    type Err = TrendingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(LearningValue::Low),
            "medium" => Ok(LearningValue::Medium),
            "high" => Ok(LearningValue::High),
            other => Err(TrendingError::AnalysisValidation(format!(
                "learning_value must be low, medium or high, got {:?}",
                other
            ))),
        }
    }
}

/// Structured result of analyzing one README
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// One-sentence statement of what the project is for
    pub summary: String,
    /// Main capabilities
    pub key_features: Vec<String>,
    /// Languages, frameworks and tools involved
    pub tech_stack: Vec<String>,
    /// Situations the project suits
    pub use_cases: Vec<String>,
    /// Learning value rating
    pub learning_value: LearningValue,
    /// Score in `[0, 10]`
    pub score: f32,
    /// Whether the project is worth a closer look
    pub recommended: bool,
    /// Why it is or is not recommended
    pub reason: String,
    /// Model that produced the analysis
    pub model: String,
    /// When the provider produced it
    pub analyzed_at: DateTime<Utc>,
}
