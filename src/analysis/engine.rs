use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::{analysis_key, AnalysisCache};
use super::response::parse_analysis;
use super::{Analysis, DetailLevel};
use crate::error::Result;
use crate::llm::{CallParams, LlmProvider};
use crate::parallel::ParallelProcessor;
use crate::prompts;
use crate::readme::ReadmeSource;
use crate::trending::Repository;

/// Per-call options
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// README budget and prompt verbosity
    pub detail: DetailLevel,
    /// Skip the cache lookup; the result still overwrites the cache entry
    pub force: bool,
}

/// Where an analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    /// Served from the analysis cache
    Cache,
    /// Produced by the provider during this call
    Provider,
}

/// Result of analyzing one repository
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// The analysis
    pub analysis: Analysis,
    /// Cache hit or fresh provider call
    pub source: AnalysisSource,
    /// Set when a fresh analysis could not be written to the cache
    pub cache_error: Option<String>,
}

/// One repository of a batch with its own result
#[derive(Debug)]
pub struct BatchItem {
    /// The repository analyzed
    pub repository: Repository,
    /// Its analysis or the error that stopped it
    pub result: Result<AnalysisOutcome>,
}

/// Orchestrates README resolution, caching and provider calls
pub struct AnalysisEngine {
    readme: Arc<dyn ReadmeSource>,
    cache: Option<AnalysisCache>,
    provider: Arc<dyn LlmProvider>,
    params: CallParams,
    ttl: Duration,
    concurrency: usize,
}

impl AnalysisEngine {
    /// Creates an engine; `cache: None` disables both lookup and write-back
    pub fn new(
        readme: Arc<dyn ReadmeSource>,
        cache: Option<AnalysisCache>,
        provider: Arc<dyn LlmProvider>,
        params: CallParams,
        ttl: Duration,
    ) -> Self {
        Self {
            readme,
            cache,
            provider,
            params,
            ttl,
            concurrency: 1,
        }
    }

    /// Sets how many repositories a batch analyzes at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Model identifier of the configured provider
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Analyzes one repository
    ///
    /// README, then cache (unless forced), then provider, then write-back.
    /// A failed write-back is reported in the outcome, not as an error.
    pub async fn analyze(&self, repo: &Repository, options: AnalyzeOptions) -> Result<AnalysisOutcome> {
        let full_name = repo.full_name();
        let readme = self
            .readme
            .resolve(&repo.owner, &repo.name, options.detail)
            .await?;

        let model = self.provider.model_name().to_string();
        let key = analysis_key(&readme, options.detail, &model);

        if let (Some(cache), false) = (&self.cache, options.force) {
            if let Some(analysis) = cache.get(&key).await {
                debug!("Analysis cache hit for {} ({})", full_name, key);
                return Ok(AnalysisOutcome {
                    analysis,
                    source: AnalysisSource::Cache,
                    cache_error: None,
                });
            }
        }

        info!("Analyzing {} with {}", full_name, model);
        let prompt = prompts::analysis_prompt(repo, &readme, options.detail);
        let raw = self.provider.call(&prompt, &self.params).await?;
        let analysis = parse_analysis(&raw, &model)?;

        let cache_error = match &self.cache {
            Some(cache) => match cache.put(&key, &analysis, self.ttl).await {
                Ok(()) => None,
                Err(e) => {
                    warn!("Failed to cache analysis for {}: {}", full_name, e);
                    Some(e.to_string())
                }
            },
            None => None,
        };

        Ok(AnalysisOutcome {
            analysis,
            source: AnalysisSource::Provider,
            cache_error,
        })
    }

    /// Analyzes many repositories concurrently
    ///
    /// Results are returned in the order of `repos`, one per repository; a
    /// failure for one repository never stops the others. `on_complete` runs
    /// as each repository finishes.
    pub async fn analyze_batch<F>(
        &self,
        repos: &[Repository],
        options: AnalyzeOptions,
        on_complete: F,
    ) -> Vec<BatchItem>
    where
        F: Fn(&Repository, &Result<AnalysisOutcome>),
    {
        let on_complete = &on_complete;
        let tasks: Vec<_> = repos
            .iter()
            .map(|repo| async move {
                let result = self.analyze(repo, options).await;
                if let Err(e) = &result {
                    warn!("Analysis failed for {}: {}", repo.full_name(), e);
                }
                on_complete(repo, &result);
                BatchItem {
                    repository: repo.clone(),
                    result,
                }
            })
            .collect();

        ParallelProcessor::new(self.concurrency).process(tasks).await
    }
}
