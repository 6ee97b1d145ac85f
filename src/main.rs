use clap::{Args, Parser, Subcommand};
use colored::*;
use github_trending::{
    analysis::{AnalysisSource, BatchItem},
    cache::CacheStats,
    config::Config,
    error::{Result, TrendingError},
    github::parse_full_name,
    llm::{LlmProvider, Provider, ProviderKind},
    logging,
    output::{self, OutputFormat, Record},
    storage::{JsonlStore, SnapshotStore},
    trending::{Period, Repository, TrendingQuery, POPULAR_LANGUAGES},
    AnalysisCache, AnalyzeOptions, App, DetailLevel, TrendCache,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List trending repositories
    Trending(TrendingArgs),
    /// Show one repository
    Repo(RepoArgs),
    /// Remove expired cache entries, or every entry with --all
    CacheClear {
        /// Remove valid entries too
        #[arg(long)]
        all: bool,
    },
    /// Show cache entry counts and sizes
    CacheStats,
    /// List commonly used language filters
    Languages,
}

#[derive(Args)]
struct TrendingArgs {
    /// Language filter, e.g. rust or c++
    #[arg(short, long)]
    language: Option<String>,

    /// Trending window
    #[arg(short, long, value_enum, default_value_t = Period::Daily)]
    since: Period,

    /// Maximum repositories to show (0 for all)
    #[arg(short = 'n', long, default_value_t = 25)]
    limit: usize,

    /// Refetch the listing even when cached, then update the cache
    #[arg(long)]
    refresh: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct RepoArgs {
    /// Repository as owner/name or a github.com URL
    repository: String,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Append results to the history file
    #[arg(long)]
    save: bool,

    /// Analyze READMEs with the configured LLM provider
    #[arg(long)]
    ai: bool,

    /// Provider to use instead of the configured one
    #[arg(long, value_enum)]
    ai_provider: Option<ProviderKind>,

    /// Model to use instead of the provider's default
    #[arg(long)]
    ai_model: Option<String>,

    /// Bypass the trend and analysis caches
    #[arg(long)]
    no_cache: bool,

    /// Re-run analyses even when cached
    #[arg(long)]
    force: bool,

    /// README budget and analysis depth
    #[arg(long, value_enum, default_value_t = DetailLevel::Standard)]
    detail_level: DetailLevel,

    /// HTTP(S) proxy for all requests
    #[arg(long)]
    proxy: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(2);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(if e.is_fatal() { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Trending(args) => {
            apply_common(&mut config, &args.common);
            config.ensure_directories_exist().await?;
            let app = App::from_config(&config)?;

            let query = TrendingQuery::new(args.language.as_deref(), args.since, args.limit);
            let result = app.trending.fetch(&query, args.refresh).await?;
            if result.from_cache {
                info!("Serving {} from cache", query.canonical_key());
            }

            let records = build_records(&app, &config, result.repositories, &args.common).await?;
            finish(&config, &records, &args.common).await
        }
        Command::Repo(args) => {
            apply_common(&mut config, &args.common);
            config.ensure_directories_exist().await?;
            let app = App::from_config(&config)?;

            let (owner, name) = parse_full_name(&args.repository)?;
            let repository = app.github.repository(&owner, &name).await?;

            let records = build_records(&app, &config, vec![repository], &args.common).await?;
            finish(&config, &records, &args.common).await
        }
        Command::CacheClear { all } => {
            let trends = trend_cache(&config);
            let analyses = analysis_cache(&config);
            let (trending, analysis) = if all {
                (trends.clear_all().await?, analyses.clear_all().await?)
            } else {
                (trends.clear_expired().await?, analyses.clear_expired().await?)
            };
            println!(
                "{} {} trending and {} analysis entries",
                "Removed".green().bold(),
                trending,
                analysis
            );
            Ok(())
        }
        Command::CacheStats => {
            let trending = trend_cache(&config).stats().await?;
            let analysis = analysis_cache(&config).stats().await?;
            print_stats("Trending cache", &config.cache.trending_dir(), &trending);
            print_stats("Analysis cache", &config.cache.analysis_dir(), &analysis);
            Ok(())
        }
        Command::Languages => {
            println!("{}", "Popular languages:".bright_yellow());
            for language in POPULAR_LANGUAGES {
                println!("  {}", language);
            }
            println!("{}", "Any language slug used on github.com/trending works.".dimmed());
            Ok(())
        }
    }
}

fn trend_cache(config: &Config) -> TrendCache {
    TrendCache::new(config.cache.trending_dir(), config.cache.trending_ttl())
}

fn analysis_cache(config: &Config) -> AnalysisCache {
    AnalysisCache::new(config.cache.analysis_dir(), config.cache.analysis_ttl())
}

fn apply_common(config: &mut Config, args: &CommonArgs) {
    if let Some(proxy) = &args.proxy {
        config.http.proxy = Some(proxy.clone());
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    if let Some(provider) = args.ai_provider {
        config.llm.provider = provider;
    }
}

/// Ranks repositories and, with `--ai`, attaches analyses
async fn build_records(
    app: &App,
    config: &Config,
    repositories: Vec<Repository>,
    args: &CommonArgs,
) -> Result<Vec<Record>> {
    if !args.ai || repositories.is_empty() {
        return Ok(repositories
            .into_iter()
            .enumerate()
            .map(|(i, repo)| Record::plain(i + 1, repo))
            .collect());
    }

    let provider = Provider::from_config(config, config.llm.provider, args.ai_model.as_deref())?;
    if !provider.is_available().await {
        return Err(TrendingError::Config(format!(
            "LLM provider {} is not available (missing API key or server not reachable)",
            config.llm.provider
        )));
    }
    let provider: Arc<dyn LlmProvider> = Arc::new(provider);
    let engine = app.analysis_engine(config, provider);
    info!("Analyzing {} repositories with {}", repositories.len(), engine.model_name());

    let progress = ProgressBar::new(repositories.len() as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    progress.set_style(style);

    let options = AnalyzeOptions {
        detail: args.detail_level,
        force: args.force,
    };
    let items = engine
        .analyze_batch(&repositories, options, |repo, result| {
            let status = match result {
                Ok(outcome) if outcome.source == AnalysisSource::Cache => "cached",
                Ok(_) => "analyzed",
                Err(_) => "failed",
            };
            progress.set_message(format!("{} {}", repo.full_name(), status));
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(i, BatchItem { repository, result })| match result {
            Ok(outcome) => {
                if let Some(e) = outcome.cache_error {
                    warn!("Analysis of {} not cached: {}", repository.full_name(), e);
                }
                Record {
                    rank: i + 1,
                    repository,
                    analysis: Some(outcome.analysis),
                    analysis_error: None,
                }
            }
            Err(e) => Record {
                rank: i + 1,
                repository,
                analysis: None,
                analysis_error: Some(e.to_string()),
            },
        })
        .collect())
}

async fn finish(config: &Config, records: &[Record], args: &CommonArgs) -> Result<()> {
    println!("{}", output::render(args.output, records)?);

    if args.save {
        let store = JsonlStore::new(&config.storage.history_file);
        for record in records {
            store.save(&record.repository, record.analysis.as_ref()).await?;
        }
        eprintln!(
            "{} {} records to {}",
            "Saved".green().bold(),
            records.len(),
            store.path().display()
        );
    }
    Ok(())
}

fn print_stats(title: &str, dir: &std::path::Path, stats: &CacheStats) {
    println!("{} ({})", title.bright_white().bold(), dir.display());
    println!(
        "  entries: {}  valid: {}  expired: {}  size: {} bytes",
        stats.total,
        stats.valid.to_string().green(),
        stats.expired.to_string().yellow(),
        stats.bytes
    );
}
