use colored::*;
use serde::Serialize;

use crate::analysis::Analysis;
use crate::error::Result;
use crate::trending::Repository;
use crate::utils::text::truncate_chars;

/// Output formats for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal table
    #[default]
    Table,
    /// Pretty-printed JSON array
    Json,
}

/// A repository with its analysis, if any
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// 1-based trending rank
    pub rank: usize,
    /// Repository
    #[serde(flatten)]
    pub repository: Repository,
    /// Analysis, when one succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    /// Why analysis failed, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

impl Record {
    /// Record without analysis
    pub fn plain(rank: usize, repository: Repository) -> Self {
        Self {
            rank,
            repository,
            analysis: None,
            analysis_error: None,
        }
    }
}

/// Renders records in `format`
pub fn render(format: OutputFormat, records: &[Record]) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Table => Ok(render_table(records)),
    }
}

fn render_table(records: &[Record]) -> String {
    if records.is_empty() {
        return "No repositories found.".yellow().to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        format!(
            "{:>4}  {:<40} {:<12} {:>8} {:>8} {:>7}",
            "#", "Repository", "Language", "Stars", "+Period", "Forks"
        )
        .bold()
    ));

    for record in records {
        let repo = &record.repository;
        out.push_str(&format!(
            "{:>4}  {:<40} {:<12} {:>8} {:>8} {:>7}\n",
            record.rank,
            truncate_chars(&repo.full_name(), 40).cyan(),
            truncate_chars(repo.language.as_deref().unwrap_or("-"), 12),
            format_count(repo.stars),
            format!("+{}", format_count(repo.stars_in_period)).green(),
            format_count(repo.forks),
        ));
        if !repo.description.is_empty() {
            out.push_str(&format!("      {}\n", truncate_chars(&repo.description, 90).dimmed()));
        }

        if let Some(analysis) = &record.analysis {
            let verdict = if analysis.recommended {
                "recommended".green()
            } else {
                "skip".yellow()
            };
            out.push_str(&format!(
                "      {} {:.1}/10  learning value: {}  {}\n",
                "AI".bright_magenta().bold(),
                analysis.score,
                analysis.learning_value,
                verdict
            ));
            out.push_str(&format!("      {}\n", analysis.summary));
            if !analysis.tech_stack.is_empty() {
                out.push_str(&format!("      tech: {}\n", analysis.tech_stack.join(", ")));
            }
        } else if let Some(error) = &record.analysis_error {
            out.push_str(&format!("      {} {}\n", "AI".bright_magenta().bold(), error.red()));
        }
    }
    out
}

/// `1234` as `1.2k`, `2500000` as `2.5m`
pub fn format_count(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}k", n as f64 / 1_000.0),
        _ => format!("{:.1}m", n as f64 / 1_000_000.0),
    }
}
