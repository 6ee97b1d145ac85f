use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::analysis::DetailLevel;
use crate::config::ReadmeBudgets;
use crate::error::{Result, TrendingError};
use crate::github::GitHubClient;
use crate::utils::text::truncate_chars;

/// File names tried on the raw content host, in order
const RAW_CANDIDATES: &[&str] = &["README.md", "readme.md", "README.rst", "README.txt", "README"];

/// Appended when a README is cut to fit its budget
pub const TRUNCATION_MARKER: &str = "\n\n... (truncated)";

#[derive(Debug, Deserialize)]
struct ApiReadme {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Anything that can produce README text for a repository
#[async_trait]
pub trait ReadmeSource: Send + Sync {
    /// README of `owner/name`, bounded by the budget for `detail`
    async fn resolve(&self, owner: &str, name: &str, detail: DetailLevel) -> Result<String>;
}

/// Fetches README text for a repository
///
/// Sources are tried in order: raw content host, REST API, then the HTML
/// repository page. The first non-empty result wins and is trimmed to the
/// budget of the requested detail level.
pub struct ReadmeResolver {
    github: GitHubClient,
    budgets: ReadmeBudgets,
    article: Selector,
    blocks: Selector,
}

impl ReadmeResolver {
    /// Creates a resolver
    pub fn new(github: GitHubClient, budgets: ReadmeBudgets) -> Result<Self> {
        let parse = |s: &str| {
            Selector::parse(s)
                .map_err(|e| TrendingError::Parse(format!("invalid selector {:?}: {:?}", s, e)))
        };
        Ok(Self {
            github,
            budgets,
            article: parse("article.markdown-body")?,
            blocks: parse("h1, h2, h3, p, li")?,
        })
    }

    /// README text of `owner/name`, cleaned and bounded by the detail budget
    pub async fn resolve(&self, owner: &str, name: &str, detail: DetailLevel) -> Result<String> {
        let budget = self.budgets.for_level(detail);

        match self.from_raw(owner, name).await {
            Ok(text) => return Ok(clean_readme(&text, budget)),
            Err(e) => debug!("Raw README for {}/{} unavailable: {}", owner, name, e),
        }
        match self.from_api(owner, name).await {
            Ok(text) => return Ok(clean_readme(&text, budget)),
            Err(e) => debug!("API README for {}/{} unavailable: {}", owner, name, e),
        }
        match self.from_html(owner, name).await {
            Ok(text) => return Ok(clean_readme(&text, budget)),
            Err(e) => debug!("HTML README for {}/{} unavailable: {}", owner, name, e),
        }

        warn!("No README source succeeded for {}/{}", owner, name);
        Err(TrendingError::ReadmeUnavailable(format!("{}/{}", owner, name)))
    }

    async fn from_raw(&self, owner: &str, name: &str) -> Result<String> {
        let mut last_error = None;
        for file in RAW_CANDIDATES {
            let url = self.github.raw_file_url(owner, name, file);
            match self.github.fetch_client().get_text(&url).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!("Fetched {} for {}/{}", file, owner, name);
                    return Ok(text);
                }
                Ok(_) => last_error = Some(TrendingError::fetch(url, "empty README")),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| TrendingError::fetch("raw", "no candidates")))
    }

    async fn from_api(&self, owner: &str, name: &str) -> Result<String> {
        let url = self.github.api_url(&format!("repos/{}/{}/readme", owner, name));
        let readme: ApiReadme = self
            .github
            .fetch_client()
            .get_json(&url, Some(self.github.api_headers()?))
            .await?;

        let text = match readme.encoding.as_deref() {
            Some("base64") | None => {
                let compact: String = readme.content.split_whitespace().collect();
                let bytes = STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|e| TrendingError::fetch(&url, format!("invalid base64: {}", e)))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Some(_) => readme.content,
        };

        if text.trim().is_empty() {
            return Err(TrendingError::fetch(url, "empty README"));
        }
        Ok(text)
    }

    async fn from_html(&self, owner: &str, name: &str) -> Result<String> {
        let url = self.github.repository_page_url(owner, name);
        let html = self.github.fetch_client().get_text(&url).await?;
        self.extract_article(&html)
            .ok_or_else(|| TrendingError::fetch(url, "no README article on page"))
    }

    /// Flattens `article.markdown-body` into markdown-ish text
    fn extract_article(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let article = document.select(&self.article).next()?;

        let lines: Vec<String> = article
            .select(&self.blocks)
            .filter_map(|el| {
                let text = el.text().collect::<Vec<_>>().join(" ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    return None;
                }
                Some(match el.value().name() {
                    "h1" => format!("# {}", text),
                    "h2" => format!("## {}", text),
                    "h3" => format!("### {}", text),
                    "li" => format!("- {}", text),
                    _ => text,
                })
            })
            .collect();

        let text = if lines.is_empty() {
            article.text().collect::<Vec<_>>().join("\n")
        } else {
            lines.join("\n\n")
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl ReadmeSource for ReadmeResolver {
    async fn resolve(&self, owner: &str, name: &str, detail: DetailLevel) -> Result<String> {
        ReadmeResolver::resolve(self, owner, name, detail).await
    }
}

/// Normalizes README text and fits it into `budget` characters
///
/// Trailing whitespace is trimmed per line and runs of blank lines collapse to
/// one. Text over budget is cut at a line break when that keeps at least 80% of
/// the room, and gets [`TRUNCATION_MARKER`]. The result never exceeds `budget`.
pub fn clean_readme(text: &str, budget: usize) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= budget {
        return cleaned.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if budget <= marker_len {
        return truncate_chars(cleaned, budget).to_string();
    }

    let room = budget - marker_len;
    let mut cut = truncate_chars(cleaned, room);
    if let Some(pos) = cut.rfind('\n') {
        if cut[..pos].chars().count() * 5 >= room * 4 {
            cut = &cut[..pos];
        }
    }
    format!("{}{}", cut.trim_end(), TRUNCATION_MARKER)
}
