use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{Period, Repository};
use crate::error::{Result, TrendingError};
use crate::utils::text::{collapse_whitespace, parse_count};

/// Selectors tried in order for the repository rows; markup has shifted over time
const ARTICLE_SELECTORS: &[&str] = &[
    "article.Box-row",
    "article[data-test-id='repo-row']",
    "div.Box-row",
    "li.js-repo-list-item",
];

/// Present on a trending page even when it lists nothing
const CONTAINER_SELECTORS: &[&str] = &["div.Box", "[data-hpc]", "div.explore-pjax-container"];

const NAME_SELECTORS: &[&str] = &["h2 a[href]", "h1 a[href]", "h3 a[href]"];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "p.col-9",
    "p.color-fg-muted",
    "p.ws-normal",
    "div[dir='auto']",
];

/// Converts a trending page into repository records
///
/// Tolerant by construction: a row missing optional fields still yields a
/// record, and a row without an `owner/name` link is skipped. Only a page
/// whose list container cannot be found is an error.
pub struct TrendingParser {
    base_url: String,
    articles: Vec<Selector>,
    containers: Vec<Selector>,
    names: Vec<Selector>,
    descriptions: Vec<Selector>,
    language: Selector,
    stars: Selector,
    forks: Vec<Selector>,
    period_stars: Selector,
    period_stars_text: Regex,
    avatars: Selector,
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| TrendingError::Parse(format!("invalid selector {:?}: {:?}", selector, e)))
}

fn compile_all(selectors: &[&str]) -> Result<Vec<Selector>> {
    selectors.iter().map(|s| compile(s)).collect()
}

impl TrendingParser {
    /// Parser producing `https://github.com/...` repository URLs
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://github.com")
    }

    /// Parser producing repository URLs under `base_url`
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            articles: compile_all(ARTICLE_SELECTORS)?,
            containers: compile_all(CONTAINER_SELECTORS)?,
            names: compile_all(NAME_SELECTORS)?,
            descriptions: compile_all(DESCRIPTION_SELECTORS)?,
            language: compile("span[itemprop='programmingLanguage']")?,
            stars: compile("a[href$='/stargazers']")?,
            forks: compile_all(&["a[href$='/forks']", "a[href$='/network/members']"])?,
            period_stars: compile("span.float-sm-right")?,
            period_stars_text: Regex::new(r"(?i)(\d[\d,.]*[km]?)\s+stars?")
                .map_err(|e| TrendingError::Parse(format!("invalid pattern: {}", e)))?,
            avatars: compile("img.avatar")?,
        })
    }

    /// Parses a trending document, preserving page order
    pub fn parse(&self, html: &str, period: Period) -> Result<Vec<Repository>> {
        let document = Html::parse_document(html);

        let rows: Vec<ElementRef<'_>> = self
            .articles
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|rows| !rows.is_empty())
            .unwrap_or_default();

        if rows.is_empty() {
            let has_container = self
                .containers
                .iter()
                .any(|selector| document.select(selector).next().is_some());
            if has_container {
                debug!("Trending page lists no repositories");
                return Ok(Vec::new());
            }
            return Err(TrendingError::Parse(
                "repository list container not found".into(),
            ));
        }

        let mut repositories = Vec::with_capacity(rows.len());
        for (rank, row) in rows.into_iter().enumerate() {
            match self.parse_row(row, period) {
                Some(repo) => repositories.push(repo),
                None => warn!("Skipping trending row {} without an owner/name link", rank + 1),
            }
        }
        Ok(repositories)
    }

    fn parse_row(&self, row: ElementRef<'_>, period: Period) -> Option<Repository> {
        let (owner, name) = self.extract_name(row)?;

        let description = self
            .descriptions
            .iter()
            .filter_map(|selector| row.select(selector).next())
            .map(element_text)
            .find(|text| !text.is_empty())
            .unwrap_or_default();

        let language = row
            .select(&self.language)
            .next()
            .map(element_text)
            .filter(|lang| !lang.is_empty());

        let stars = row
            .select(&self.stars)
            .next()
            .map(|el| parse_count(&element_text(el)))
            .unwrap_or(0);

        let forks = self
            .forks
            .iter()
            .filter_map(|selector| row.select(selector).next())
            .map(|el| parse_count(&element_text(el)))
            .next()
            .unwrap_or(0);

        let stars_in_period = row
            .select(&self.period_stars)
            .map(element_text)
            .find_map(|text| {
                self.period_stars_text
                    .captures(&text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| parse_count(m.as_str()))
            })
            .unwrap_or(0);

        let contributors = row
            .select(&self.avatars)
            .filter_map(|img| img.value().attr("src"))
            .map(strip_query)
            .filter(|src| !src.is_empty())
            .collect();

        Some(Repository {
            url: format!("{}/{}/{}", self.base_url, owner, name),
            owner,
            name,
            description,
            language,
            stars,
            stars_in_period,
            forks,
            contributors,
            period,
        })
    }

    fn extract_name(&self, row: ElementRef<'_>) -> Option<(String, String)> {
        self.names
            .iter()
            .flat_map(|selector| row.select(selector))
            .filter_map(|link| link.value().attr("href"))
            .find_map(split_repo_path)
    }
}

/// `/owner/name` (optionally absolute or with a trailing slash) into its parts
fn split_repo_path(href: &str) -> Option<(String, String)> {
    let path = href
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map_or("", |(_, path)| path))
        .unwrap_or(href);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) => Some((owner.to_string(), name.to_string())),
        _ => None,
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn strip_query(src: &str) -> String {
    src.split('?').next().unwrap_or_default().to_string()
}
