#![allow(dead_code)]

use github_trending::config::Config;
use github_trending::trending::{Period, Repository};
use mockito::{Server, ServerGuard};
use std::path::Path;

pub mod test_helpers {
    use super::*;

    pub async fn setup_test_server() -> ServerGuard {
        Server::new_async().await
    }

    /// Configuration pointing every GitHub host at `server_url` with caches in `cache_dir`
    ///
    /// The web host is the server root, the API host lives under `/api` and the
    /// raw host under `/raw`. Retries are fast and the limiter never throttles.
    pub fn create_test_config(server_url: &str, cache_dir: &Path) -> Config {
        let mut config = Config::default();
        config.github.web_base = server_url.to_string();
        config.github.api_base = format!("{}/api", server_url);
        config.github.raw_base = format!("{}/raw", server_url);
        config.cache.dir = cache_dir.to_path_buf();
        config.storage.history_file = cache_dir.join("history.jsonl");
        config.retry.max_retries = 1;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config.rate_limit.capacity = 100;
        config.rate_limit.refill_per_sec = 100.0;
        config.http.timeout_secs = 5;
        config
    }

    pub fn setup_test_logger() {
        let _ = github_trending::logging::init("debug");
    }

    /// A trending page with `count` rows in the current markup
    ///
    /// Row `n` (1-based) is `owner{n}/repo{n}` with `n * 1000` stars, `n * 10`
    /// forks and `n` stars in the period. Rows listed in `without_description`
    /// have no description paragraph.
    pub fn trending_page(count: usize, without_description: &[usize]) -> String {
        let mut rows = String::new();
        for n in 1..=count {
            let description = if without_description.contains(&n) {
                String::new()
            } else {
                format!(
                    r#"<p class="col-9 color-fg-muted my-1 pr-4">Project number {n} does things.</p>"#
                )
            };
            rows.push_str(&format!(
                r#"
      <article class="Box-row">
        <h2 class="h3 lh-condensed">
          <a href="/owner{n}/repo{n}" class="Link">
            <span class="text-normal">owner{n} /</span> repo{n}
          </a>
        </h2>
        {description}
        <div class="f6 color-fg-muted mt-2">
          <span class="d-inline-block ml-0 mr-3">
            <span itemprop="programmingLanguage">Rust</span>
          </span>
          <a href="/owner{n}/repo{n}/stargazers" class="Link">{stars}</a>
          <a href="/owner{n}/repo{n}/forks" class="Link">{forks}</a>
          <span class="d-inline-block mr-3">
            Built by
            <a href="/dev{n}"><img class="avatar mb-1" src="https://avatars.githubusercontent.com/u/{n}?s=40&amp;v=4"></a>
          </span>
          <span class="d-inline-block float-sm-right">{n} stars today</span>
        </div>
      </article>"#,
                stars = format_thousands(n as u64 * 1000),
                forks = n * 10,
            ));
        }
        format!(
            r#"<!DOCTYPE html>
<html>
  <body>
    <div class="application-main">
      <div class="Box">{rows}
      </div>
    </div>
  </body>
</html>"#
        )
    }

    pub fn empty_trending_page() -> String {
        r#"<html><body><div class="Box"><div class="blankslate"><h3>It looks like we don't have any trending repositories.</h3></div></div></body></html>"#
            .to_string()
    }

    pub fn sample_repository(owner: &str, name: &str) -> Repository {
        Repository {
            owner: owner.to_string(),
            name: name.to_string(),
            description: format!("{} by {}", name, owner),
            language: Some("Rust".to_string()),
            stars: 1200,
            stars_in_period: 42,
            forks: 30,
            contributors: vec![],
            period: Period::Daily,
            url: format!("https://github.com/{}/{}", owner, name),
        }
    }

    /// Claude Messages API body whose text is a valid analysis
    pub fn claude_reply(summary: &str, score: f32) -> String {
        let analysis = serde_json::json!({
            "summary": summary,
            "key_features": ["fast", "small"],
            "tech_stack": ["Rust"],
            "use_cases": ["CLI"],
            "learning_value": "high",
            "score": score,
            "is_worthwhile": true,
            "reason": "well structured",
        });
        serde_json::json!({
            "content": [{"type": "text", "text": analysis.to_string()}]
        })
        .to_string()
    }

    fn format_thousands(n: u64) -> String {
        let digits = n.to_string();
        let mut out = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }
}
