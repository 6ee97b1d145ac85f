use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, HttpConfig};
use crate::error::{Result, TrendingError};
use crate::rate_limiter::RateLimiter;
use crate::utils::retry::{with_retry, RetryPolicy};

/// Status and body of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Response body as text
    pub body: String,
}

/// HTTP client used for every outbound request
///
/// Each attempt takes a token from the per-host rate limiter and sends a
/// user agent drawn from the configured pool. Network failures, 429 and
/// 5xx are retried with exponential backoff; other 4xx fail immediately.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    limiter: RateLimiter,
    retry: RetryPolicy,
    user_agents: Vec<String>,
}

impl FetchClient {
    /// Creates a client from explicit parts
    pub fn new(http: &HttpConfig, limiter: RateLimiter, retry: RetryPolicy) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
        );
        default_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = Client::builder()
            .timeout(http.timeout())
            .default_headers(default_headers);

        if let Some(proxy) = http.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = Proxy::all(proxy)
                .map_err(|e| TrendingError::Config(format!("Invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TrendingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter,
            retry,
            user_agents: http.user_agents.clone(),
        })
    }

    /// Creates a client with the limiter and retry settings from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let limiter = RateLimiter::from_config(&config.rate_limit)?;
        Self::new(&config.http, limiter, RetryPolicy::from(&config.retry))
    }

    /// Fetches a URL, retrying transient failures
    pub async fn fetch(&self, url: &str, headers: Option<HeaderMap>) -> Result<FetchResponse> {
        let parsed = Url::parse(url)?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let result = with_retry(
            &self.retry,
            |e: &TrendingError| matches!(e, TrendingError::Fetch { .. }) && e.is_transient(),
            |attempt| self.attempt(parsed.clone(), &host, headers.clone(), attempt),
        )
        .await;

        if let Err(ref e) = result {
            if e.is_transient() {
                warn!("Giving up on {} after {} retries: {}", url, self.retry.max_retries, e);
            }
        }
        result
    }

    /// Fetches a URL and returns only the body
    pub async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.fetch(url, None).await?.body)
    }

    /// Fetches a URL and decodes the body as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: Option<HeaderMap>) -> Result<T> {
        let response = self.fetch(url, headers).await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    async fn attempt(
        &self,
        url: Url,
        host: &str,
        headers: Option<HeaderMap>,
        attempt: u32,
    ) -> Result<FetchResponse> {
        self.limiter.acquire(host).await?;

        let user_agent = self.pick_user_agent();
        debug!("GET {} (attempt {})", url, attempt + 1);

        let mut request = self.client.get(url.clone());
        if let Some(ua) = user_agent {
            request = request.header(USER_AGENT, ua);
        }
        if let Some(headers) = headers {
            request = request.headers(headers);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrendingError::fetch(url.as_str(), describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrendingError::fetch_status(url.as_str(), status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TrendingError::fetch(url.as_str(), describe_reqwest_error(&e)))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn pick_user_agent(&self) -> Option<String> {
        let mut rng = rand::thread_rng();
        self.user_agents.choose(&mut rng).cloned()
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::time::Duration;

    const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

    fn test_client(max_retries: u32) -> FetchClient {
        let limiter = RateLimiter::new(100, 100.0).unwrap();
        let retry = RetryPolicy {
            max_retries,
            initial_delay: MIN_RETRY_DELAY,
            max_delay: Duration::from_millis(5),
        };
        FetchClient::new(&HttpConfig::default(), limiter, retry).unwrap()
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/trending")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/trending")
            .with_status(200)
            .with_body("<html></html>")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(3);
        let response = client
            .fetch(&format!("{}/trending", server.url()), None)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html></html>");
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(3);
        let err = client
            .fetch(&format!("{}/missing", server.url()), None)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_last_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(2);
        let err = client
            .fetch(&format!("{}/flaky", server.url()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, TrendingError::Fetch { status: Some(503), .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sends_user_agent_from_pool() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ua")
            .match_header("user-agent", mockito::Matcher::Regex("^Mozilla/5.0".into()))
            .with_status(200)
            .create_async()
            .await;

        let client = test_client(0);
        client.get_text(&format!("{}/ua", server.url())).await.unwrap();
        mock.assert_async().await;
    }

    fn paced_client(max_retries: u32) -> FetchClient {
        let limiter = RateLimiter::new(1, 5.0).unwrap();
        let retry = RetryPolicy {
            max_retries,
            initial_delay: MIN_RETRY_DELAY,
            max_delay: MIN_RETRY_DELAY,
        };
        FetchClient::new(&HttpConfig::default(), limiter, retry).unwrap()
    }

    #[tokio::test]
    async fn test_requests_to_one_host_are_paced() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let client = paced_client(0);
        let url = format!("{}/page", server.url());
        let start = std::time::Instant::now();
        client.fetch(&url, None).await.unwrap();
        client.fetch(&url, None).await.unwrap();

        // One token per request, refilled every 200ms
        assert!(start.elapsed() >= Duration::from_millis(180));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_each_retry_takes_a_token() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/retry")
            .with_status(502)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/retry")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let client = paced_client(1);
        let start = std::time::Instant::now();
        client
            .fetch(&format!("{}/retry", server.url()), None)
            .await
            .unwrap();

        // The retry delay is 1ms, so the rest of the wait is the limiter
        assert!(start.elapsed() >= Duration::from_millis(180));
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_requests_go_through_configured_proxy() {
        let mut proxy = Server::new_async().await;
        let mock = proxy
            .mock("GET", mockito::Matcher::Any)
            .match_header("host", "trending.example.invalid")
            .with_status(200)
            .with_body("via proxy")
            .expect(1)
            .create_async()
            .await;

        let http = HttpConfig {
            proxy: Some(proxy.url()),
            ..HttpConfig::default()
        };
        let retry = RetryPolicy {
            max_retries: 0,
            initial_delay: MIN_RETRY_DELAY,
            max_delay: MIN_RETRY_DELAY,
        };
        let client = FetchClient::new(&http, RateLimiter::new(5, 1.0).unwrap(), retry).unwrap();

        let body = client
            .get_text("http://trending.example.invalid/trending")
            .await
            .unwrap();
        assert_eq!(body, "via proxy");
        mock.assert_async().await;
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let http = HttpConfig {
            proxy: Some("http://[::1".into()),
            ..HttpConfig::default()
        };
        let limiter = RateLimiter::new(5, 1.0).unwrap();
        let retry = RetryPolicy {
            max_retries: 0,
            initial_delay: MIN_RETRY_DELAY,
            max_delay: MIN_RETRY_DELAY,
        };
        assert!(matches!(
            FetchClient::new(&http, limiter, retry),
            Err(TrendingError::Config(_))
        ));
    }
}
