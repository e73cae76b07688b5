use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use reqwest::{redirect, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::ScraperConfig;
use crate::strategies::{Document, StrategyRegistry};
use crate::utils::error::{AppError, ScrapeError};

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const REFERER: &str = "https://www.google.com/";

/// A successfully downloaded page. Parsing into a [`Document`] happens on demand
/// so the page can cross `.await` points.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn document(&self) -> Document {
        Document::parse(&self.final_url, &self.body)
    }
}

/// Reject anything that is not an absolute http(s) URL.
pub fn validate_url(input: &str) -> Result<Url, ScrapeError> {
    let url = Url::parse(input.trim())
        .map_err(|e| ScrapeError::MalformedInput(format!("invalid url '{}': {}", input, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(ScrapeError::MalformedInput(format!("url '{}' has no host", input))),
        other => Err(ScrapeError::MalformedInput(format!("unsupported url scheme: {}", other))),
    }
}

pub struct DocumentFetcher {
    client: Client,
    head_client: Client,
    config: ScraperConfig,
    registry: Arc<StrategyRegistry>,
}

impl DocumentFetcher {
    pub fn new(config: ScraperConfig, registry: Arc<StrategyRegistry>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .cookie_store(true)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        // Short-link HEAD requests must see the redirect instead of following it
        let head_client = Client::builder()
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            head_client,
            config,
            registry,
        })
    }

    /// Download a page with browser-like headers, expanding short links first.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let requested = validate_url(url)?;
        let target = self.expand_short_link(&requested).await;

        self.pause().await;

        let response = self
            .client
            .get(target.clone())
            .headers(self.browser_headers())
            .send()
            .await
            .map_err(|e| classify_error(target.as_str(), e))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            tracing::warn!("HTTP {} fetching {}", status.as_u16(), final_url);
            return Err(ScrapeError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| ScrapeError::MalformedResponse {
            url: final_url.clone(),
            message: e.to_string(),
        })?;

        if self.is_blocked(&final_url, &body) {
            return Err(ScrapeError::Blocked { url: final_url });
        }

        tracing::debug!("Fetched {} ({} bytes) from {}", final_url, body.len(), url);
        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
        })
    }

    /// Resolve a configured short-link host to its destination. Any failure keeps
    /// the original URL.
    pub async fn expand_short_link(&self, url: &Url) -> Url {
        let is_short = url
            .host_str()
            .is_some_and(|host| self.config.shortener_hosts.iter().any(|s| s.eq_ignore_ascii_case(host)));
        if !is_short {
            return url.clone();
        }

        self.pause().await;

        let response = match self
            .head_client
            .head(url.clone())
            .header(reqwest::header::USER_AGENT, self.pick_user_agent())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to expand shortened URL {}: {}", url, e);
                return url.clone();
            }
        };

        if !response.status().is_redirection() {
            tracing::debug!("Short link {} answered {} without a redirect", url, response.status());
            return url.clone();
        }

        let expanded = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|location| !location.is_empty())
            .and_then(|location| url.join(location).ok());

        match expanded {
            Some(expanded) => {
                tracing::debug!("Expanded URL {} to {}", url, expanded);
                expanded
            }
            None => url.clone(),
        }
    }

    fn is_blocked(&self, url: &str, body: &str) -> bool {
        let doc = Document::parse(url, body);
        self.registry.handlers_for(url).any(|strategy| strategy.is_blocked_page(&doc))
    }

    async fn pause(&self) {
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        };
        let delay = self.config.base_delay() + Duration::from_millis(jitter);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn pick_user_agent(&self) -> String {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
    }

    fn browser_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let user_agent = self.pick_user_agent();
        if let Ok(value) = HeaderValue::from_str(&user_agent) {
            headers.insert(reqwest::header::USER_AGENT, value);
        }

        let fixed = [
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
            ("accept-language", "en-US,en;q=0.9,hi;q=0.8"),
            ("referer", REFERER),
            ("dnt", "1"),
            ("connection", "keep-alive"),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "cross-site"),
            ("pragma", "no-cache"),
            ("cache-control", "no-cache"),
        ];
        for (name, value) in fixed {
            headers.insert(name, HeaderValue::from_static(value));
        }
        headers
    }
}

fn classify_error(url: &str, err: reqwest::Error) -> ScrapeError {
    if err.is_timeout() {
        tracing::warn!("Timed out fetching {}", url);
        return ScrapeError::Timeout { url: url.to_string() };
    }
    if is_dns_failure(&err) {
        tracing::warn!("Could not resolve host for {}", url);
        return ScrapeError::UnresolvableHost { url: url.to_string() };
    }

    tracing::warn!("Transport error fetching {}: {}", url, err);
    ScrapeError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    const MARKERS: &[&str] = &[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
    ];

    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let message = e.to_string().to_lowercase();
        if MARKERS.iter().any(|m| message.contains(m)) {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::GenericStrategy;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn get_test_config() -> ScraperConfig {
        ScraperConfig {
            base_delay_ms: 0,
            jitter_ms: 0,
            request_timeout: 1,
            max_redirects: 5,
            user_agents: vec!["TestAgent/1.0".to_string()],
            shortener_hosts: vec!["127.0.0.1".to_string()],
        }
    }

    fn create_test_fetcher(config: ScraperConfig) -> DocumentFetcher {
        let registry = StrategyRegistry::new().register(Box::new(GenericStrategy::new()));
        DocumentFetcher::new(config, Arc::new(registry)).unwrap()
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://www.amazon.in/dp/B0TEST").is_ok());
        assert!(validate_url("  http://localhost:8080/p  ").is_ok());

        for bad in ["not-a-url", "", "ftp://example.com/file", "mailto:someone@example.com"] {
            let result = validate_url(bad);
            assert!(matches!(result, Err(ScrapeError::MalformedInput(_))), "{}", bad);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_base_delay_plus_jitter() {
        let fetcher = create_test_fetcher(ScraperConfig {
            base_delay_ms: 200,
            jitter_ms: 100,
            ..get_test_config()
        });

        for _ in 0..10 {
            let started = tokio::time::Instant::now();
            fetcher.pause().await;
            let waited = started.elapsed();
            assert!(waited >= Duration::from_millis(200), "{:?}", waited);
            assert!(waited <= Duration::from_millis(300), "{:?}", waited);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_without_delay_returns_immediately() {
        let fetcher = create_test_fetcher(get_test_config());

        let started = tokio::time::Instant::now();
        fetcher.pause().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product/1"))
            .and(header("user-agent", "TestAgent/1.0"))
            .and(header("dnt", "1"))
            .and(header("upgrade-insecure-requests", "1"))
            .and(header("sec-fetch-mode", "navigate"))
            .and(header_exists("accept-language"))
            .and(header_exists("referer"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Kettle</h1>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = get_test_config();
        config.shortener_hosts.clear();
        let fetcher = create_test_fetcher(config);

        let url = format!("{}/product/1", server.uri());
        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.requested_url, url);
        assert!(page.body.contains("Kettle"));
    }

    #[tokio::test]
    async fn test_short_link_is_expanded() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/s/abc"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/product/1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/product/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Kettle</h1>"))
            .mount(&server)
            .await;

        let fetcher = create_test_fetcher(get_test_config());
        let page = fetcher.fetch(&format!("{}/s/abc", server.uri())).await.unwrap();

        assert!(page.final_url.ends_with("/product/1"));
    }

    #[tokio::test]
    async fn test_failed_expansion_keeps_original_url() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .mount(&server)
            .await;

        let fetcher = create_test_fetcher(get_test_config());
        let original = Url::parse(&format!("{}/s/abc", server.uri())).unwrap();

        assert_eq!(fetcher.expand_short_link(&original).await, original);
        let page = fetcher.fetch(original.as_str()).await.unwrap();
        assert!(page.final_url.ends_with("/s/abc"));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut config = get_test_config();
        config.shortener_hosts.clear();
        let fetcher = create_test_fetcher(config);

        let result = fetcher.fetch(&format!("{}/product/1", server.uri())).await;
        assert!(matches!(result, Err(ScrapeError::HttpStatus { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut config = get_test_config();
        config.shortener_hosts.clear();
        let fetcher = create_test_fetcher(config);

        let result = fetcher.fetch(&format!("{}/slow", server.uri())).await;
        assert!(matches!(result, Err(ScrapeError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_blocked_page_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><head><title>Robot Check</title></head><body></body></html>"),
            )
            .mount(&server)
            .await;

        let mut config = get_test_config();
        config.shortener_hosts.clear();
        let fetcher = create_test_fetcher(config);

        let result = fetcher.fetch(&format!("{}/product/1", server.uri())).await;
        assert!(matches!(result, Err(ScrapeError::Blocked { .. })));
    }

    #[tokio::test]
    async fn test_blocked_check_only_runs_for_matching_strategies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Robot Check</title>"))
            .mount(&server)
            .await;

        let mut config = get_test_config();
        config.shortener_hosts.clear();
        // Only the Amazon strategy is registered; a local server is not an Amazon host
        let fetcher = DocumentFetcher::new(config, Arc::new(StrategyRegistry::with_defaults())).unwrap();

        let result = fetcher.fetch(&format!("{}/product/1", server.uri())).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let fetcher = create_test_fetcher(get_test_config());
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(ScrapeError::MalformedInput(_))));
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let mut config = get_test_config();
        config.shortener_hosts.clear();
        let fetcher = create_test_fetcher(config);

        let result = fetcher.fetch("http://pricewatch-test.invalid/product/1").await;
        assert!(matches!(
            result,
            Err(ScrapeError::UnresolvableHost { .. }) | Err(ScrapeError::Transport { .. })
        ));
    }
}
