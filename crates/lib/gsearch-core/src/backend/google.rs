use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use gsearch_store::SearchResult;
use gsearch_store::schema::{MAX_NUM_RESULTS, NO_TITLE};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, RETRY_AFTER, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{FetchError, SearchBackend, UpstreamRequest};

pub const DEFAULT_ENDPOINT: &str = "https://www.google.com/search";
const GOOGLE_ORIGIN: &str = "https://www.google.com/";
const CONSENT_COOKIE: &str = "CONSENT=PENDING+987; SOCS=CAESHAgBEhIaAB";

// Lightweight (no-JS) result layout served to text browsers.
static RESULT_BLOCK: LazyLock<Selector> = LazyLock::new(|| selector("div.ezO2md"));
static RESULT_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static RESULT_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("span.CVA68e"));
static RESULT_SNIPPET: LazyLock<Selector> = LazyLock::new(|| selector("span.FrIlee"));

// Classic desktop layout.
static CLASSIC_BLOCK: LazyLock<Selector> = LazyLock::new(|| selector("div.g"));
static CLASSIC_HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h3"));
static CLASSIC_SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| selector("div.VwiC3b, span.aCOpRe, div[data-sncf]"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

/// Configuration for the Google HTML backend.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub endpoint: String,
    pub language: String,
    pub region: Option<String>,
    pub safe: Option<String>,
    pub timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
}

impl GoogleConfig {
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    #[must_use]
    pub fn with_safe(mut self, safe: Option<String>) -> Self {
        self.safe = safe;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: "en".to_string(),
            region: None,
            safe: None,
            timeout: Duration::from_secs(10),
            page_size: 10,
            max_pages: 5,
        }
    }
}

/// Scrapes Google's HTML result pages.
#[derive(Debug, Clone)]
pub struct GoogleBackend {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleBackend {
    /// Builds a backend with its own HTTP client.
    ///
    /// # Errors
    /// Returns `FetchError::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: GoogleConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|err| FetchError::Transport(format!("http client error: {err}")))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &GoogleConfig {
        &self.config
    }

    async fn fetch_page(
        &self,
        request: &UpstreamRequest,
        wanted: u32,
        start: u32,
    ) -> Result<String, FetchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", request.query.clone()),
            ("num", (wanted + 2).to_string()),
            ("hl", self.config.language.clone()),
            ("start", start.to_string()),
        ];
        if let Some(safe) = &self.config.safe {
            params.push(("safe", safe.clone()));
        }
        if let Some(region) = &self.config.region {
            params.push(("gl", region.clone()));
        }

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&params)
            .header(USER_AGENT, &request.user_agent)
            .header(ACCEPT, "*/*")
            .header(COOKIE, CONSENT_COOKIE)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        // Blocked clients are redirected to an interstitial captcha page.
        if response.url().path().starts_with("/sorry") {
            return Err(FetchError::RateLimited { retry_after: None });
        }
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.contains("html"))
        {
            return Err(FetchError::InvalidResponse(format!(
                "unexpected content type {content_type}"
            )));
        }
        response.text().await.map_err(map_transport)
    }
}

impl SearchBackend for GoogleBackend {
    async fn search(&self, request: &UpstreamRequest) -> Result<Vec<SearchResult>, FetchError> {
        let wanted = usize::try_from(request.num_results).unwrap_or(usize::MAX);
        let mut results: Vec<SearchResult> = Vec::with_capacity(wanted.min(64));
        let mut seen = HashSet::new();
        let mut start = 0;

        for _ in 0..self.config.max_pages.max(1) {
            let remaining = u32::try_from(wanted - results.len()).unwrap_or(MAX_NUM_RESULTS);
            let html = self.fetch_page(request, remaining, start).await?;
            let page = parse_results_page(&html);
            debug!(start, parsed = page.len(), "parsed upstream result page");

            let mut fresh = 0_usize;
            for result in page {
                if results.len() >= wanted {
                    break;
                }
                if seen.insert(result.url.clone()) {
                    results.push(result);
                    fresh += 1;
                }
            }
            if fresh == 0 || results.len() >= wanted {
                break;
            }
            start += self.config.page_size;
        }

        Ok(results)
    }
}

/// Extracts ranked results from one Google result page, in page order.
///
/// Understands the lightweight layout served to text browsers and falls back
/// to the classic desktop layout when the former yields nothing.
#[must_use]
pub fn parse_results_page(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let results = parse_lightweight(&document);
    if results.is_empty() {
        parse_classic(&document)
    } else {
        results
    }
}

fn parse_lightweight(document: &Html) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for block in document.select(&RESULT_BLOCK) {
        let Some(link) = block.select(&RESULT_LINK).next() else {
            continue;
        };
        let Some(title) = link.select(&RESULT_TITLE).next() else {
            continue;
        };
        let Some(snippet) = block.select(&RESULT_SNIPPET).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(resolve_href) else {
            continue;
        };
        results.push(SearchResult {
            title: title_or_placeholder(&title),
            url,
            description: Some(element_text(&snippet)),
        });
    }
    results
}

fn parse_classic(document: &Html) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for block in document.select(&CLASSIC_BLOCK) {
        let Some((link, heading)) = block.select(&RESULT_LINK).find_map(|link| {
            link.select(&CLASSIC_HEADING)
                .next()
                .map(|heading| (link, heading))
        }) else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(resolve_href) else {
            continue;
        };
        let description = block
            .select(&CLASSIC_SNIPPET)
            .next()
            .map(|snippet| element_text(&snippet))
            .filter(|text| !text.is_empty());
        results.push(SearchResult {
            title: title_or_placeholder(&heading),
            url,
            description,
        });
    }
    results
}

/// Turns a result link into the destination URL, unwrapping `/url?q=` redirects.
fn resolve_href(href: &str) -> Option<String> {
    let href = href.trim();
    if is_http(href) {
        return Some(href.to_string());
    }
    if !href.starts_with("/url?") {
        return None;
    }
    let redirect = Url::parse(GOOGLE_ORIGIN).ok()?.join(href).ok()?;
    redirect
        .query_pairs()
        .find(|(name, _)| name == "q" || name == "url")
        .map(|(_, target)| target.into_owned())
        .filter(|target| is_http(target))
}

fn is_http(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_or_placeholder(element: &ElementRef<'_>) -> String {
    let title = element_text(element);
    if title.is_empty() {
        NO_TITLE.to_string()
    } else {
        title
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn map_transport(err: reqwest::Error) -> FetchError {
    if let Some(status) = err.status() {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return FetchError::RateLimited { retry_after: None };
        }
        return FetchError::Status(status.as_u16());
    }
    FetchError::Transport(err.to_string())
}
