//! Scraper adapter
//!
//! Fronts the page fetch behind a `{success, content, error}` contract so
//! downstream consumers keep processing the other URL in a parallel pair
//! even when one fails. Successful fetches land in the shared cache with
//! the configured TTL. A headless rendering engine could be slotted in
//! behind [`Scraper`] without touching callers.

use crate::cache::{scrape_key, TtlCache};
use crate::types::ScrapeResult;
use crate::validate::validate_url_with;
use crate::DEFAULT_USER_AGENT;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Binary content type prefixes the adapter refuses to hand to the LLM
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "font/",
];

/// Options that shape a fetch and key the cache
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Total deadline for connect + body
    pub timeout: Duration,
    /// Prepared content is truncated to this many characters
    pub max_content_chars: usize,
    /// Whether to consult and populate the shared cache
    pub use_cache: bool,
    /// Permit fetching loopback/private targets (tests, intranet use)
    pub allow_internal: bool,
    /// Custom User-Agent
    pub user_agent: Option<String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_content_chars: 10_000,
            use_cache: true,
            allow_internal: false,
            user_agent: None,
        }
    }
}

impl ScrapeOptions {
    /// Stable fingerprint of the options that affect cached content
    fn fingerprint(&self) -> String {
        format!(
            "timeout={};max={}",
            self.timeout.as_secs(),
            self.max_content_chars
        )
    }
}

/// Page fetcher with caching. Cheap to clone, shares one cache.
#[derive(Clone)]
pub struct Scraper {
    cache: Arc<TtlCache<ScrapeResult>>,
    options: ScrapeOptions,
}

impl Scraper {
    /// Create a scraper with a fresh cache using the given TTL.
    pub fn new(options: ScrapeOptions, cache_ttl: Duration) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(cache_ttl)),
            options,
        }
    }

    /// Create a scraper over an existing shared cache.
    pub fn with_cache(options: ScrapeOptions, cache: Arc<TtlCache<ScrapeResult>>) -> Self {
        Self { cache, options }
    }

    /// Drop all cached pages.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The options this scraper was built with.
    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    /// Fetch a page. Never returns an error: validation failures, network
    /// failures and timeouts all come back as `success == false` results.
    pub async fn fetch(&self, url: &str) -> ScrapeResult {
        let started = Instant::now();

        if let Err(e) = validate_url_with(url, self.options.allow_internal) {
            return ScrapeResult::err(url, e.to_string(), elapsed_ms(started));
        }

        let key = scrape_key(url, &self.options.fingerprint());
        if self.options.use_cache {
            if let Some(mut hit) = self.cache.get(&key) {
                debug!(url, "scrape cache hit");
                hit.from_cache = true;
                return hit;
            }
        }

        let result = self.fetch_uncached(url, started).await;
        if result.success && self.options.use_cache {
            self.cache.insert(key, result.clone());
        }
        result
    }

    async fn fetch_uncached(&self, url: &str, started: Instant) -> ScrapeResult {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .options
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html, text/plain, */*;q=0.8"),
        );

        let client = match reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(self.options.timeout.min(Duration::from_secs(10)))
            .timeout(self.options.timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return ScrapeResult::err(
                    url,
                    format!("failed to build HTTP client: {e}"),
                    elapsed_ms(started),
                )
            }
        };

        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("page load timed out after {}s", self.options.timeout.as_secs())
                } else if e.is_connect() {
                    format!("failed to connect: {e}")
                } else {
                    format!("request failed: {e}")
                };
                return ScrapeResult::err(url, reason, elapsed_ms(started));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ScrapeResult::err(
                url,
                format!("server returned status {status}"),
                elapsed_ms(started),
            );
        }

        if let Some(ct) = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
        {
            if is_binary_content_type(ct) {
                return ScrapeResult::err(
                    url,
                    format!("unsupported binary content type: {ct}"),
                    elapsed_ms(started),
                );
            }
        }

        // Remaining budget applies to the body read; a slow stream yields
        // whatever arrived before the deadline rather than nothing.
        let remaining = self
            .options
            .timeout
            .saturating_sub(started.elapsed())
            .max(Duration::from_millis(100));
        let (body, truncated_by_timeout) = read_body_with_deadline(response, remaining).await;
        if truncated_by_timeout {
            warn!(url, "body read hit deadline, using partial content");
        }

        let raw = String::from_utf8_lossy(&body);
        if raw.trim().is_empty() {
            return ScrapeResult::err(url, "no content returned", elapsed_ms(started));
        }

        let content = prepare_content(&raw, self.options.max_content_chars);
        ScrapeResult::ok(url, content, elapsed_ms(started))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn is_binary_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    BINARY_PREFIXES.iter().any(|prefix| ct.starts_with(prefix))
}

/// Read the response body, returning partial content if the deadline fires.
async fn read_body_with_deadline(response: reqwest::Response, budget: Duration) -> (Bytes, bool) {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    let deadline = tokio::time::Instant::now() + budget;

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => body.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        warn!("error reading body chunk: {e}");
                        return (Bytes::from(body), false);
                    }
                    None => return (Bytes::from(body), false),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                return (Bytes::from(body), true);
            }
        }
    }
}

/// Strip script/style blocks and HTML comments, collapse whitespace, and
/// truncate. The result is what the LLM sees; extracted field values keep
/// the page's literal text.
pub fn prepare_content(html: &str, max_chars: usize) -> String {
    let stripped = strip_tag_blocks(html, "script");
    let stripped = strip_tag_blocks(&stripped, "style");
    let stripped = strip_comments(&stripped);

    let mut out = String::with_capacity(stripped.len().min(max_chars));
    let mut pushed = 0usize;
    let mut last_was_space = false;
    for ch in stripped.chars() {
        let ch = if ch.is_whitespace() { ' ' } else { ch };
        if ch == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(ch);
        pushed += 1;
        if pushed >= max_chars {
            break;
        }
    }
    out.trim().to_string()
}

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                // Unterminated block, drop the rest
                return out;
            }
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn strip_comments(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = html[pos..].find("<!--") {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match html[start..].find("-->") {
            Some(end) => pos = start + end + 3,
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}
