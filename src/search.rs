//! Paginated web-search retrieval.
//!
//! [`SearchBackend`] is the seam between the pagination logic and the
//! provider transport; [`SerperClient`] is the concrete implementation.
//! [`run_search`] owns the page loop: accumulate `organic` hits page by page
//! until a short page or the hard page cap, spacing provider requests through
//! a [`RateLimiter`] shared across all workers of a request.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::error::ScoutError;
use crate::models::SearchHit;

/// Hits plus the provider-formatted query that produced them.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub query_used: String,
}

/// Trait for search providers: fetch one page of organic results.
///
/// Page numbers start at 1. Implementations perform exactly one request per
/// call and never retry; classification of failures follows
/// [`ScoutError::SearchProvider`] / [`ScoutError::SearchTransport`].
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn fetch_page(&self, query: &str, page: u32) -> Result<Vec<SearchHit>, ScoutError>;
}

/// Collapse a query to whitespace-delimited tokens joined with `+`
/// (the provider's transport encoding).
pub fn format_query(query_text: &str) -> String {
    query_text.split_whitespace().collect::<Vec<_>>().join("+")
}

/// Minimum-interval spacing for provider requests, shared across workers.
///
/// The lock is held across the sleep on purpose: concurrent waiters queue up
/// and each departs one interval after the previous request, which is the
/// whole-pipeline budget the provider rate limit calls for.
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Wait until at least `min_interval` has passed since the previous
    /// dispatch, then claim the current slot.
    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let due = prev + self.min_interval;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Run one query against the provider with bounded pagination.
///
/// Stops when a page returns fewer than `page_size` hits or when `max_pages`
/// pages have been fetched. Cancellation is observed between pages and while
/// a page request is in flight; hits accumulated before cancellation are
/// returned, not discarded. No results is an empty outcome, not an error.
pub async fn run_search(
    backend: &dyn SearchBackend,
    limiter: &RateLimiter,
    config: &SearchConfig,
    query_text: &str,
    cancel: &CancellationToken,
) -> Result<SearchOutcome, ScoutError> {
    let formatted = format_query(query_text);
    if formatted.is_empty() {
        return Ok(SearchOutcome {
            hits: Vec::new(),
            query_used: String::new(),
        });
    }

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut page: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        limiter.wait().await;

        let page_hits = tokio::select! {
            _ = cancel.cancelled() => break,
            fetched = backend.fetch_page(&formatted, page) => fetched?,
        };

        let count = page_hits.len();
        hits.extend(page_hits);
        tracing::debug!(page, count, total = hits.len(), "fetched search page");

        if count < config.page_size {
            break;
        }
        page += 1;
        if page > config.max_pages {
            break;
        }
    }

    Ok(SearchOutcome {
        hits,
        query_used: formatted,
    })
}

// ============ Serper provider ============

/// Client for a Serper-compatible search endpoint.
///
/// Posts `{q, page}` with an `X-Api-Key` header and reads the `organic`
/// array of the reply. The API key is read from the environment variable
/// named in the configuration; a missing key fails construction with
/// [`ScoutError::SearchNotConfigured`] before any network traffic.
#[derive(Debug)]
pub struct SerperClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl SerperClient {
    pub fn new(config: &SearchConfig) -> Result<Self, ScoutError> {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ScoutError::SearchNotConfigured(config.api_key_env.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScoutError::SearchTransport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl SearchBackend for SerperClient {
    async fn fetch_page(&self, query: &str, page: u32) -> Result<Vec<SearchHit>, ScoutError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .json(&serde_json::json!({ "q": query, "page": page }))
            .send()
            .await
            .map_err(|e| ScoutError::SearchTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::SearchProvider {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScoutError::SearchTransport(format!("invalid response body: {e}")))?;

        let hits = json
            .get("organic")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().cloned().map(SearchHit).collect())
            .unwrap_or_default();

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> SearchConfig {
        SearchConfig::default()
    }

    /// Backend that serves a fixed script of page sizes and counts requests.
    struct ScriptedBackend {
        pages: Vec<usize>,
        requests: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(pages: Vec<usize>) -> Self {
            Self {
                pages,
                requests: AtomicUsize::new(0),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn fetch_page(&self, query: &str, page: u32) -> Result<Vec<SearchHit>, ScoutError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let count = self
                .pages
                .get(page as usize - 1)
                .copied()
                .unwrap_or_default();
            Ok((0..count)
                .map(|i| {
                    SearchHit(serde_json::json!({
                        "title": format!("{query} p{page} #{i}"),
                        "position": i + 1
                    }))
                })
                .collect())
        }
    }

    #[test]
    fn format_query_joins_tokens_with_plus() {
        assert_eq!(format_query("  price   NTN  4T-30205 "), "price+NTN+4T-30205");
        assert_eq!(format_query(""), "");
        assert_eq!(format_query("   "), "");
    }

    #[tokio::test]
    async fn short_page_stops_pagination() {
        let backend = ScriptedBackend::new(vec![10, 10, 10, 4]);
        let limiter = RateLimiter::new(Duration::ZERO);
        let outcome = run_search(
            &backend,
            &limiter,
            &test_config(),
            "tapered roller bearing",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.hits.len(), 34);
        assert_eq!(backend.request_count(), 4, "no page 5 request");
    }

    #[tokio::test]
    async fn hard_cap_stops_after_five_pages() {
        let backend = ScriptedBackend::new(vec![10; 20]);
        let limiter = RateLimiter::new(Duration::ZERO);
        let outcome = run_search(
            &backend,
            &limiter,
            &test_config(),
            "very popular query",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.hits.len(), 50);
        assert_eq!(backend.request_count(), 5, "no sixth request");
    }

    #[tokio::test]
    async fn pages_concatenate_in_provider_order() {
        let backend = ScriptedBackend::new(vec![10, 3]);
        let limiter = RateLimiter::new(Duration::ZERO);
        let outcome = run_search(
            &backend,
            &limiter,
            &test_config(),
            "q",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.hits.len(), 13);
        assert_eq!(outcome.hits[0].title(), Some("q p1 #0"));
        assert_eq!(outcome.hits[10].title(), Some("q p2 #0"));
    }

    #[tokio::test]
    async fn empty_query_makes_no_request() {
        let backend = ScriptedBackend::new(vec![10]);
        let limiter = RateLimiter::new(Duration::ZERO);
        let outcome = run_search(
            &backend,
            &limiter,
            &test_config(),
            "   ",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.query_used, "");
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn no_results_is_not_an_error() {
        let backend = ScriptedBackend::new(vec![0]);
        let limiter = RateLimiter::new(Duration::ZERO);
        let outcome = run_search(
            &backend,
            &limiter,
            &test_config(),
            "obscure query",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.query_used, "obscure+query");
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_page() {
        let backend = ScriptedBackend::new(vec![10, 10]);
        let limiter = RateLimiter::new(Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_search(&backend, &limiter, &test_config(), "q", &cancel)
            .await
            .unwrap();

        assert!(outcome.hits.is_empty());
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn backend_error_propagates_with_kind() {
        struct FailingBackend;

        #[async_trait]
        impl SearchBackend for FailingBackend {
            async fn fetch_page(
                &self,
                _query: &str,
                _page: u32,
            ) -> Result<Vec<SearchHit>, ScoutError> {
                Err(ScoutError::SearchProvider {
                    status: 403,
                    body: "invalid key".to_string(),
                })
            }
        }

        let limiter = RateLimiter::new(Duration::ZERO);
        let err = run_search(
            &FailingBackend,
            &limiter,
            &test_config(),
            "q",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScoutError::SearchProvider { status: 403, .. }));
    }

    #[tokio::test]
    async fn rate_limiter_spaces_dispatches() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(60),
            "three dispatches spaced by 30ms took only {elapsed:?}"
        );
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let config = SearchConfig {
            api_key_env: "TSCOUT_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..SearchConfig::default()
        };
        let err = SerperClient::new(&config).unwrap_err();
        assert!(matches!(err, ScoutError::SearchNotConfigured(_)));
    }
}
