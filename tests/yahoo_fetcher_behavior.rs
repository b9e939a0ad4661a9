//! Behavior-driven tests for the Yahoo fundamentals fetcher
//!
//! A scripted transport stands in for Yahoo so these tests can verify crumb
//! handling, retry decisions, circuit breaking, and field mapping offline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use capscreen_core::{
    Backoff, BoxFuture, CircuitBreaker, CircuitBreakerConfig, CircuitState, FetchErrorKind,
    FundamentalsFetcher, HttpClient, HttpError, HttpRequest, HttpResponse, RetryPolicy, Symbol,
    YahooFetcher,
};

const SUMMARY_BODY: &str = r#"{"quoteSummary":{"result":[{
    "price":{"longName":"American Woodmark Corporation","marketCap":{"raw":1250000000.0,"fmt":"1.25B"}},
    "summaryDetail":{"forwardPE":{"raw":11.2},"trailingPE":{"raw":13.9}},
    "defaultKeyStatistics":{"priceToBook":{"raw":1.35}},
    "financialData":{"debtToEquity":{"raw":42.7},"profitMargins":{"raw":0.081}}
}],"error":null}}"#;

#[derive(Default)]
struct ScriptedHttp {
    crumbs: Mutex<VecDeque<HttpResponse>>,
    summaries: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    fn with_crumb(self, response: HttpResponse) -> Self {
        self.crumbs.lock().expect("lock").push_back(response);
        self
    }

    fn with_summary(self, response: Result<HttpResponse, HttpError>) -> Self {
        self.summaries.lock().expect("lock").push_back(response);
        self
    }

    fn count(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .filter(|request| request.url.contains(needle))
            .count()
    }

    fn summary_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .filter(|request| request.url.contains("quoteSummary"))
            .map(|request| request.url.clone())
            .collect()
    }
}

impl HttpClient for ScriptedHttp {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse, HttpError>> {
        Box::pin(async move {
            self.requests.lock().expect("lock").push(request.clone());

            if request.url.starts_with("https://fc.yahoo.com") {
                return Ok(HttpResponse::new(404, ""));
            }
            if request.url.contains("getcrumb") {
                let scripted = self.crumbs.lock().expect("lock").pop_front();
                return Ok(scripted.unwrap_or_else(|| HttpResponse::new(200, "crumb-default")));
            }

            self.summaries
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::new("script exhausted")))
        })
    }
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(1),
        },
        ..RetryPolicy::default()
    }
}

fn fetcher(http: &Arc<ScriptedHttp>, retries: u32) -> YahooFetcher {
    YahooFetcher::with_http_client(Arc::clone(http) as Arc<dyn HttpClient>)
        .with_retry_policy(fast_retries(retries))
}

fn symbol() -> Symbol {
    Symbol::parse("AMWD").expect("valid symbol")
}

// =============================================================================
// Yahoo: Successful Fetches
// =============================================================================

#[tokio::test]
async fn when_yahoo_answers_snapshot_maps_every_module() {
    // Given: A session that yields a crumb and a full quoteSummary body
    let http = Arc::new(
        ScriptedHttp::default()
            .with_crumb(HttpResponse::new(200, "abc123"))
            .with_summary(Ok(HttpResponse::ok_json(SUMMARY_BODY))),
    );

    // When: One symbol is fetched
    let snapshot = fetcher(&http, 0).fetch(&symbol()).await.expect("snapshot");

    // Then: Values come from the expected modules, preferring forward P/E
    assert_eq!(snapshot.market_cap, Some(1.25e9));
    assert_eq!(snapshot.pe_ratio, Some(11.2));
    assert_eq!(snapshot.pb_ratio, Some(1.35));
    assert_eq!(snapshot.debt_to_equity, Some(42.7));
    assert_eq!(snapshot.profit_margin, Some(0.081));
    assert_eq!(
        snapshot.company_name.as_deref(),
        Some("American Woodmark Corporation")
    );

    // And: The request carried the crumb and all four modules
    let urls = http.summary_urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("/quoteSummary/AMWD?"));
    assert!(urls[0].contains("crumb=abc123"));
    assert!(urls[0].contains("financialData"));
}

#[tokio::test]
async fn crumb_is_reused_across_fetches() {
    // Given: Two successful summary responses
    let http = Arc::new(
        ScriptedHttp::default()
            .with_summary(Ok(HttpResponse::ok_json(SUMMARY_BODY)))
            .with_summary(Ok(HttpResponse::ok_json(SUMMARY_BODY))),
    );
    let yahoo = fetcher(&http, 0);

    // When: Two fetches run back to back
    yahoo.fetch(&symbol()).await.expect("first");
    yahoo.fetch(&symbol()).await.expect("second");

    // Then: Only one crumb was requested
    assert_eq!(http.count("getcrumb"), 1);
}

// =============================================================================
// Yahoo: Session and Retry Handling
// =============================================================================

#[tokio::test]
async fn when_crumb_is_rejected_session_is_refreshed_once() {
    // Given: The first summary call is unauthorized, the second succeeds
    let http = Arc::new(
        ScriptedHttp::default()
            .with_crumb(HttpResponse::new(200, "stale"))
            .with_crumb(HttpResponse::new(200, "fresh"))
            .with_summary(Ok(HttpResponse::new(401, "Invalid Crumb")))
            .with_summary(Ok(HttpResponse::ok_json(SUMMARY_BODY))),
    );

    // When: The symbol is fetched
    let result = fetcher(&http, 0).fetch(&symbol()).await;

    // Then: A new crumb was obtained and used for the retry
    assert!(result.is_ok());
    assert_eq!(http.count("getcrumb"), 2);
    let urls = http.summary_urls();
    assert!(urls[1].contains("crumb=fresh"));
}

#[tokio::test]
async fn when_yahoo_keeps_throttling_error_is_rate_limited_after_retries() {
    // Given: Yahoo answers 429 to every summary request
    let http = Arc::new(
        ScriptedHttp::default()
            .with_summary(Ok(HttpResponse::new(429, "Too Many Requests")))
            .with_summary(Ok(HttpResponse::new(429, "Too Many Requests")))
            .with_summary(Ok(HttpResponse::new(429, "Too Many Requests"))),
    );

    // When: The symbol is fetched with two retries allowed
    let err = fetcher(&http, 2)
        .fetch(&symbol())
        .await
        .expect_err("rate limited");

    // Then: Three attempts were made and the error is classified
    assert_eq!(err.kind(), FetchErrorKind::RateLimited);
    assert_eq!(err.code(), "fetch.rate_limited");
    assert_eq!(http.count("quoteSummary"), 3);
}

#[tokio::test]
async fn when_server_error_is_transient_retry_recovers() {
    // Given: One 503 followed by a good response
    let http = Arc::new(
        ScriptedHttp::default()
            .with_summary(Ok(HttpResponse::new(503, "")))
            .with_summary(Ok(HttpResponse::ok_json(SUMMARY_BODY))),
    );

    // When: The symbol is fetched
    let result = fetcher(&http, 2).fetch(&symbol()).await;

    // Then: The second attempt succeeds
    assert!(result.is_ok());
    assert_eq!(http.count("quoteSummary"), 2);
}

#[tokio::test]
async fn when_symbol_is_unknown_no_retry_is_attempted() {
    // Given: Yahoo reports the ticker as not found
    let body = r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for ticker symbol: AMWD"}}}"#;
    let http = Arc::new(ScriptedHttp::default().with_summary(Ok(HttpResponse::new(404, body))));

    // When: The symbol is fetched with retries enabled
    let err = fetcher(&http, 2)
        .fetch(&symbol())
        .await
        .expect_err("not found");

    // Then: The provider's description is surfaced after a single call
    assert_eq!(err.kind(), FetchErrorKind::NotFound);
    assert_eq!(err.message(), "Quote not found for ticker symbol: AMWD");
    assert_eq!(http.count("quoteSummary"), 1);
}

#[tokio::test]
async fn when_transport_times_out_error_is_timeout() {
    // Given: The transport reports a timeout
    let http = Arc::new(
        ScriptedHttp::default().with_summary(Err(HttpError::timeout("deadline elapsed"))),
    );

    // When: The symbol is fetched without retries
    let err = fetcher(&http, 0)
        .fetch(&symbol())
        .await
        .expect_err("timeout");

    // Then: The failure is classified as a timeout
    assert_eq!(err.code(), "fetch.timeout");
    assert!(err.retryable());
}

#[tokio::test]
async fn when_crumb_endpoint_is_throttled_fetch_is_rate_limited() {
    // Given: The crumb endpoint answers 429
    let http = Arc::new(
        ScriptedHttp::default().with_crumb(HttpResponse::new(429, "Too Many Requests")),
    );

    // When: The symbol is fetched
    let err = fetcher(&http, 0)
        .fetch(&symbol())
        .await
        .expect_err("crumb throttled");

    // Then: No summary call is made
    assert_eq!(err.kind(), FetchErrorKind::RateLimited);
    assert_eq!(http.count("quoteSummary"), 0);
}

#[tokio::test]
async fn when_crumb_throttling_is_transient_retry_recovers() {
    // Given: One throttled crumb response, then a good crumb and summary
    let http = Arc::new(
        ScriptedHttp::default()
            .with_crumb(HttpResponse::new(429, "Too Many Requests"))
            .with_crumb(HttpResponse::new(200, "second-try"))
            .with_summary(Ok(HttpResponse::ok_json(SUMMARY_BODY))),
    );
    let yahoo = fetcher(&http, 2);

    // When: The symbol is fetched with retries allowed
    let result = yahoo.fetch(&symbol()).await;

    // Then: The retry obtained a crumb and the summary was fetched once
    assert!(result.is_ok());
    assert_eq!(http.count("getcrumb"), 2);
    assert_eq!(http.count("quoteSummary"), 1);
    assert!(http.summary_urls()[0].contains("crumb=second-try"));
    assert_eq!(yahoo.circuit_breaker().consecutive_failures(), 0);
}

// =============================================================================
// Yahoo: Circuit Breaking
// =============================================================================

#[tokio::test]
async fn when_upstream_keeps_failing_circuit_opens_and_short_circuits() {
    // Given: A breaker that opens after two failures and a failing upstream
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        open_timeout: Duration::from_secs(60),
    }));
    let http = Arc::new(
        ScriptedHttp::default()
            .with_summary(Ok(HttpResponse::new(503, "")))
            .with_summary(Ok(HttpResponse::new(503, ""))),
    );
    let yahoo = fetcher(&http, 0).with_circuit_breaker(Arc::clone(&breaker));

    // When: Three fetches are attempted
    let first = yahoo.fetch(&symbol()).await.expect_err("503");
    let second = yahoo.fetch(&symbol()).await.expect_err("503");
    let third = yahoo.fetch(&symbol()).await.expect_err("open circuit");

    // Then: The third is rejected without touching the network
    assert_eq!(first.code(), "fetch.network");
    assert_eq!(second.code(), "fetch.network");
    assert_eq!(third.kind(), FetchErrorKind::CircuitOpen);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(http.count("quoteSummary"), 2);
}

#[tokio::test]
async fn when_crumb_endpoint_keeps_failing_circuit_opens() {
    // Given: A breaker that opens after two failures and a throttled crumb endpoint
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        open_timeout: Duration::from_secs(60),
    }));
    let http = Arc::new(
        ScriptedHttp::default()
            .with_crumb(HttpResponse::new(429, "Too Many Requests"))
            .with_crumb(HttpResponse::new(429, "Too Many Requests")),
    );
    let yahoo = fetcher(&http, 0).with_circuit_breaker(Arc::clone(&breaker));

    // When: Three fetches are attempted
    yahoo.fetch(&symbol()).await.expect_err("crumb throttled");
    yahoo.fetch(&symbol()).await.expect_err("crumb throttled");
    let third = yahoo.fetch(&symbol()).await.expect_err("open circuit");

    // Then: Crumb failures counted toward the breaker
    assert_eq!(third.kind(), FetchErrorKind::CircuitOpen);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(http.count("getcrumb"), 2);
}
