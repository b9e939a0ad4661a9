use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::fetcher::{BoxFuture, FetchError, FundamentalsFetcher};
use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::retry::RetryPolicy;
use crate::{FundamentalsSnapshot, Symbol};

const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData";
const REFERER: &str = "https://finance.yahoo.com/";
const CRUMB_TTL: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone)]
struct Crumb {
    value: String,
    fetched_at: Instant,
}

/// Cookie + crumb session for Yahoo's `quoteSummary` endpoint.
///
/// Cookies live in the transport's jar; this type only caches the crumb.
/// The async mutex is held across a refresh so concurrent units wait for one
/// crumb request instead of each issuing their own.
#[derive(Debug, Default)]
pub struct CrumbSession {
    crumb: Mutex<Option<Crumb>>,
}

impl CrumbSession {
    /// Current crumb, fetched on first use and after expiry or invalidation.
    pub async fn crumb(&self, http_client: &dyn HttpClient) -> Result<String, FetchError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            if crumb.fetched_at.elapsed() < CRUMB_TTL {
                return Ok(crumb.value.clone());
            }
        }

        let value = fetch_crumb(http_client).await?;
        *cached = Some(Crumb {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.crumb.lock().await = None;
    }
}

async fn fetch_crumb(http_client: &dyn HttpClient) -> Result<String, FetchError> {
    // fc.yahoo.com answers 404 but still sets the session cookie.
    let cookie_request = HttpRequest::get(COOKIE_URL)
        .with_header("referer", REFERER)
        .with_timeout_ms(10_000);
    http_client.execute(cookie_request).await.map_err(|e| {
        FetchError::network(format!("failed to fetch yahoo cookie: {}", e.message()))
    })?;

    for endpoint in CRUMB_URLS {
        let crumb_request = HttpRequest::get(endpoint)
            .with_header("referer", REFERER)
            .with_timeout_ms(10_000);

        let response = match http_client.execute(crumb_request).await {
            Ok(response) => response,
            Err(error) => {
                debug!(endpoint, error = error.message(), "crumb endpoint failed");
                continue;
            }
        };

        let body = response.body.trim();
        if response.status == 429 || body.to_ascii_lowercase().contains("too many requests") {
            return Err(FetchError::rate_limited(
                "yahoo rate limited while fetching crumb",
            ));
        }

        if response.is_success() && is_plausible_crumb(body) {
            debug!(endpoint, "obtained yahoo crumb");
            return Ok(body.to_owned());
        }
    }

    Err(FetchError::network(
        "failed to fetch yahoo crumb from all endpoints",
    ))
}

fn is_plausible_crumb(body: &str) -> bool {
    !body.is_empty()
        && body.len() < 100
        && !body.contains(char::is_whitespace)
        && !body.contains('<')
}

/// Live fundamentals from Yahoo Finance `quoteSummary`.
#[derive(Clone)]
pub struct YahooFetcher {
    http_client: Arc<dyn HttpClient>,
    session: Arc<CrumbSession>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    request_timeout_ms: u64,
}

impl Default for YahooFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooFetcher {
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            session: Arc::new(CrumbSession::default()),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            retry: RetryPolicy::default(),
            request_timeout_ms: 10_000,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    fn summary_request(&self, symbol: &Symbol, crumb: &str) -> HttpRequest {
        let url = format!(
            "{QUOTE_SUMMARY_URL}/{}?modules={}&crumb={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(SUMMARY_MODULES),
            urlencoding::encode(crumb)
        );
        HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_timeout_ms(self.request_timeout_ms)
    }

    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<FundamentalsSnapshot, FetchError> {
        let mut attempt = 0_u32;
        let mut crumb_refreshed = false;

        loop {
            if !self.circuit_breaker.allow_request() {
                return Err(FetchError::circuit_open("yahoo circuit breaker is open"));
            }

            let outcome = match self.session.crumb(self.http_client.as_ref()).await {
                Ok(crumb) => {
                    let request = self.summary_request(symbol, &crumb);
                    Ok(self.http_client.execute(request).await)
                }
                Err(crumb_error) => Err(crumb_error),
            };

            let error = match outcome {
                Ok(Ok(response)) if response.is_success() => {
                    self.circuit_breaker.record_success();
                    return parse_quote_summary(symbol, &response.body);
                }
                Ok(Ok(response)) if response.status == 401 && !crumb_refreshed => {
                    warn!(%symbol, "yahoo rejected crumb, refreshing session");
                    self.session.invalidate().await;
                    crumb_refreshed = true;
                    continue;
                }
                Ok(Ok(response)) if response.status == 401 => {
                    self.circuit_breaker.record_failure();
                    return Err(FetchError::network(
                        "yahoo rejected credentials after crumb refresh (status 401)",
                    ));
                }
                Ok(Ok(response)) if response.status == 404 => {
                    self.circuit_breaker.record_success();
                    return Err(not_found_from_body(symbol, &response.body));
                }
                Ok(Ok(response)) => {
                    if response.status == 429 || response.is_server_error() {
                        self.circuit_breaker.record_failure();
                    }
                    status_error(&response, &self.retry)
                }
                Ok(Err(transport)) => {
                    self.circuit_breaker.record_failure();
                    transport_error(&transport)
                }
                // Crumb failures are upstream failures too: retried and counted.
                Err(crumb_error) => {
                    self.circuit_breaker.record_failure();
                    crumb_error
                }
            };

            if !error.retryable() || attempt >= self.retry.max_retries {
                return Err(error);
            }

            let delay = self.retry.delay_for_attempt(attempt);
            debug!(
                %symbol,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                code = error.code(),
                "retrying yahoo fetch"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl FundamentalsFetcher for YahooFetcher {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, Result<FundamentalsSnapshot, FetchError>> {
        Box::pin(self.fetch_snapshot(symbol))
    }
}

fn transport_error(transport: &HttpError) -> FetchError {
    if transport.is_timeout() {
        FetchError::timeout(format!("yahoo request timed out: {}", transport.message()))
    } else {
        FetchError::network(format!("yahoo transport error: {}", transport.message()))
    }
}

fn status_error(response: &HttpResponse, retry: &RetryPolicy) -> FetchError {
    let status = response.status;
    if status == 429 {
        return FetchError::rate_limited("rate limited by yahoo (status 429)");
    }
    if retry.should_retry_status(status) {
        return FetchError::network(format!("yahoo returned status {status}"));
    }
    FetchError::malformed(format!("yahoo returned unexpected status {status}"))
}

fn not_found_from_body(symbol: &Symbol, body: &str) -> FetchError {
    let description = serde_json::from_str::<YahooQuoteSummaryResponse>(body)
        .ok()
        .and_then(|response| response.quote_summary.error)
        .and_then(|error| error.description);

    match description {
        Some(description) if !description.trim().is_empty() => FetchError::not_found(description),
        _ => FetchError::not_found(format!("no fundamentals found for {symbol}")),
    }
}

/// Maps a `quoteSummary` body onto a snapshot. Absent `raw` values stay absent.
pub(crate) fn parse_quote_summary(
    symbol: &Symbol,
    body: &str,
) -> Result<FundamentalsSnapshot, FetchError> {
    let response: YahooQuoteSummaryResponse = serde_json::from_str(body).map_err(|e| {
        FetchError::malformed(format!("failed to parse yahoo fundamentals: {e}"))
    })?;

    if let Some(error) = response.quote_summary.error {
        let description = error
            .description
            .or(error.code)
            .unwrap_or_else(|| String::from("unknown error"));
        return Err(FetchError::not_found(format!(
            "yahoo fundamentals API error: {description}"
        )));
    }

    let result = response
        .quote_summary
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::not_found(format!("no fundamentals returned for {symbol}")))?;

    let price = result.price.unwrap_or_default();
    let detail = result.summary_detail.unwrap_or_default();
    let stats = result.default_key_statistics.unwrap_or_default();
    let financial = result.financial_data.unwrap_or_default();

    let market_cap = raw(&price.market_cap).or_else(|| raw(&detail.market_cap));
    let pe_ratio = raw(&detail.forward_pe)
        .or_else(|| raw(&stats.forward_pe))
        .or_else(|| raw(&detail.trailing_pe));
    let pb_ratio = raw(&stats.price_to_book);
    let debt_to_equity = raw(&financial.debt_to_equity);
    let profit_margin = raw(&financial.profit_margins).or_else(|| raw(&stats.profit_margins));

    let snapshot = FundamentalsSnapshot::new(
        symbol.clone(),
        non_negative(symbol, "market_cap", market_cap),
        pe_ratio,
        pb_ratio,
        non_negative(symbol, "debt_to_equity", debt_to_equity),
        profit_margin,
    )
    .map_err(|e| FetchError::malformed(format!("invalid yahoo fundamentals for {symbol}: {e}")))?;

    let name = price.long_name.or(price.short_name);
    Ok(match name {
        Some(name) => snapshot.with_company_name(name),
        None => snapshot,
    })
}

fn raw(value: &Option<YahooRawValue>) -> Option<f64> {
    value
        .as_ref()
        .and_then(|value| value.raw)
        .filter(|value| value.is_finite())
}

fn non_negative(symbol: &Symbol, field: &'static str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v < 0.0 => {
            debug!(%symbol, field, value = v, "dropping negative value reported by yahoo");
            None
        }
        other => other,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: YahooQuoteSummaryData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryData {
    #[serde(default)]
    result: Option<Vec<YahooQuoteSummaryResult>>,
    #[serde(default)]
    error: Option<YahooSummaryError>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooSummaryError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteSummaryResult {
    #[serde(default)]
    price: Option<YahooPriceModule>,
    #[serde(default)]
    summary_detail: Option<YahooSummaryDetailModule>,
    #[serde(default)]
    default_key_statistics: Option<YahooKeyStatisticsModule>,
    #[serde(default)]
    financial_data: Option<YahooFinancialDataModule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooPriceModule {
    #[serde(default)]
    market_cap: Option<YahooRawValue>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YahooSummaryDetailModule {
    #[serde(rename = "marketCap", default)]
    market_cap: Option<YahooRawValue>,
    #[serde(rename = "forwardPE", default)]
    forward_pe: Option<YahooRawValue>,
    #[serde(rename = "trailingPE", default)]
    trailing_pe: Option<YahooRawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YahooKeyStatisticsModule {
    #[serde(rename = "forwardPE", default)]
    forward_pe: Option<YahooRawValue>,
    #[serde(rename = "priceToBook", default)]
    price_to_book: Option<YahooRawValue>,
    #[serde(rename = "profitMargins", default)]
    profit_margins: Option<YahooRawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooFinancialDataModule {
    #[serde(default)]
    debt_to_equity: Option<YahooRawValue>,
    #[serde(default)]
    profit_margins: Option<YahooRawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`; an empty object means no value.
#[derive(Debug, Clone, Deserialize)]
struct YahooRawValue {
    #[serde(default)]
    raw: Option<f64>,
}
