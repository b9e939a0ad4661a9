//! Concurrent batch evaluation.
//!
//! [`BatchEvaluator::evaluate_all`] validates the whole symbol list, then runs
//! one fetch-and-score unit per symbol on a tokio [`JoinSet`]. A [`Semaphore`]
//! bounds how many units fetch at once. Units are isolated: a failed fetch,
//! a unit timeout or a panic becomes an [`EvaluationFailure`] for that symbol
//! and never affects the others.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::fetcher::{FetchError, FundamentalsFetcher};
use crate::throttling::FetchThrottle;
use crate::{BatchError, CompositeResult, Scorer, Symbol};

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Worker pool bounds and deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_concurrency: usize,
    /// Limit on a single fetch once its unit holds a worker slot.
    pub unit_timeout: Option<Duration>,
    /// Limit on the whole call; outstanding units are aborted when it passes.
    pub batch_timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            unit_timeout: Some(Duration::from_secs(10)),
            batch_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// A symbol that could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub symbol: Symbol,
    pub reason: String,
    pub code: String,
}

impl EvaluationFailure {
    pub fn from_fetch_error(symbol: Symbol, error: &FetchError) -> Self {
        Self {
            symbol,
            reason: error.message().to_owned(),
            code: error.code().to_owned(),
        }
    }

    fn batch_timeout(symbol: Symbol, limit: Duration) -> Self {
        Self {
            symbol,
            reason: format!("batch deadline of {} ms exceeded", limit.as_millis()),
            code: String::from("batch.timeout"),
        }
    }

    fn unit_aborted(symbol: Symbol, reason: &str) -> Self {
        Self {
            symbol,
            reason: reason.to_owned(),
            code: String::from("batch.unit_aborted"),
        }
    }
}

/// Outcome of one evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Highest score first; equal scores ordered by symbol.
    pub ranked: Vec<CompositeResult>,
    /// Ordered by symbol.
    pub failures: Vec<EvaluationFailure>,
}

impl BatchResult {
    /// Number of symbols that reached a terminal state.
    pub fn evaluated(&self) -> usize {
        self.ranked.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn result_for(&self, symbol: &str) -> Option<&CompositeResult> {
        self.ranked
            .iter()
            .find(|result| result.symbol.as_str().eq_ignore_ascii_case(symbol.trim()))
    }

    pub fn failure_reason(&self, symbol: &str) -> Option<&str> {
        self.failures
            .iter()
            .find(|failure| failure.symbol.as_str().eq_ignore_ascii_case(symbol.trim()))
            .map(|failure| failure.reason.as_str())
    }

    /// Failures as a symbol -> reason mapping.
    pub fn failures_by_symbol(&self) -> BTreeMap<&str, &str> {
        self.failures
            .iter()
            .map(|failure| (failure.symbol.as_str(), failure.reason.as_str()))
            .collect()
    }
}

type UnitOutput = (Symbol, Result<CompositeResult, EvaluationFailure>);

/// Bounded concurrent fetch-and-score over a list of symbols.
///
/// Holds no per-call state; the same evaluator can run any number of cycles.
pub struct BatchEvaluator {
    fetcher: Arc<dyn FundamentalsFetcher>,
    scorer: Arc<Scorer>,
    config: BatchConfig,
    throttle: Option<FetchThrottle>,
}

impl BatchEvaluator {
    pub fn new(fetcher: Arc<dyn FundamentalsFetcher>, scorer: Scorer, config: BatchConfig) -> Self {
        Self {
            fetcher,
            scorer: Arc::new(scorer),
            config,
            throttle: None,
        }
    }

    pub fn with_throttle(mut self, throttle: FetchThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn fetcher_id(&self) -> &'static str {
        self.fetcher.id()
    }

    /// Fetches and scores every symbol, waiting until each one is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] without dispatching any fetch when the list is
    /// empty, holds an invalid or duplicate symbol, or when the evaluator was
    /// configured with zero concurrency. Per-symbol problems never fail the
    /// call; they are reported in [`BatchResult::failures`].
    pub async fn evaluate_all<S: AsRef<str>>(
        &self,
        symbols: &[S],
    ) -> Result<BatchResult, BatchError> {
        if self.config.max_concurrency == 0 {
            return Err(BatchError::ZeroConcurrency);
        }
        let symbols = parse_universe(symbols)?;
        let requested = symbols.len();
        let started = Instant::now();

        let permits = self.config.max_concurrency.min(Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut units: JoinSet<UnitOutput> = JoinSet::new();
        let mut unit_symbols = HashMap::with_capacity(requested);

        for symbol in symbols {
            let unit = run_unit(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.scorer),
                self.throttle.clone(),
                Arc::clone(&semaphore),
                self.config.unit_timeout,
                symbol.clone(),
            );
            let handle = units.spawn(unit);
            unit_symbols.insert(handle.id(), symbol);
        }

        let deadline = self
            .config
            .batch_timeout
            .map(|limit| (tokio::time::Instant::now() + limit, limit));
        let mut timed_out = false;
        let mut result = BatchResult::default();

        loop {
            let joined = match deadline {
                Some((at, _)) if !timed_out => {
                    match tokio::time::timeout_at(at, units.join_next()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!(
                                outstanding = units.len(),
                                "batch deadline reached, aborting outstanding units"
                            );
                            timed_out = true;
                            units.abort_all();
                            continue;
                        }
                    }
                }
                _ => units.join_next().await,
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((symbol, Ok(scored))) => {
                    debug!(%symbol, total_score = scored.total_score, "scored symbol");
                    result.ranked.push(scored);
                }
                Ok((symbol, Err(failure))) => {
                    warn!(%symbol, code = %failure.code, reason = %failure.reason, "fetch failed");
                    result.failures.push(failure);
                }
                Err(join_error) => {
                    let Some(symbol) = unit_symbols.remove(&join_error.id()) else {
                        continue;
                    };
                    let failure = match deadline {
                        Some((_, limit)) if join_error.is_cancelled() => {
                            EvaluationFailure::batch_timeout(symbol, limit)
                        }
                        _ => EvaluationFailure::unit_aborted(symbol, "evaluation unit panicked"),
                    };
                    warn!(
                        symbol = %failure.symbol,
                        code = %failure.code,
                        "evaluation unit did not finish"
                    );
                    result.failures.push(failure);
                }
            }
        }

        result.ranked.sort_by(|left, right| {
            right
                .total_score
                .total_cmp(&left.total_score)
                .then_with(|| left.symbol.cmp(&right.symbol))
        });
        result
            .failures
            .sort_by(|left, right| left.symbol.cmp(&right.symbol));

        info!(
            fetcher = self.fetcher.id(),
            requested,
            scored = result.ranked.len(),
            failed = result.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch evaluation finished"
        );

        Ok(result)
    }
}

/// Normalizes a caller's symbol list, rejecting empty, invalid and duplicate input.
pub fn parse_universe<S: AsRef<str>>(symbols: &[S]) -> Result<Vec<Symbol>, BatchError> {
    if symbols.is_empty() {
        return Err(BatchError::EmptyUniverse);
    }

    let mut seen = HashSet::with_capacity(symbols.len());
    let mut parsed = Vec::with_capacity(symbols.len());
    for (position, raw) in symbols.iter().enumerate() {
        let symbol = Symbol::parse(raw.as_ref())
            .map_err(|source| BatchError::InvalidSymbol { position, source })?;
        if !seen.insert(symbol.clone()) {
            return Err(BatchError::DuplicateSymbol {
                symbol: symbol.to_string(),
                position,
            });
        }
        parsed.push(symbol);
    }
    Ok(parsed)
}

async fn run_unit(
    fetcher: Arc<dyn FundamentalsFetcher>,
    scorer: Arc<Scorer>,
    throttle: Option<FetchThrottle>,
    semaphore: Arc<Semaphore>,
    unit_timeout: Option<Duration>,
    symbol: Symbol,
) -> UnitOutput {
    // The semaphore is local to one `evaluate_all` call and never closed.
    let Ok(_permit) = semaphore.acquire_owned().await else {
        let failure = EvaluationFailure::unit_aborted(symbol.clone(), "worker pool closed");
        return (symbol, Err(failure));
    };

    if let Some(throttle) = &throttle {
        throttle.acquire().await;
    }

    let fetched = match unit_timeout {
        Some(limit) => tokio::time::timeout(limit, fetcher.fetch(&symbol))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::timeout(format!(
                    "fetch exceeded {} ms",
                    limit.as_millis()
                )))
            }),
        None => fetcher.fetch(&symbol).await,
    };

    let outcome = fetched.and_then(|snapshot| {
        if snapshot.symbol == symbol {
            Ok(scorer.score(&snapshot))
        } else {
            Err(FetchError::malformed(format!(
                "fetcher returned data for {} instead of {symbol}",
                snapshot.symbol
            )))
        }
    });

    let outcome =
        outcome.map_err(|error| EvaluationFailure::from_fetch_error(symbol.clone(), &error));
    (symbol, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;

    #[test]
    fn rejects_empty_list() {
        let symbols: [&str; 0] = [];
        assert_eq!(parse_universe(&symbols), Err(BatchError::EmptyUniverse));
    }

    #[test]
    fn rejects_duplicates_after_normalization() {
        let err = parse_universe(&["ABG", "abm", " abg "]).expect_err("duplicate");
        assert_eq!(
            err,
            BatchError::DuplicateSymbol {
                symbol: String::from("ABG"),
                position: 2
            }
        );
        assert!(err.is_invalid_input());
    }

    #[test]
    fn reports_position_of_invalid_symbol() {
        let err = parse_universe(&["AF", ""]).expect_err("invalid");
        assert_eq!(
            err,
            BatchError::InvalidSymbol {
                position: 1,
                source: ValidationError::EmptySymbol
            }
        );
    }

    #[test]
    fn failure_accessors_are_case_insensitive() {
        let result = BatchResult {
            ranked: Vec::new(),
            failures: vec![EvaluationFailure {
                symbol: Symbol::parse("CCC").expect("valid"),
                reason: String::from("rate limited"),
                code: String::from("fetch.rate_limited"),
            }],
        };

        assert_eq!(result.failure_reason("ccc"), Some("rate limited"));
        assert_eq!(result.failures_by_symbol().get("CCC"), Some(&"rate limited"));
        assert_eq!(result.evaluated(), 1);
        assert!(!result.is_complete());
    }
}
