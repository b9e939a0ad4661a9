use std::collections::BTreeMap;
use std::time::Duration;

use crate::fetcher::{BoxFuture, FetchError, FundamentalsFetcher};
use crate::{FundamentalsSnapshot, Symbol};

/// Offline fetcher producing stable pseudo-random fundamentals per symbol.
///
/// The same symbol always yields the same snapshot, so `--mock` runs and
/// demos are reproducible without network access.
#[derive(Debug, Clone, Default)]
pub struct SeededFetcher {
    failures: BTreeMap<Symbol, FetchError>,
    latency: Option<Duration>,
}

impl SeededFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `symbol` fail with `error` on every fetch.
    pub fn with_failure(mut self, symbol: Symbol, error: FetchError) -> Self {
        self.failures.insert(symbol, error);
        self
    }

    /// Simulated per-fetch latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The snapshot this fetcher reports for `symbol`.
    pub fn snapshot_for(symbol: &Symbol) -> FundamentalsSnapshot {
        let mut rng = fastrand::Rng::with_seed(symbol_seed(symbol));
        let mut metric = |low: f64, high: f64| {
            // Roughly one in ten metrics is missing, as with sparse provider data.
            (rng.u8(0..10) != 0).then(|| round2(low + rng.f64() * (high - low)))
        };

        let market_cap = metric(3.0e8, 6.0e9);
        let pe_ratio = metric(-5.0, 40.0);
        let pb_ratio = metric(0.3, 4.0);
        let debt_to_equity = metric(0.0, 200.0);
        let profit_margin = metric(-0.10, 0.30);

        FundamentalsSnapshot {
            symbol: symbol.clone(),
            market_cap,
            pe_ratio,
            pb_ratio,
            debt_to_equity,
            profit_margin,
            company_name: Some(format!("{symbol} Holdings")),
        }
    }
}

impl FundamentalsFetcher for SeededFetcher {
    fn id(&self) -> &'static str {
        "seeded"
    }

    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, Result<FundamentalsSnapshot, FetchError>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            match self.failures.get(symbol) {
                Some(error) => Err(error.clone()),
                None => Ok(Self::snapshot_for(symbol)),
            }
        })
    }
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(5381_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
