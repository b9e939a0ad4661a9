//! Core contracts for capscreen.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - The configurable scoring rubric and the pure scorer
//! - The fundamentals fetcher contract and its Yahoo / seeded adapters
//! - Bounded concurrent batch evaluation
//! - Layered configuration (defaults, TOML file, environment)

pub mod adapters;
pub mod batch;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod retry;
pub mod rubric;
pub mod scorer;
pub mod throttling;
pub mod universe;

pub use adapters::{CrumbSession, SeededFetcher, YahooFetcher};
pub use batch::{parse_universe, BatchConfig, BatchEvaluator, BatchResult, EvaluationFailure};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{
    BatchSettings, CircuitBreakerSettings, RetrySettings, ScreenerConfig, ThrottleSettings,
};
pub use domain::{FundamentalsSnapshot, Symbol};
pub use error::{BatchError, ConfigError, ValidationError};
pub use fetcher::{BoxFuture, FetchError, FetchErrorKind, FundamentalsFetcher};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use retry::{Backoff, RetryPolicy};
pub use rubric::{BandPosition, CurveOverride, Factor, FactorCurve, RubricConfig, RubricOverrides};
pub use scorer::{format_market_cap, CompositeResult, FactorScore, Scorer};
pub use throttling::FetchThrottle;
pub use universe::{default_universe, DEFAULT_UNIVERSE};
