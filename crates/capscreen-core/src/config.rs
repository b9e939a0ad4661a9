//! Screener configuration.
//!
//! Settings resolve in layers: built-in defaults, then an optional TOML file,
//! then `CAPSCREEN_*` environment variables. CLI flags are applied last by
//! the caller.
//!
//! ```toml
//! universe = ["AAON", "ABCB"]
//!
//! [batch]
//! max_concurrency = 5
//! unit_timeout_ms = 10000
//! batch_timeout_ms = 60000
//!
//! [throttle]
//! quota_limit = 60
//! quota_window_secs = 60
//!
//! [rubric.market_cap]
//! upper_zero = 4e9
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::{parse_universe, BatchConfig, DEFAULT_MAX_CONCURRENCY};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryPolicy;
use crate::rubric::RubricOverrides;
use crate::throttling::FetchThrottle;
use crate::universe::default_universe;
use crate::{ConfigError, RubricConfig};

pub const ENV_MAX_CONCURRENCY: &str = "CAPSCREEN_MAX_CONCURRENCY";
pub const ENV_BATCH_TIMEOUT_MS: &str = "CAPSCREEN_BATCH_TIMEOUT_MS";
pub const ENV_QUOTA_LIMIT: &str = "CAPSCREEN_QUOTA_LIMIT";

/// `[batch]`; a timeout of `0` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSettings {
    pub max_concurrency: usize,
    pub unit_timeout_ms: u64,
    pub batch_timeout_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            unit_timeout_ms: 10_000,
            batch_timeout_ms: 60_000,
        }
    }
}

/// `[throttle]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottleSettings {
    pub enabled: bool,
    pub quota_limit: u32,
    pub quota_window_secs: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quota_limit: 60,
            quota_window_secs: 60,
        }
    }
}

/// `[retry]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
            jitter: true,
        }
    }
}

/// `[circuit_breaker]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    universe: Option<Vec<String>>,
    batch: BatchSettings,
    throttle: ThrottleSettings,
    retry: RetrySettings,
    circuit_breaker: CircuitBreakerSettings,
    rubric: RubricOverrides,
}

/// Fully resolved screener settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenerConfig {
    pub universe: Vec<String>,
    pub batch: BatchSettings,
    pub throttle: ThrottleSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub rubric: RubricConfig,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            universe: default_universe(),
            batch: BatchSettings::default(),
            throttle: ThrottleSettings::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            rubric: RubricConfig::default(),
        }
    }
}

impl ScreenerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        let config = Self {
            universe: file.universe.unwrap_or_else(default_universe),
            batch: file.batch,
            throttle: file.throttle,
            retry: file.retry,
            circuit_breaker: file.circuit_breaker,
            rubric: RubricConfig::default().with_overrides(file.rubric)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Applies `CAPSCREEN_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies `CAPSCREEN_*` overrides from an arbitrary lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env_number(&lookup, ENV_MAX_CONCURRENCY)? {
            self.batch.max_concurrency = value;
        }
        if let Some(value) = env_number(&lookup, ENV_BATCH_TIMEOUT_MS)? {
            self.batch.batch_timeout_ms = value;
        }
        if let Some(value) = env_number(&lookup, ENV_QUOTA_LIMIT)? {
            self.throttle.quota_limit = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, detail| Err(ConfigError::InvalidValue { field, detail });

        if self.batch.max_concurrency == 0 {
            return invalid("batch.max_concurrency", "must be greater than zero");
        }
        if self.throttle.quota_limit == 0 {
            return invalid("throttle.quota_limit", "must be greater than zero");
        }
        if self.throttle.quota_window_secs == 0 {
            return invalid("throttle.quota_window_secs", "must be greater than zero");
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return invalid("retry.max_delay_ms", "must not be below retry.base_delay_ms");
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return invalid("circuit_breaker.failure_threshold", "must be greater than zero");
        }
        if parse_universe(&self.universe).is_err() {
            return invalid("universe", "must be a non-empty list of unique, valid symbols");
        }
        self.rubric.validate()?;
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_concurrency: self.batch.max_concurrency,
            unit_timeout: millis(self.batch.unit_timeout_ms),
            batch_timeout: millis(self.batch.batch_timeout_ms),
        }
    }

    pub fn throttle(&self) -> Option<FetchThrottle> {
        self.throttle.enabled.then(|| {
            FetchThrottle::new(
                Duration::from_secs(self.throttle.quota_window_secs),
                self.throttle.quota_limit,
            )
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
            self.retry.jitter,
        )
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            open_timeout: Duration::from_secs(self.circuit_breaker.open_timeout_secs),
        }
    }
}

fn millis(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}

fn env_number<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}
