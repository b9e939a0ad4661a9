use std::path::PathBuf;

use thiserror::Error;

use crate::Factor;

/// Validation and contract errors exposed by `capscreen-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("rubric factor '{factor}': max_points must be within 0..=20")]
    FactorWeightOutOfRange { factor: Factor },
    #[error("rubric factor '{factor}': curve values must be finite")]
    FactorCurveNotFinite { factor: Factor },
    #[error("rubric factor '{factor}': {detail}")]
    FactorCurveOrder { factor: Factor, detail: &'static str },
}

/// Caller-contract violations rejected before any fetch is dispatched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("symbol list must contain at least one symbol")]
    EmptyUniverse,

    #[error("invalid symbol at position {position}: {source}")]
    InvalidSymbol {
        position: usize,
        #[source]
        source: ValidationError,
    },

    #[error("duplicate symbol '{symbol}' at position {position}")]
    DuplicateSymbol { symbol: String, position: usize },

    #[error("max_concurrency must be greater than zero")]
    ZeroConcurrency,
}

impl BatchError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyUniverse => "batch.empty_universe",
            Self::InvalidSymbol { .. } => "batch.invalid_symbol",
            Self::DuplicateSymbol { .. } => "batch.duplicate_symbol",
            Self::ZeroConcurrency => "batch.zero_concurrency",
        }
    }

    /// True for problems with the caller's symbol list rather than the evaluator setup.
    pub const fn is_invalid_input(&self) -> bool {
        !matches!(self, Self::ZeroConcurrency)
    }
}

/// Errors raised while loading screener configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid rubric: {0}")]
    Rubric(#[from] ValidationError),

    #[error("environment override {name}='{value}' is not a valid number")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid config value for '{field}': {detail}")]
    InvalidValue {
        field: &'static str,
        detail: &'static str,
    },
}
