//! Fundamentals fetcher contract.
//!
//! A [`FundamentalsFetcher`] turns one [`Symbol`] into one
//! [`FundamentalsSnapshot`] or a [`FetchError`]. Fetch errors are per-symbol
//! conditions: the batch evaluator records them as failures and moves on.
//!
//! | Kind | Code | Retryable |
//! |------|------|-----------|
//! | [`NotFound`](FetchErrorKind::NotFound) | `fetch.not_found` | no |
//! | [`Network`](FetchErrorKind::Network) | `fetch.network` | yes |
//! | [`Timeout`](FetchErrorKind::Timeout) | `fetch.timeout` | yes |
//! | [`RateLimited`](FetchErrorKind::RateLimited) | `fetch.rate_limited` | yes |
//! | [`Malformed`](FetchErrorKind::Malformed) | `fetch.malformed` | no |
//! | [`CircuitOpen`](FetchErrorKind::CircuitOpen) | `fetch.circuit_open` | no |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{FundamentalsSnapshot, Symbol};

/// Boxed future returned by fetchers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetch-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NotFound,
    Network,
    Timeout,
    RateLimited,
    Malformed,
    CircuitOpen,
}

/// Data for one symbol could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retryable: bool,
}

impl FetchError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message, false)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message, true)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message, true)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message, true)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Malformed, message, false)
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::CircuitOpen, message, false)
    }

    fn new(kind: FetchErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("{} error", kind_label(kind))
        } else {
            message
        };
        Self {
            kind,
            message,
            retryable,
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Human-readable reason; never empty.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::Network => "fetch.network",
            FetchErrorKind::Timeout => "fetch.timeout",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::Malformed => "fetch.malformed",
            FetchErrorKind::CircuitOpen => "fetch.circuit_open",
        }
    }
}

const fn kind_label(kind: FetchErrorKind) -> &'static str {
    match kind {
        FetchErrorKind::NotFound => "not found",
        FetchErrorKind::Network => "network",
        FetchErrorKind::Timeout => "timeout",
        FetchErrorKind::RateLimited => "rate limited",
        FetchErrorKind::Malformed => "malformed response",
        FetchErrorKind::CircuitOpen => "circuit open",
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Source of fundamentals snapshots.
///
/// Implementations are shared by every concurrent batch unit and must be
/// `Send + Sync`.
pub trait FundamentalsFetcher: Send + Sync {
    /// Stable identifier used in logs and report metadata.
    fn id(&self) -> &'static str;

    /// Fetches the current fundamentals for one symbol.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the provider cannot produce a snapshot:
    /// unknown symbol, transport failure, throttling, or an unparseable body.
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, Result<FundamentalsSnapshot, FetchError>>;
}
