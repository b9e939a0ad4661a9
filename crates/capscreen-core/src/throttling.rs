use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared request budget that paces fetch calls across all batch units.
#[derive(Clone)]
pub struct FetchThrottle {
    limiter: Arc<DirectRateLimiter>,
    quota_limit: u32,
    quota_window: Duration,
}

impl std::fmt::Debug for FetchThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchThrottle")
            .field("quota_limit", &self.quota_limit)
            .field("quota_window", &self.quota_window)
            .finish()
    }
}

impl FetchThrottle {
    /// At most `quota_limit` calls per `quota_window`, bursting up to the limit.
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let quota_limit = quota_limit.max(1);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
            quota_limit,
            quota_window,
        }
    }

    /// Non-blocking check; `false` means the budget is spent right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Waits until a cell of budget is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub const fn quota_limit(&self) -> u32 {
        self.quota_limit
    }

    pub const fn quota_window(&self) -> Duration {
        self.quota_window
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
