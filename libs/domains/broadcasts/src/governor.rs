//! Send-rate pacing for one invocation.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Token bucket with burst 1: the first permit of each interval resolves
/// immediately, every later one waits its turn, so a batch of N sends is
/// bounded below by (N-1)/rate wall-clock seconds. Cloning shares the
/// bucket, which is what bounded concurrent dispatch waves rely on.
#[derive(Clone)]
pub struct RateGovernor {
    limiter: Arc<DefaultDirectRateLimiter>,
    rate: u32,
}

impl RateGovernor {
    /// A zero rate is clamped to one message per second.
    pub fn new(messages_per_second: u32) -> Self {
        let rate = NonZeroU32::new(messages_per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            rate: rate.get(),
        }
    }

    /// Wait until the next send permit is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn messages_per_second(&self) -> u32 {
        self.rate
    }
}
