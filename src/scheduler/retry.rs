//! In-cycle retry policy for throttled fetches

use crate::source::PriceSnapshot;

/// Phase of the update loop, exposed for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Fetching,
    RetryWait,
    Broadcasting,
    IdleWait,
}

/// What the scheduler should do with a fetch result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Throttled, pause and fetch again within this cycle
    Retry { attempt: u32 },
    /// Throttled too many times, fall back to cached data
    GiveUp,
    /// Not throttled, use the result
    Proceed,
}

/// Counts consecutive rate-limited outcomes within a cycle
///
/// The counter is the only state carried between fetch attempts. It resets on
/// any other outcome and after giving up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retries: 0,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Current retry count
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn on_outcome(&mut self, snapshot: &PriceSnapshot) -> RetryDecision {
        if !snapshot.is_rate_limited() {
            self.retries = 0;
            return RetryDecision::Proceed;
        }

        self.retries += 1;
        if self.retries <= self.max_retries {
            RetryDecision::Retry {
                attempt: self.retries,
            }
        } else {
            self.retries = 0;
            RetryDecision::GiveUp
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
