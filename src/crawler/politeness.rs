//! Request pacing, backoff and retry eligibility
//!
//! The policy holds no knowledge of pages or tracks. It only sees throttling
//! signals, successes and failed attempts, and turns them into delays and
//! retry decisions.

use crate::config::{PolitenessConfig, MAX_DELAY_LIMIT_SECS};
use crate::crawler::fetcher::FetchError;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

/// A response that indicates the site wants us to slow down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleSignal {
    /// HTTP 403, 429 or 503
    Status(u16),
    /// A bot-challenge interstitial
    Challenge,
}

/// Pacing state for one download slot
#[derive(Debug, Clone)]
pub struct PolitenessPolicy {
    base_range: [f64; 2],
    throttle_multiplier: f64,
    max_delay: f64,
    recovery_factor: f64,
    max_retries: u32,
    retryable: HashSet<u16>,
    /// Multiplier applied to `base_range`; 1.0 means no backoff
    scale: f64,
    /// Lower bound from a robots.txt `Crawl-delay`, in seconds
    floor: f64,
    throttle_events: u64,
}

impl PolitenessPolicy {
    pub fn new(config: &PolitenessConfig) -> Self {
        Self {
            base_range: config.base_delay_range,
            throttle_multiplier: config.throttle_multiplier,
            max_delay: config.max_delay.min(MAX_DELAY_LIMIT_SECS),
            recovery_factor: config.recovery_factor,
            max_retries: config.max_retries,
            retryable: config.retryable_status_codes.iter().copied().collect(),
            scale: 1.0,
            floor: 0.0,
            throttle_events: 0,
        }
    }

    /// Draws a fresh random delay from the effective range
    pub fn delay_before_next(&self) -> Duration {
        let (low, high) = self.effective_range();
        let seconds = if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        };
        Duration::from_secs_f64(seconds)
    }

    /// The `[low, high]` range, in seconds, the next delay is drawn from
    ///
    /// Both bounds are the base range times the backoff scale, capped at
    /// `max_delay`, then raised to the crawl-delay floor.
    pub fn effective_range(&self) -> (f64, f64) {
        let low = (self.base_range[0] * self.scale).min(self.max_delay);
        let high = (self.base_range[1] * self.scale).min(self.max_delay);
        let low = low.max(self.floor);
        (low, high.max(low))
    }

    /// Widens the delay range after a rate-limit or challenge response
    pub fn on_throttled(&mut self, signal: ThrottleSignal) {
        self.throttle_events += 1;
        self.scale = (self.scale * self.throttle_multiplier).min(self.max_scale());

        let (low, high) = self.effective_range();
        tracing::debug!(
            "Throttled ({:?}); delay range now [{:.1}s, {:.1}s]",
            signal,
            low,
            high
        );
    }

    /// Relaxes the backoff after a successful fetch, never below the base range
    pub fn on_success(&mut self) {
        self.scale = (self.scale * self.recovery_factor).max(1.0);
    }

    /// Whether a task that just failed its `attempt`-th try gets another one
    ///
    /// Attempts are 1-based, so a task gets at most `max_retries + 1` tries.
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        attempt <= self.max_retries && self.is_retryable(error)
    }

    /// Transient conditions: configured status codes, timeouts, and
    /// challenges met by the plain client
    pub fn is_retryable(&self, error: &FetchError) -> bool {
        match error {
            FetchError::Http { code } => self.retryable.contains(code),
            FetchError::Timeout => true,
            FetchError::Challenge { via_bypass } => !via_bypass,
            FetchError::Network(_) | FetchError::Body(_) => false,
        }
    }

    /// Applies a robots.txt `Crawl-delay` as a lower bound on every delay
    pub fn set_crawl_delay_floor(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.floor = seconds.min(self.max_delay);
        }
    }

    pub fn throttle_events(&self) -> u64 {
        self.throttle_events
    }

    fn max_scale(&self) -> f64 {
        if self.base_range[1] > 0.0 {
            (self.max_delay / self.base_range[1]).max(1.0)
        } else {
            1.0
        }
    }
}
