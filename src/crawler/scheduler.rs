//! Per-domain dispatch gating
//!
//! This module handles:
//! - Per-domain concurrency limits via semaphores
//! - The randomized politeness delay before each fetch
//! - Per-domain backoff state fed by throttling signals
//! - Integrating robots.txt crawl delays
//!
//! The delay is the only intentional throttle point in the crawl. A worker
//! holds its domain permit across the delay and the fetch, so with one permit
//! per domain the site never sees overlapping requests.

use crate::config::PolitenessConfig;
use crate::crawler::fetcher::FetchError;
use crate::crawler::politeness::{PolitenessPolicy, ThrottleSignal};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Dispatch state for one domain
struct DomainSlot {
    permits: Arc<Semaphore>,
    policy: PolitenessPolicy,
}

/// A granted dispatch; the domain slot is released on drop
pub struct ScheduledFetch {
    _permit: OwnedSemaphorePermit,
}

/// Gates fetches per domain
pub struct Scheduler {
    politeness: PolitenessConfig,
    per_domain: usize,
    slots: Mutex<HashMap<String, DomainSlot>>,
}

impl Scheduler {
    pub fn new(politeness: PolitenessConfig, concurrent_requests_per_domain: u32) -> Self {
        Self {
            politeness,
            per_domain: concurrent_requests_per_domain.max(1) as usize,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, DomainSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_slot<T>(&self, domain: &str, f: impl FnOnce(&mut DomainSlot) -> T) -> T {
        let mut slots = self.slots();
        let slot = slots.entry(domain.to_string()).or_insert_with(|| DomainSlot {
            permits: Arc::new(Semaphore::new(self.per_domain)),
            policy: PolitenessPolicy::new(&self.politeness),
        });
        f(slot)
    }

    /// Waits for a free slot on the domain, then for the politeness delay
    ///
    /// Returns None if the stop signal fires first.
    pub async fn gate(&self, domain: &str, cancel: &CancellationToken) -> Option<ScheduledFetch> {
        let permits = self.with_slot(domain, |slot| slot.permits.clone());

        let permit = tokio::select! {
            _ = cancel.cancelled() => return None,
            permit = permits.acquire_owned() => permit.ok()?,
        };

        let delay = self.with_slot(domain, |slot| slot.policy.delay_before_next());
        if !delay.is_zero() {
            tracing::debug!("Sleeping {:.2}s before next request to {}", delay.as_secs_f64(), domain);
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Some(ScheduledFetch { _permit: permit })
    }

    pub fn on_throttled(&self, domain: &str, signal: ThrottleSignal) {
        self.with_slot(domain, |slot| slot.policy.on_throttled(signal));
    }

    pub fn on_success(&self, domain: &str) {
        self.with_slot(domain, |slot| slot.policy.on_success());
    }

    pub fn should_retry(&self, domain: &str, attempt: u32, error: &FetchError) -> bool {
        self.with_slot(domain, |slot| slot.policy.should_retry(attempt, error))
    }

    /// Applies a robots.txt `Crawl-delay` to the domain
    pub fn set_crawl_delay(&self, domain: &str, seconds: f64) {
        self.with_slot(domain, |slot| slot.policy.set_crawl_delay_floor(seconds));
    }

    /// Current `[low, high]` delay range for a domain, in seconds
    pub fn delay_range(&self, domain: &str) -> (f64, f64) {
        self.with_slot(domain, |slot| slot.policy.effective_range())
    }

    /// Throttle signals seen across all domains
    pub fn throttle_events(&self) -> u64 {
        self.slots()
            .values()
            .map(|slot| slot.policy.throttle_events())
            .sum()
    }
}
