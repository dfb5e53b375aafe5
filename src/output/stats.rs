//! Run statistics
//!
//! Counters are accumulated by the coordinator while the crawl runs and
//! frozen into a [`CrawlSummary`] at the end.

use crate::crawler::Expansion;
use crate::model::Direction;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Why a dispatched task was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Retries exhausted or a non-retryable fetch error
    TerminalFetch,
    /// Challenge page that could not be bypassed
    Challenge,
    /// The page did not have the expected shape
    Extraction,
    /// Disallowed by robots.txt
    RobotsDenied,
    /// The emitter rejected a record from the page
    Emit,
    /// The stop signal fired while the task was waiting on a retry
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminalFetch => "terminal_fetch",
            Self::Challenge => "challenge",
            Self::Extraction => "extraction",
            Self::RobotsDenied => "robots_denied",
            Self::Emit => "emit",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the crawl loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing left to fetch
    Exhausted,
    /// `max-requests` reached
    RequestBudget,
    /// `max-duration-secs` reached
    TimeBudget,
    /// Operator abort
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Exhausted => "frontier exhausted",
            Self::RequestBudget => "request budget reached",
            Self::TimeBudget => "time budget reached",
            Self::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub tasks_processed: u64,
    pub tracks_emitted: u64,
    pub edges_forward: u64,
    pub edges_reverse: u64,
    /// Edges found again after their first emission
    pub duplicate_edges: u64,
    pub see_all_samples: u64,
    pub see_all_sampled: u64,
    pub tasks_admitted: u64,
    pub duplicate_links: u64,
    pub depth_limited: u64,
    pub pagination_limited: u64,
    pub inline_suppressed: u64,
    /// Fetch attempts that failed and were retried
    pub transient_errors: u64,
    pub throttle_events: u64,
    pub failures: BTreeMap<FailureKind, u64>,
}

impl CrawlStats {
    pub fn record_failure(&mut self, kind: FailureKind) {
        *self.failures.entry(kind).or_insert(0) += 1;
    }

    pub fn record_edge(&mut self, direction: Direction) {
        match direction {
            Direction::Forward => self.edges_forward += 1,
            Direction::Reverse => self.edges_reverse += 1,
        }
    }

    /// Folds one page's expansion outcome into the totals
    pub fn record_expansion(&mut self, expansion: &Expansion) {
        self.tasks_admitted += expansion.admitted as u64;
        self.duplicate_links += expansion.duplicates as u64;
        self.depth_limited += expansion.depth_limited as u64;
        self.pagination_limited += expansion.pagination_limited as u64;
        self.inline_suppressed += expansion.inline_suppressed as u64;
        self.see_all_samples += u64::from(expansion.see_all_samples);
        self.see_all_sampled += u64::from(expansion.see_all_sampled);
    }

    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges_forward + self.edges_reverse
    }
}

/// Final report of a crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub stats: CrawlStats,
}

impl CrawlSummary {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

/// Prints the run summary to stdout
pub fn print_statistics(summary: &CrawlSummary) {
    let stats = &summary.stats;

    println!("=== Crawl Statistics ===\n");
    println!("Stopped: {} after {}s", summary.stop_reason, summary.duration_seconds());
    println!("Config hash: {}", summary.config_hash);
    println!();

    println!("Overview:");
    println!("  Tasks processed: {}", stats.tasks_processed);
    println!("  Tracks emitted: {}", stats.tracks_emitted);
    println!(
        "  Edges found: {} ({} forward, {} reverse)",
        stats.total_edges(),
        stats.edges_forward,
        stats.edges_reverse
    );
    println!(
        "  \"See all\" links: {} samples, {} sampled",
        stats.see_all_samples, stats.see_all_sampled
    );
    println!();

    println!("Frontier:");
    println!("  Tasks admitted: {}", stats.tasks_admitted);
    println!("  Duplicate links: {}", stats.duplicate_links);
    println!("  Depth limited: {}", stats.depth_limited);
    println!("  Pagination limited: {}", stats.pagination_limited);
    println!("  Inline lists skipped: {}", stats.inline_suppressed);
    println!();

    println!("Politeness:");
    println!("  Throttle events: {}", stats.throttle_events);
    println!("  Retried errors: {}", stats.transient_errors);
    println!();

    if !stats.failures.is_empty() {
        println!("Dropped Tasks:");
        for (kind, count) in &stats.failures {
            println!("  {}: {}", kind, count);
        }
    }
}
