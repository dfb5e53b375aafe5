use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};

/// robots.txt rules stamped with the time they were fetched
#[derive(Debug, Clone)]
pub struct CachedRules {
    pub rules: RobotsRules,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRules {
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Entries older than 24 hours are refetched
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}
