//! Robots.txt handling module
//!
//! robots.txt is fetched through the crawler's own [`Fetcher`] once per host
//! and cached for 24 hours. A missing or unreachable file allows everything.

mod cache;
mod rules;

pub use cache::CachedRules;
pub use rules::RobotsRules;

use crate::crawler::Fetcher;
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::{Position, Url};

/// Result of a robots.txt check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotsVerdict {
    pub allowed: bool,
    /// `Crawl-delay` declared for our agent, in seconds
    pub crawl_delay: Option<f64>,
}

/// Per-host robots.txt cache and permission check
pub struct RobotsGate {
    agent: String,
    enabled: bool,
    entries: Mutex<HashMap<String, CachedRules>>,
}

impl RobotsGate {
    pub fn new(agent: impl Into<String>, enabled: bool) -> Self {
        Self {
            agent: agent.into(),
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a URL, fetching its host's robots.txt on first use
    pub async fn check(&self, url: &Url, fetcher: &Fetcher) -> RobotsVerdict {
        if !self.enabled {
            return RobotsVerdict {
                allowed: true,
                crawl_delay: None,
            };
        }

        let origin = url[..Position::BeforePath].to_string();

        let cached = {
            let entries = self.entries.lock().await;
            entries
                .get(&origin)
                .filter(|entry| !entry.is_stale())
                .map(|entry| entry.rules.clone())
        };

        let rules = match cached {
            Some(rules) => rules,
            None => {
                let rules = self.fetch_rules(url, fetcher).await;
                self.entries
                    .lock()
                    .await
                    .insert(origin, CachedRules::new(rules.clone()));
                rules
            }
        };

        RobotsVerdict {
            allowed: rules.allows(url),
            crawl_delay: rules.crawl_delay(),
        }
    }

    async fn fetch_rules(&self, url: &Url, fetcher: &Fetcher) -> RobotsRules {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return RobotsRules::permissive(&self.agent);
        };

        match fetcher.fetch_url(&robots_url).await {
            Ok(document) => {
                tracing::debug!("Fetched {}", robots_url);
                RobotsRules::parse(&document.body, &self.agent)
            }
            Err(e) => {
                tracing::debug!("No usable robots.txt at {} ({}); allowing all", robots_url, e);
                RobotsRules::permissive(&self.agent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchError, FetchRequest, RawResponse, Transport};
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RobotsStub {
        status: u16,
        body: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for RobotsStub {
        async fn execute(&self, request: &FetchRequest) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawResponse {
                final_url: request.url.clone(),
                status: self.status,
                headers: HeaderMap::new(),
                body: self.body.to_string(),
            })
        }
    }

    fn fetcher(stub: Arc<RobotsStub>) -> Fetcher {
        Fetcher::new(vec![], stub, None, vec![])
    }

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://www.example.com{}", path)).unwrap()
    }

    #[tokio::test]
    async fn test_disallowed_path() {
        let stub = Arc::new(RobotsStub {
            status: 200,
            body: "User-agent: *\nDisallow: /private/\nCrawl-delay: 2",
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(stub.clone());
        let gate = RobotsGate::new("sampletrace", true);

        let verdict = gate.check(&url("/private/page"), &fetcher).await;
        assert!(!verdict.allowed);
        assert_eq!(verdict.crawl_delay, Some(2.0));

        let verdict = gate.check(&url("/A/B/"), &fetcher).await;
        assert!(verdict.allowed);

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let stub = Arc::new(RobotsStub {
            status: 404,
            body: "not found",
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(stub);
        let gate = RobotsGate::new("sampletrace", true);

        let verdict = gate.check(&url("/anything/"), &fetcher).await;
        assert!(verdict.allowed);
        assert_eq!(verdict.crawl_delay, None);
    }

    #[tokio::test]
    async fn test_disabled_gate_never_fetches() {
        let stub = Arc::new(RobotsStub {
            status: 200,
            body: "User-agent: *\nDisallow: /",
            calls: AtomicUsize::new(0),
        });
        let fetcher = fetcher(stub.clone());
        let gate = RobotsGate::new("sampletrace", false);

        assert!(gate.check(&url("/A/B/"), &fetcher).await.allowed);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }
}
