//! Crawler module: the crawl state machine and everything around a fetch
//!
//! This module contains the core crawling logic, including:
//! - The frontier (queue, deduplication, depth-limited expansion)
//! - Politeness (randomized delays, backoff, retry eligibility)
//! - Request decorators and the fetcher with challenge bypass routing
//! - Page extraction into typed records and follow-up links
//! - Per-domain scheduling and overall crawl coordination

mod challenge;
mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod identity;
mod politeness;
mod scheduler;

pub use challenge::{detect_challenge, normalize_headers, ChallengeSolver};
pub use coordinator::{run_crawl, Coordinator};
pub use extractor::{Extraction, ExtractionError, Extractor, HtmlExtractor, Record};
pub use fetcher::{FetchError, FetchedDocument, Fetcher, HttpTransport, RawResponse, Transport};
pub use frontier::{Expansion, Frontier, FrontierLimits};
pub use identity::{
    default_decorators, BrowserHeaders, FetchRequest, ProxyRotation, RefererHeader,
    RequestDecorator, UserAgentRotation,
};
pub use politeness::{PolitenessPolicy, ThrottleSignal};
pub use scheduler::{ScheduledFetch, Scheduler};
