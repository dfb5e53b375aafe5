use crate::model::track::track_id_from_url;
use crate::url::{identity_key, strip_tracking};
use crate::UrlError;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Following "contains samples of" links
    Forward,
    /// Following "was sampled in" links
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of page a task fetches, which selects the extraction rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageRole {
    TrackPage,
    SamplesListPage,
    SampledListPage,
    SampleDetailPage,
    YearIndexPage,
}

impl PageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrackPage => "track_page",
            Self::SamplesListPage => "samples_list_page",
            Self::SampledListPage => "sampled_list_page",
            Self::SampleDetailPage => "sample_detail_page",
            Self::YearIndexPage => "year_index_page",
        }
    }
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traversal context carried from a task to the tasks it spawns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    /// Number of sampling links crossed since the seed
    pub depth: u32,
    pub direction: Direction,
    /// The sampling track, known when walking forward from it
    pub source_track_id: Option<String>,
    /// The sampled track, known when walking in reverse from it
    pub target_track_id: Option<String>,
    /// 1-based page number within a paginated listing
    pub page: u32,
}

impl TaskContext {
    /// Context of a seed task
    pub fn seed() -> Self {
        Self {
            depth: 0,
            direction: Direction::Forward,
            source_track_id: None,
            target_track_id: None,
            page: 1,
        }
    }
}

/// A unit of pending work
#[derive(Debug, Clone)]
pub struct CrawlTask {
    /// URL to fetch, with the fragment and tracking parameters removed
    pub url: Url,
    /// Canonical identity key used for deduplication
    pub key: String,
    pub role: PageRole,
    pub context: TaskContext,
}

impl CrawlTask {
    /// Builds a task, deriving its identity key from the URL
    pub fn new(mut url: Url, role: PageRole, context: TaskContext) -> Result<Self, UrlError> {
        strip_tracking(&mut url);
        let key = identity_key(&url)?;
        Ok(Self {
            url,
            key,
            role,
            context,
        })
    }

    /// The id of the track this task fetches, for TrackPage tasks
    pub fn track_id(&self) -> Option<String> {
        match self.role {
            PageRole::TrackPage => track_id_from_url(&self.url),
            _ => None,
        }
    }

    pub fn depth(&self) -> u32 {
        self.context.depth
    }

    pub fn direction(&self) -> Direction {
        self.context.direction
    }
}

/// A link found by an extractor, typed by what it leads to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// A track's own page
    Track { url: Url },
    /// The dedicated "contains samples of" list behind a "see all" button
    SamplesPage { url: Url },
    /// The dedicated "was sampled in" list behind a "see all" button
    SampledPage { url: Url },
    /// A page describing one sampling relationship
    SampleDetail { url: Url, direction: Direction },
    /// The next page of the listing currently being read
    Pagination { url: Url },
}
