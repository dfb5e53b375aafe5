//! The crawl frontier
//!
//! Owns the pending queue, the visited set, the relationship set and the
//! per-track phase table. Every check-and-insert happens inside one `&mut self`
//! call, so wrapping the frontier in a mutex is enough to keep admission and
//! edge registration atomic across workers.

use crate::config::CrawlerConfig;
use crate::model::{CrawlTask, Direction, FollowUp, PageRole, SampleEdge, TaskContext, TrackRef};
use crate::state::TrackPhase;
use crate::TraceError;
use std::collections::{HashMap, HashSet, VecDeque};
use url::Url;

/// Traversal limits enforced at admission time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierLimits {
    pub forward_depth_limit: u32,
    pub reverse_depth_limit: u32,
    pub pagination_page_limit: u32,
    pub list_page_limit: u32,
}

impl From<&CrawlerConfig> for FrontierLimits {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            forward_depth_limit: config.forward_depth_limit,
            reverse_depth_limit: config.reverse_depth_limit,
            pagination_page_limit: config.pagination_page_limit,
            list_page_limit: config.list_page_limit,
        }
    }
}

impl FrontierLimits {
    fn depth_limit(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Forward => self.forward_depth_limit,
            Direction::Reverse => self.reverse_depth_limit,
        }
    }
}

/// Outcome of evaluating one page's follow-up links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Tasks newly placed on the queue
    pub admitted: usize,
    /// Links whose identity key or track id was already known
    pub duplicates: usize,
    /// Links that would have exceeded their direction's depth limit
    pub depth_limited: usize,
    /// Next-page links past the configured page limit
    pub pagination_limited: usize,
    /// Inline detail links skipped in favour of a dedicated list page
    pub inline_suppressed: usize,
    /// Links that make no sense for the parent's role, or failed to canonicalize
    pub ignored: usize,
    /// The track page offered a "see all" link for its samples
    pub see_all_samples: bool,
    /// The track page offered a "see all" link for the tracks sampling it
    pub see_all_sampled: bool,
}

/// Why a follow-up link did not become a task
enum Rejection {
    DepthLimited,
    PaginationLimited,
    Suppressed,
    Ignored,
}

/// Pending work plus all deduplication state for one crawl run
#[derive(Debug)]
pub struct Frontier {
    limits: FrontierLimits,
    queue: VecDeque<CrawlTask>,
    /// Identity keys of every task ever admitted
    visited: HashSet<String>,
    /// `(source_id, target_id)` pairs already emitted
    relationships: HashSet<(String, String)>,
    /// Track ids already emitted
    emitted_tracks: HashSet<String>,
    phases: HashMap<String, TrackPhase>,
    in_flight: usize,
    dispatched: u64,
}

impl Frontier {
    pub fn new(limits: FrontierLimits) -> Self {
        Self {
            limits,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            relationships: HashSet::new(),
            emitted_tracks: HashSet::new(),
            phases: HashMap::new(),
            in_flight: 0,
            dispatched: 0,
        }
    }

    /// Inserts the start URLs as year-index tasks at depth 0, direction forward
    ///
    /// Malformed URLs are logged and skipped. Returns the number admitted.
    pub fn seed<S: AsRef<str>>(&mut self, urls: &[S]) -> usize {
        let mut admitted = 0;

        for raw in urls {
            let raw = raw.as_ref();
            let task = Url::parse(raw)
                .map_err(|e| e.to_string())
                .and_then(|url| {
                    CrawlTask::new(url, PageRole::YearIndexPage, TaskContext::seed())
                        .map_err(|e| e.to_string())
                });

            match task {
                Ok(task) => {
                    if self.admit(task) {
                        admitted += 1;
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed seed URL {}: {}", raw, e),
            }
        }

        admitted
    }

    /// Admits a task unless its identity key was seen before
    ///
    /// TrackPage tasks are also rejected when their track id already has a
    /// phase, so one track is fetched at most once even under different URLs.
    pub fn admit(&mut self, task: CrawlTask) -> bool {
        if self.visited.contains(&task.key) {
            return false;
        }

        let track_id = task.track_id();
        if let Some(id) = &track_id {
            if self.phase(id) != TrackPhase::Undiscovered {
                return false;
            }
        }

        self.visited.insert(task.key.clone());
        if let Some(id) = track_id {
            self.phases.insert(id, TrackPhase::Queued);
        }

        tracing::trace!(
            "Admitted {} {} (depth {}, {})",
            task.role,
            task.url,
            task.context.depth,
            task.context.direction
        );
        self.queue.push_back(task);
        true
    }

    /// Pops the oldest pending task and counts it as in flight
    pub fn next(&mut self) -> Option<CrawlTask> {
        let task = self.queue.pop_front()?;
        self.in_flight += 1;
        self.dispatched += 1;
        Some(task)
    }

    /// Marks a dispatched task as finished, whatever its outcome
    ///
    /// A track whose task ends here without reaching `Expanded` was dropped;
    /// either way it becomes `Terminal`.
    pub fn complete(&mut self, task: &CrawlTask) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if let Some(id) = task.track_id() {
            if let Some(phase) = self.phases.get_mut(&id) {
                if phase.can_transition_to(TrackPhase::Terminal) {
                    *phase = TrackPhase::Terminal;
                }
            }
        }
    }

    /// Records that a track page was downloaded
    pub fn mark_fetched(&mut self, task: &CrawlTask) -> Result<(), TraceError> {
        match task.track_id() {
            Some(id) => self.transition(&id, TrackPhase::Fetched),
            None => Ok(()),
        }
    }

    /// Records that a track page's follow-up links were evaluated
    pub fn mark_expanded(&mut self, task: &CrawlTask) -> Result<(), TraceError> {
        match task.track_id() {
            Some(id) => self.transition(&id, TrackPhase::Expanded),
            None => Ok(()),
        }
    }

    fn transition(&mut self, track_id: &str, to: TrackPhase) -> Result<(), TraceError> {
        let from = self.phase(track_id);
        if !from.can_transition_to(to) {
            return Err(TraceError::InvalidTransition {
                track_id: track_id.to_string(),
                from,
                to,
            });
        }
        self.phases.insert(track_id.to_string(), to);
        Ok(())
    }

    /// Current phase of a track; unknown ids are `Undiscovered`
    pub fn phase(&self, track_id: &str) -> TrackPhase {
        self.phases
            .get(track_id)
            .copied()
            .unwrap_or(TrackPhase::Undiscovered)
    }

    /// Returns true the first time a track id is registered
    pub fn register_track(&mut self, track: &TrackRef) -> bool {
        self.emitted_tracks.insert(track.id.clone())
    }

    /// Returns true the first time an ordered `(source, target)` pair is seen
    ///
    /// Later discoveries of the same pair are no-ops regardless of their
    /// timestamps; the first discovery wins.
    pub fn register_edge(&mut self, edge: &SampleEdge) -> bool {
        self.relationships.insert(edge.key())
    }

    /// Forgets a registered track id, so a later sighting is treated as new
    pub fn unregister_track(&mut self, track: &TrackRef) {
        self.emitted_tracks.remove(&track.id);
    }

    /// Forgets a registered `(source, target)` pair
    pub fn unregister_edge(&mut self, edge: &SampleEdge) {
        self.relationships.remove(&edge.key());
    }

    /// Computes a child's direction and depth, or None if it would exceed
    /// its direction's limit
    ///
    /// `crossing` is the sampling link being crossed, if any. Crossing one
    /// sets the child's direction and adds one to the depth; every other
    /// link inherits both from the parent.
    pub fn expand_depth(
        &self,
        parent: &TaskContext,
        crossing: Option<Direction>,
    ) -> Option<(Direction, u32)> {
        let (direction, depth) = match crossing {
            Some(direction) => (direction, parent.depth + 1),
            None => (parent.direction, parent.depth),
        };

        (depth <= self.limits.depth_limit(direction)).then_some((direction, depth))
    }

    /// Turns a page's follow-up links into admitted tasks
    ///
    /// # Policy
    ///
    /// - From a track page, a "see all" list link for a direction replaces the
    ///   inline detail links for that direction.
    /// - Sampling links are crossed only from track pages (inline detail links
    ///   and list links). List → detail, detail → track and pagination keep
    ///   depth and direction.
    /// - Year-index pagination stops after `pagination_page_limit` pages, list
    ///   pagination after `list_page_limit` pages.
    pub fn expand(&mut self, parent: &CrawlTask, followups: Vec<FollowUp>) -> Expansion {
        let mut expansion = Expansion::default();

        if parent.role == PageRole::TrackPage {
            expansion.see_all_samples = followups
                .iter()
                .any(|f| matches!(f, FollowUp::SamplesPage { .. }));
            expansion.see_all_sampled = followups
                .iter()
                .any(|f| matches!(f, FollowUp::SampledPage { .. }));
        }

        let parent_track = parent.track_id();

        for followup in followups {
            let planned = self.plan_child(parent, parent_track.as_deref(), followup, &expansion);

            match planned {
                Ok(task) => {
                    if self.admit(task) {
                        expansion.admitted += 1;
                    } else {
                        expansion.duplicates += 1;
                    }
                }
                Err(Rejection::DepthLimited) => expansion.depth_limited += 1,
                Err(Rejection::PaginationLimited) => expansion.pagination_limited += 1,
                Err(Rejection::Suppressed) => expansion.inline_suppressed += 1,
                Err(Rejection::Ignored) => expansion.ignored += 1,
            }
        }

        expansion
    }

    fn plan_child(
        &self,
        parent: &CrawlTask,
        parent_track: Option<&str>,
        followup: FollowUp,
        expansion: &Expansion,
    ) -> Result<CrawlTask, Rejection> {
        let from_track = parent.role == PageRole::TrackPage;

        let (url, role, crossing, page) = match followup {
            FollowUp::Track { url } => (url, PageRole::TrackPage, None, 1),
            FollowUp::SamplesPage { url } if from_track => {
                (url, PageRole::SamplesListPage, Some(Direction::Forward), 1)
            }
            FollowUp::SampledPage { url } if from_track => {
                (url, PageRole::SampledListPage, Some(Direction::Reverse), 1)
            }
            FollowUp::SamplesPage { .. } | FollowUp::SampledPage { .. } => {
                return Err(Rejection::Ignored)
            }
            FollowUp::SampleDetail { url, direction } if from_track => {
                let covered_by_list = match direction {
                    Direction::Forward => expansion.see_all_samples,
                    Direction::Reverse => expansion.see_all_sampled,
                };
                if covered_by_list {
                    return Err(Rejection::Suppressed);
                }
                (url, PageRole::SampleDetailPage, Some(direction), 1)
            }
            FollowUp::SampleDetail { url, .. } => (url, PageRole::SampleDetailPage, None, 1),
            FollowUp::Pagination { url } => {
                let limit = match parent.role {
                    PageRole::YearIndexPage => self.limits.pagination_page_limit,
                    PageRole::SamplesListPage | PageRole::SampledListPage => {
                        self.limits.list_page_limit
                    }
                    _ => return Err(Rejection::Ignored),
                };
                let page = parent.context.page + 1;
                if page > limit {
                    return Err(Rejection::PaginationLimited);
                }
                (url, parent.role, None, page)
            }
        };

        let (direction, depth) = self
            .expand_depth(&parent.context, crossing)
            .ok_or(Rejection::DepthLimited)?;

        let (source_track_id, target_track_id) = match crossing {
            Some(Direction::Forward) => (parent_track.map(str::to_string), None),
            Some(Direction::Reverse) => (None, parent_track.map(str::to_string)),
            None if role == PageRole::TrackPage => (None, None),
            None => (
                parent.context.source_track_id.clone(),
                parent.context.target_track_id.clone(),
            ),
        };

        let context = TaskContext {
            depth,
            direction,
            source_track_id,
            target_track_id,
            page,
        };

        CrawlTask::new(url, role, context).map_err(|e| {
            tracing::debug!("Ignoring follow-up link: {}", e);
            Rejection::Ignored
        })
    }

    /// Number of tasks waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of dispatched tasks not yet completed
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Total tasks handed out by [`Frontier::next`]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// True once nothing is queued and nothing is in flight
    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }

    pub fn track_count(&self) -> usize {
        self.emitted_tracks.len()
    }

    pub fn edge_count(&self) -> usize {
        self.relationships.len()
    }
}
