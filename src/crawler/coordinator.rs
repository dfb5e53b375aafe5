//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Seeding the frontier
//! - A fixed pool of workers pulling tasks in FIFO order
//! - Robots checks, gated fetches with retries, extraction
//! - Emitting deduplicated records and expanding follow-up links
//! - Request/time budgets and the global stop signal
//! - The end-of-run summary

use crate::config::Config;
use crate::crawler::extractor::{Extractor, HtmlExtractor, Record};
use crate::crawler::fetcher::{FetchError, FetchedDocument, Fetcher};
use crate::crawler::frontier::{Frontier, FrontierLimits};
use crate::crawler::scheduler::Scheduler;
use crate::model::CrawlTask;
use crate::output::{
    generate_markdown_summary, print_statistics, CrawlStats, CrawlSummary, Emitter, FailureKind,
    StopReason,
};
use crate::robots::RobotsGate;
use crate::url::extract_domain;
use crate::TraceError;
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How long an idle worker waits before polling the frontier again
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Progress is logged every this many completed tasks
const PROGRESS_INTERVAL: u64 = 10;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a worker should do next
enum Next {
    Task(CrawlTask),
    Wait,
    Done,
    OverBudget,
}

/// State shared by all workers
struct Shared {
    config: Config,
    frontier: Mutex<Frontier>,
    fetcher: Fetcher,
    extractor: Arc<dyn Extractor>,
    emitter: Mutex<Box<dyn Emitter>>,
    scheduler: Scheduler,
    robots: RobotsGate,
    stats: Mutex<CrawlStats>,
    stop_reason: Mutex<Option<StopReason>>,
    cancel: CancellationToken,
    started: Instant,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    shared: Arc<Shared>,
    config_hash: String,
}

impl Coordinator {
    /// Builds a coordinator with the HTTP fetcher and HTML extractor
    /// described by the configuration
    pub fn new(config: Config, emitter: Box<dyn Emitter>) -> Result<Self, TraceError> {
        let fetcher = Fetcher::from_config(&config)?;
        let extractor = Arc::new(HtmlExtractor::new()?);
        Ok(Self::with_parts(config, fetcher, extractor, emitter))
    }

    /// Builds a coordinator from explicit collaborators
    pub fn with_parts(
        config: Config,
        fetcher: Fetcher,
        extractor: Arc<dyn Extractor>,
        emitter: Box<dyn Emitter>,
    ) -> Self {
        let frontier = Frontier::new(FrontierLimits::from(&config.crawler));
        let scheduler = Scheduler::new(
            config.politeness.clone(),
            config.crawler.concurrent_requests_per_domain,
        );
        let robots = RobotsGate::new(
            config.identity.robots_agent.clone(),
            config.crawler.obey_robots,
        );

        Self {
            shared: Arc::new(Shared {
                config,
                frontier: Mutex::new(frontier),
                fetcher,
                extractor,
                emitter: Mutex::new(emitter),
                scheduler,
                robots,
                stats: Mutex::new(CrawlStats::default()),
                stop_reason: Mutex::new(None),
                cancel: CancellationToken::new(),
                started: Instant::now(),
            }),
            config_hash: String::new(),
        }
    }

    /// Records the configuration fingerprint in the run summary
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Handle for stopping the crawl from outside (e.g. on Ctrl-C)
    ///
    /// Cancelling it stops new dispatches; in-flight fetches finish.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Runs the crawl until the frontier is exhausted or the stop signal fires
    ///
    /// Per-task failures never abort the run; they are counted in the
    /// summary's failure table.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Counts, timing and the reason the run stopped
    /// * `Err(TraceError)` - The markdown summary could not be written
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sampletrace::config::load_config;
    /// use sampletrace::output::MemoryEmitter;
    /// use sampletrace::Coordinator;
    /// use std::path::Path;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = load_config(Path::new("sampletrace.toml"))?;
    /// let records = MemoryEmitter::new();
    /// let summary = Coordinator::new(config, Box::new(records.clone()))?.run().await?;
    /// println!("{} edges, stopped: {}", records.edges().len(), summary.stop_reason);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(self) -> Result<CrawlSummary, TraceError> {
        let shared = self.shared;
        let started_at = Utc::now();

        let seeded = lock(&shared.frontier).seed(&shared.config.seeds.urls);
        tracing::info!(
            "Starting crawl: {} seed(s), {} worker(s)",
            seeded,
            shared.config.crawler.concurrent_requests_per_domain
        );

        let budget_timer = spawn_time_budget(&shared);

        let workers: Vec<_> = (0..shared.config.crawler.concurrent_requests_per_domain.max(1))
            .map(|id| tokio::spawn(worker(id, shared.clone())))
            .collect();

        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!("Worker panicked: {}", e);
            }
        }

        if let Some(timer) = budget_timer {
            timer.abort();
        }

        if let Err(e) = lock(&shared.emitter).flush() {
            tracing::error!("Failed to flush emitter: {}", e);
        }

        let stop_reason = match *lock(&shared.stop_reason) {
            Some(reason) => reason,
            None if shared.cancel.is_cancelled() => StopReason::Cancelled,
            None => StopReason::Exhausted,
        };
        let mut stats = lock(&shared.stats).clone();
        stats.throttle_events = shared.scheduler.throttle_events();

        let summary = CrawlSummary {
            config_hash: self.config_hash,
            started_at,
            finished_at: Utc::now(),
            stop_reason,
            stats,
        };

        {
            let frontier = lock(&shared.frontier);
            tracing::info!(
                "Crawl finished ({}): {} tasks dispatched, {} tracks, {} edges ({} forward, {} reverse), {} dropped in {:?}",
                summary.stop_reason,
                frontier.dispatched(),
                summary.stats.tracks_emitted,
                summary.stats.total_edges(),
                summary.stats.edges_forward,
                summary.stats.edges_reverse,
                summary.stats.total_failures(),
                shared.started.elapsed()
            );
        }

        if let Some(path) = &shared.config.output.summary_path {
            generate_markdown_summary(&summary, Path::new(path))?;
            tracing::info!("Summary written to {}", path);
        }

        Ok(summary)
    }
}

/// Runs the crawl and prints its statistics
pub async fn run_crawl(coordinator: Coordinator) -> Result<CrawlSummary, TraceError> {
    let summary = coordinator.run().await?;
    print_statistics(&summary);
    Ok(summary)
}

fn spawn_time_budget(shared: &Arc<Shared>) -> Option<tokio::task::JoinHandle<()>> {
    let secs = shared.config.crawler.max_duration_secs;
    if secs == 0 {
        return None;
    }

    let shared = shared.clone();
    Some(tokio::spawn(async move {
        tokio::select! {
            _ = shared.cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                shared.stop(StopReason::TimeBudget);
            }
        }
    }))
}

async fn worker(id: u32, shared: Arc<Shared>) {
    tracing::debug!("Worker {} started", id);

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        match shared.next() {
            Next::Task(task) => {
                shared.process(&task).await;
                lock(&shared.frontier).complete(&task);
                shared.task_done();
            }
            Next::Wait => {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
            }
            Next::Done => break,
            Next::OverBudget => {
                shared.stop(StopReason::RequestBudget);
                break;
            }
        }
    }

    tracing::debug!("Worker {} finished", id);
}

impl Shared {
    fn next(&self) -> Next {
        let mut frontier = lock(&self.frontier);
        let budget = self.config.crawler.max_requests;

        if frontier.is_exhausted() {
            return Next::Done;
        }
        if budget > 0 && frontier.dispatched() >= budget && frontier.pending() > 0 {
            return Next::OverBudget;
        }
        match frontier.next() {
            Some(task) => Next::Task(task),
            None => Next::Wait,
        }
    }

    /// Fires the global stop signal; the first reason given is kept
    fn stop(&self, reason: StopReason) {
        {
            let mut stop_reason = lock(&self.stop_reason);
            if stop_reason.is_none() {
                tracing::info!("Stopping crawl: {}", reason);
                *stop_reason = Some(reason);
            }
        }
        self.cancel.cancel();
    }

    fn task_done(&self) {
        let processed = {
            let mut stats = lock(&self.stats);
            stats.tasks_processed += 1;
            stats.tasks_processed
        };

        if processed % PROGRESS_INTERVAL == 0 {
            let frontier = lock(&self.frontier);
            let rate = processed as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} tasks dispatched, {} queued, {} tracks, {} edges, {:.2} tasks/sec",
                frontier.dispatched(),
                frontier.pending(),
                frontier.track_count(),
                frontier.edge_count(),
                rate
            );
        }
    }

    fn record_failure(&self, kind: FailureKind) {
        lock(&self.stats).record_failure(kind);
    }

    /// Processes a single task
    ///
    /// Every failure is recorded and isolated to this task.
    async fn process(&self, task: &CrawlTask) {
        tracing::debug!(
            "Processing {} {} (depth {}, {})",
            task.role,
            task.url,
            task.depth(),
            task.direction()
        );

        let Some(domain) = extract_domain(&task.url) else {
            tracing::warn!("Dropping {}: no host", task.url);
            self.record_failure(FailureKind::TerminalFetch);
            return;
        };

        let verdict = self.robots.check(&task.url, &self.fetcher).await;
        if let Some(delay) = verdict.crawl_delay {
            self.scheduler.set_crawl_delay(&domain, delay);
        }
        if !verdict.allowed {
            tracing::info!("URL {} disallowed by robots.txt", task.url);
            self.record_failure(FailureKind::RobotsDenied);
            return;
        }

        let document = match self.fetch_with_retry(task, &domain).await {
            Ok(document) => document,
            Err(kind) => {
                self.record_failure(kind);
                return;
            }
        };

        if let Err(e) = lock(&self.frontier).mark_fetched(task) {
            tracing::warn!("{}", e);
        }

        let extraction = match self.extractor.extract(&document, task) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!("Failed to extract {}: {}", task.url, e);
                self.record_failure(FailureKind::Extraction);
                return;
            }
        };

        if let Err(e) = self.emit_records(extraction.records) {
            tracing::error!("Failed to emit records from {}: {}", task.url, e);
            self.record_failure(FailureKind::Emit);
            return;
        }

        let expansion = {
            let mut frontier = lock(&self.frontier);
            let expansion = frontier.expand(task, extraction.followups);
            if let Err(e) = frontier.mark_expanded(task) {
                tracing::warn!("{}", e);
            }
            expansion
        };

        tracing::debug!(
            "Expanded {}: {} admitted, {} duplicate, {} over depth, {} over page limit",
            task.url,
            expansion.admitted,
            expansion.duplicates,
            expansion.depth_limited,
            expansion.pagination_limited
        );
        lock(&self.stats).record_expansion(&expansion);
    }

    /// Fetches a task, retrying transient failures per the politeness policy
    async fn fetch_with_retry(
        &self,
        task: &CrawlTask,
        domain: &str,
    ) -> Result<FetchedDocument, FailureKind> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let Some(_slot) = self.scheduler.gate(domain, &self.cancel).await else {
                tracing::debug!("Stop signal before fetching {}", task.url);
                return Err(FailureKind::Cancelled);
            };

            let error = match self.fetcher.fetch(task).await {
                Ok(document) => {
                    self.scheduler.on_success(domain);
                    return Ok(document);
                }
                Err(error) => error,
            };

            if let Some(signal) = error.throttle_signal() {
                self.scheduler.on_throttled(domain, signal);
            }

            if self.scheduler.should_retry(domain, attempt, &error) {
                tracing::debug!("Retrying {} after {} (attempt {})", task.url, error, attempt);
                lock(&self.stats).transient_errors += 1;
                continue;
            }

            tracing::warn!(
                "Dropping {} after {} attempt(s): {}",
                task.url,
                attempt,
                error
            );
            return Err(match error {
                FetchError::Challenge { .. } => FailureKind::Challenge,
                _ => FailureKind::TerminalFetch,
            });
        }
    }

    /// Hands a page's new records to the emitter in one call; already-seen
    /// tracks and edges are skipped
    ///
    /// The frontier stays locked until the emitter returns. If the page
    /// cannot be written its keys are unregistered, so a later page carrying
    /// the same track or edge emits it.
    fn emit_records(&self, records: Vec<Record>) -> Result<(), TraceError> {
        let mut tracks = Vec::new();
        let mut edges = Vec::new();
        let mut duplicates = 0;

        let mut frontier = lock(&self.frontier);
        for record in records {
            match record {
                Record::Track(track) => {
                    if frontier.register_track(&track) {
                        tracks.push(track);
                    }
                }
                Record::Edge { edge, direction } => {
                    if frontier.register_edge(&edge) {
                        edges.push((edge, direction));
                    } else {
                        duplicates += 1;
                    }
                }
            }
        }

        if tracks.is_empty() && edges.is_empty() {
            drop(frontier);
            lock(&self.stats).duplicate_edges += duplicates;
            return Ok(());
        }

        if let Err(e) = lock(&self.emitter).emit_page(&tracks, &edges) {
            for track in &tracks {
                frontier.unregister_track(track);
            }
            for (edge, _) in &edges {
                frontier.unregister_edge(edge);
            }
            return Err(e.into());
        }
        drop(frontier);

        let mut stats = lock(&self.stats);
        stats.duplicate_edges += duplicates;
        stats.tracks_emitted += tracks.len() as u64;
        for track in &tracks {
            tracing::debug!("Track {}", track.id);
        }
        for (edge, direction) in &edges {
            stats.record_edge(*direction);
            tracing::debug!(
                "Edge {} -> {} ({})",
                edge.source_id,
                edge.target_id,
                direction
            );
        }
        Ok(())
    }
}
