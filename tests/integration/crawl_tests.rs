//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small sampling site and run the
//! coordinator end-to-end against it.

use sampletrace::config::Config;
use sampletrace::crawler::Coordinator;
use sampletrace::output::{
    CrawlSummary, EmitError, EmitResult, Emitter, FailureKind, MemoryEmitter, StopReason,
};
use sampletrace::{Direction, SampleEdge, TrackRef};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX: &str = "/browse/year/2024/";

/// Creates a test configuration with no delays and robots.txt ignored
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.politeness.base_delay_range = [0.0, 0.0];
    config.politeness.request_timeout_secs = 5;
    config.crawler.obey_robots = false;
    config.seeds.urls = vec![format!("{}{}", server.uri(), INDEX)];
    config
}

fn index_page(tracks: &[&str]) -> String {
    let links: String = tracks
        .iter()
        .map(|t| format!(r#"<h3 class="trackName"><a itemprop="url" href="{}">{}</a></h3>"#, t, t))
        .collect();
    format!("<html><body>{}</body></html>", links)
}

fn track_page(title: &str, sections: &str) -> String {
    format!(
        r#"<html><body>
<div class="trackInfo"><h1>{}<span> by <a href="/Someone/">Someone</a></span></h1></div>
<section>{}</section>
</body></html>"#,
        title, sections
    )
}

fn contains_samples(details: &[&str]) -> String {
    section("Contains samples of", details)
}

fn sampled_in(details: &[&str]) -> String {
    section("Was sampled in", details)
}

fn section(title: &str, details: &[&str]) -> String {
    let rows: String = details
        .iter()
        .map(|d| format!(r#"<tr><td class="tdata__td1"><a href="{}">entry</a></td></tr>"#, d))
        .collect();
    format!(
        "<header><h3>{} {} songs</h3></header><table>{}</table>",
        title,
        details.len(),
        rows
    )
}

fn detail_page(sampler: &str, sampled: &str) -> String {
    format!(
        r#"<html><body>
<div class="sampleEntryBox"><a class="trackName" href="{}">a</a>
  <div class="timing-wrapper"><span>1:02</span></div></div>
<div class="sampleEntryBox"><a class="trackName" href="{}">b</a>
  <div class="timing-wrapper"><span>0:10</span></div></div>
</body></html>"#,
        sampler, sampled
    )
}

async fn serve(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn crawl(config: Config) -> (CrawlSummary, MemoryEmitter) {
    let emitter = MemoryEmitter::new();
    let coordinator = Coordinator::new(config, Box::new(emitter.clone()))
        .expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Crawl failed");
    (summary, emitter)
}

#[tokio::test]
async fn test_seed_listing_two_tracks_without_samples() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-One/Song-One/", "/Artist-Two/Song-Two/"])).await;
    serve(&server, "/Artist-One/Song-One/", track_page("Song One", "")).await;
    serve(&server, "/Artist-Two/Song-Two/", track_page("Song Two", "")).await;

    let (summary, emitter) = crawl(create_test_config(&server)).await;

    let mut ids: Vec<_> = emitter.tracks().into_iter().map(|t| t.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["Artist-One/Song-One", "Artist-Two/Song-Two"]);
    assert!(emitter.edges().is_empty());

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.stats.tasks_processed, 3);
    assert_eq!(summary.stats.tasks_admitted, 2);
    assert_eq!(summary.stats.total_failures(), 0);
}

#[tokio::test]
async fn test_inline_sample_yields_edge_and_next_track_one_level_down() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-A/Song-A/"])).await;
    serve(
        &server,
        "/Artist-A/Song-A/",
        track_page("Song A", &contains_samples(&["/sample/1/"])),
    )
    .await;
    serve(&server, "/sample/1/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(
        &server,
        "/Artist-B/Song-B/",
        track_page("Song B", &contains_samples(&["/sample/2/"])),
    )
    .await;

    let mut config = create_test_config(&server);
    config.crawler.forward_depth_limit = 1;
    let (summary, emitter) = crawl(config).await;

    let edges = emitter.edges();
    assert_eq!(edges.len(), 1);
    let (edge, direction) = &edges[0];
    assert_eq!(edge.source_id, "Artist-A/Song-A");
    assert_eq!(edge.target_id, "Artist-B/Song-B");
    assert_eq!(edge.timestamps_in_source, vec!["1:02"]);
    assert_eq!(edge.timestamps_in_target, vec!["0:10"]);
    assert_eq!(*direction, Direction::Forward);

    // B was fetched at depth 1, so its own sample link would be depth 2
    let tracks: Vec<_> = emitter.tracks().into_iter().map(|t| t.id).collect();
    assert_eq!(tracks, vec!["Artist-A/Song-A", "Artist-B/Song-B"]);
    assert_eq!(summary.stats.depth_limited, 1);
    assert_eq!(summary.stats.edges_forward, 1);
    assert_eq!(summary.stats.edges_reverse, 0);
}

#[tokio::test]
async fn test_retries_through_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INDEX))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    serve(&server, INDEX, index_page(&["/Artist-One/Song-One/"])).await;
    serve(&server, "/Artist-One/Song-One/", track_page("Song One", "")).await;

    let (summary, emitter) = crawl(create_test_config(&server)).await;

    assert_eq!(emitter.tracks().len(), 1);
    assert_eq!(summary.stats.throttle_events, 3);
    assert_eq!(summary.stats.transient_errors, 3);
    assert_eq!(summary.stats.total_failures(), 0);
}

#[tokio::test]
async fn test_retries_exhausted_drops_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INDEX))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.politeness.max_retries = 2;
    let (summary, _) = crawl(config).await;

    assert_eq!(summary.stats.failures_of(FailureKind::TerminalFetch), 1);
    assert_eq!(summary.stats.throttle_events, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-Gone/Song-Gone/"])).await;
    Mock::given(method("GET"))
        .and(path("/Artist-Gone/Song-Gone/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (summary, emitter) = crawl(create_test_config(&server)).await;

    assert!(emitter.tracks().is_empty());
    assert_eq!(summary.stats.failures_of(FailureKind::TerminalFetch), 1);
    assert_eq!(summary.stats.transient_errors, 0);
}

#[tokio::test]
async fn test_see_all_list_follows_first_page_only() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-A/Song-A/"])).await;

    let sections = r#"<header><h3>Contains samples of 30 songs</h3></header>
<div class="btn-row"><a class="btn" href="/Artist-A/Song-A/samples/">See all 30</a></div>
<table><tr><td class="tdata__td1"><a href="/sample/9/">inline</a></td></tr></table>"#;
    serve(&server, "/Artist-A/Song-A/", track_page("Song A", sections)).await;

    Mock::given(method("GET"))
        .and(path("/Artist-A/Song-A/samples/"))
        .and(query_param("cp", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><table><tr><td class="tdata__td1"><a href="/sample/20/">x</a></td></tr></table>
<span class="next"><a href="/Artist-A/Song-A/samples/?cp=3">Next</a></span></body></html>"#,
        ))
        .expect(0)
        .mount(&server)
        .await;
    serve(
        &server,
        "/Artist-A/Song-A/samples/",
        r#"<html><body><table>
<tr><td class="tdata__td1"><a href="/sample/10/">c</a></td></tr>
<tr><td class="tdata__td1"><a href="/sample/11/">d</a></td></tr>
</table>
<span class="next"><a href="/Artist-A/Song-A/samples/?cp=2">Next</a></span></body></html>"#
            .to_string(),
    )
    .await;

    serve(&server, "/sample/10/", detail_page("/Artist-A/Song-A/", "/Artist-C/Song-C/")).await;
    serve(&server, "/sample/11/", detail_page("/Artist-A/Song-A/", "/Artist-D/Song-D/")).await;
    serve(&server, "/Artist-C/Song-C/", track_page("Song C", "")).await;
    serve(&server, "/Artist-D/Song-D/", track_page("Song D", "")).await;
    Mock::given(method("GET"))
        .and(path("/sample/9/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (summary, emitter) = crawl(create_test_config(&server)).await;

    let mut targets: Vec<_> = emitter
        .edges()
        .into_iter()
        .map(|(edge, _)| edge.target_id)
        .collect();
    targets.sort();
    assert_eq!(targets, vec!["Artist-C/Song-C", "Artist-D/Song-D"]);

    assert_eq!(summary.stats.see_all_samples, 1);
    assert_eq!(summary.stats.inline_suppressed, 1);
    assert_eq!(summary.stats.pagination_limited, 1);
    assert_eq!(emitter.tracks().len(), 3);
}

#[tokio::test]
async fn test_edge_found_in_both_directions_is_emitted_once() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-A/Song-A/", "/Artist-B/Song-B/"])).await;
    serve(
        &server,
        "/Artist-A/Song-A/",
        track_page("Song A", &contains_samples(&["/sample/1/"])),
    )
    .await;
    serve(
        &server,
        "/Artist-B/Song-B/",
        track_page("Song B", &sampled_in(&["/sample/99/"])),
    )
    .await;
    serve(&server, "/sample/1/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(&server, "/sample/99/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;

    let (summary, emitter) = crawl(create_test_config(&server)).await;

    let edges = emitter.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].0.key(), ("Artist-A/Song-A".to_string(), "Artist-B/Song-B".to_string()));
    assert_eq!(edges[0].1, Direction::Forward);

    assert_eq!(summary.stats.duplicate_edges, 1);
    assert_eq!(emitter.tracks().len(), 2);
}

/// Emitter whose first page carrying an edge fails to write
struct FailFirstEdgePage {
    inner: MemoryEmitter,
    failed: bool,
}

impl Emitter for FailFirstEdgePage {
    fn emit_track(&mut self, track: &TrackRef) -> EmitResult<()> {
        self.inner.emit_track(track)
    }

    fn emit_edge(&mut self, edge: &SampleEdge, direction: Direction) -> EmitResult<()> {
        self.inner.emit_edge(edge, direction)
    }

    fn emit_page(&mut self, tracks: &[TrackRef], edges: &[(SampleEdge, Direction)]) -> EmitResult<()> {
        if !edges.is_empty() && !self.failed {
            self.failed = true;
            return Err(EmitError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.emit_page(tracks, edges)
    }
}

#[tokio::test]
async fn test_edge_lost_to_emit_failure_is_emitted_when_found_again() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-A/Song-A/"])).await;
    serve(
        &server,
        "/Artist-A/Song-A/",
        track_page("Song A", &contains_samples(&["/sample/1/", "/sample/99/"])),
    )
    .await;
    serve(&server, "/sample/1/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(&server, "/sample/99/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(&server, "/Artist-B/Song-B/", track_page("Song B", "")).await;

    let records = MemoryEmitter::new();
    let emitter = FailFirstEdgePage {
        inner: records.clone(),
        failed: false,
    };
    let coordinator = Coordinator::new(create_test_config(&server), Box::new(emitter)).unwrap();
    let summary = coordinator.run().await.unwrap();

    let edges = records.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].0.key(), ("Artist-A/Song-A".to_string(), "Artist-B/Song-B".to_string()));

    assert_eq!(summary.stats.failures_of(FailureKind::Emit), 1);
    assert_eq!(summary.stats.duplicate_edges, 0);
    assert_eq!(summary.stats.edges_forward, 1);

    let tracks: Vec<_> = records.tracks().into_iter().map(|t| t.id).collect();
    assert_eq!(tracks, vec!["Artist-A/Song-A", "Artist-B/Song-B"]);
}

#[tokio::test]
async fn test_shared_detail_page_fetched_once_with_four_workers() {
    let server = MockServer::start().await;
    let seeds = [
        "/Artist-A/Song-A/",
        "/Artist-C/Song-C/",
        "/Artist-D/Song-D/",
        "/Artist-E/Song-E/",
    ];
    serve(&server, INDEX, index_page(&seeds)).await;
    for seed in &seeds[..3] {
        serve(
            &server,
            seed,
            track_page("Song", &contains_samples(&["/sample/shared/"])),
        )
        .await;
    }
    // Same relationship behind a second detail page
    serve(
        &server,
        "/Artist-E/Song-E/",
        track_page("Song E", &contains_samples(&["/sample/shared/", "/sample/other/"])),
    )
    .await;
    serve(&server, "/sample/shared/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(&server, "/sample/other/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(&server, "/Artist-B/Song-B/", track_page("Song B", "")).await;

    let mut config = create_test_config(&server);
    config.crawler.concurrent_requests_per_domain = 4;
    let (summary, emitter) = crawl(config).await;

    let requests = server.received_requests().await.unwrap();
    let fetches_of = |at: &str| requests.iter().filter(|r| r.url.path() == at).count();
    assert_eq!(fetches_of("/sample/shared/"), 1);
    assert_eq!(fetches_of("/Artist-B/Song-B/"), 1);
    for seed in &seeds {
        assert_eq!(fetches_of(*seed), 1);
    }

    assert_eq!(emitter.edges().len(), 1);
    assert_eq!(summary.stats.duplicate_edges, 1);

    let mut tracks: Vec<_> = emitter.tracks().into_iter().map(|t| t.id).collect();
    tracks.sort();
    tracks.dedup();
    assert_eq!(tracks.len(), 5);
    assert_eq!(emitter.tracks().len(), 5);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
}

#[tokio::test]
async fn test_depth_limit_zero_stops_at_seed_tracks() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-A/Song-A/"])).await;
    serve(
        &server,
        "/Artist-A/Song-A/",
        track_page("Song A", &contains_samples(&["/sample/1/"])),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sample/1/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.forward_depth_limit = 0;
    let (summary, emitter) = crawl(config).await;

    assert_eq!(emitter.tracks().len(), 1);
    assert!(emitter.edges().is_empty());
    assert_eq!(summary.stats.depth_limited, 1);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /Artist-Two/\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    serve(&server, INDEX, index_page(&["/Artist-One/Song-One/", "/Artist-Two/Song-Two/"])).await;
    serve(&server, "/Artist-One/Song-One/", track_page("Song One", "")).await;
    Mock::given(method("GET"))
        .and(path("/Artist-Two/Song-Two/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawler.obey_robots = true;
    let (summary, emitter) = crawl(config).await;

    assert_eq!(emitter.tracks().len(), 1);
    assert_eq!(summary.stats.failures_of(FailureKind::RobotsDenied), 1);
}

#[tokio::test]
async fn test_unexpected_page_shape_is_isolated() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-One/Song-One/", "/Artist-Two/Song-Two/"])).await;
    serve(
        &server,
        "/Artist-One/Song-One/",
        "<html><body><p>maintenance</p></body></html>".to_string(),
    )
    .await;
    serve(&server, "/Artist-Two/Song-Two/", track_page("Song Two", "")).await;

    let (summary, emitter) = crawl(create_test_config(&server)).await;

    let tracks: Vec<_> = emitter.tracks().into_iter().map(|t| t.id).collect();
    assert_eq!(tracks, vec!["Artist-Two/Song-Two"]);
    assert_eq!(summary.stats.failures_of(FailureKind::Extraction), 1);
}

#[tokio::test]
async fn test_request_budget_stops_crawl() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-One/Song-One/", "/Artist-Two/Song-Two/"])).await;

    let mut config = create_test_config(&server);
    config.crawler.max_requests = 1;
    let (summary, emitter) = crawl(config).await;

    assert_eq!(summary.stop_reason, StopReason::RequestBudget);
    assert_eq!(summary.stats.tasks_processed, 1);
    assert!(emitter.tracks().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let emitter = MemoryEmitter::new();
    let coordinator =
        Coordinator::new(create_test_config(&server), Box::new(emitter.clone())).unwrap();
    coordinator.cancellation_token().cancel();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.stats.tasks_processed, 0);
}

#[tokio::test]
async fn test_json_lines_and_summary_written() {
    let server = MockServer::start().await;
    serve(&server, INDEX, index_page(&["/Artist-A/Song-A/"])).await;
    serve(
        &server,
        "/Artist-A/Song-A/",
        track_page("Song A", &contains_samples(&["/sample/1/"])),
    )
    .await;
    serve(&server, "/sample/1/", detail_page("/Artist-A/Song-A/", "/Artist-B/Song-B/")).await;
    serve(&server, "/Artist-B/Song-B/", track_page("Song B", "")).await;

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = create_test_config(&server);
    config.output.tracks_path = dir.path().join("tracks.jsonl").display().to_string();
    config.output.edges_path = dir.path().join("edges.jsonl").display().to_string();
    config.output.summary_path = Some(dir.path().join("summary.md").display().to_string());

    let emitter = sampletrace::output::open_emitter(&config.output).unwrap();
    let coordinator = Coordinator::new(config, emitter)
        .unwrap()
        .with_config_hash("deadbeef");
    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.stats.tracks_emitted, 2);

    let tracks = std::fs::read_to_string(dir.path().join("tracks.jsonl")).unwrap();
    assert_eq!(tracks.lines().count(), 2);

    let edges = std::fs::read_to_string(dir.path().join("edges.jsonl")).unwrap();
    let edge: serde_json::Value = serde_json::from_str(edges.trim()).unwrap();
    assert_eq!(edge["source_id"], "Artist-A/Song-A");
    assert_eq!(edge["direction"], "forward");

    let report = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(report.contains("deadbeef"));
    assert!(report.contains("| Edges (forward) | 1 |"));
}
