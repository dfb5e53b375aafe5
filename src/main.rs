//! Sampletrace main entry point
//!
//! This is the command-line interface for the Sampletrace sample-graph crawler.

use anyhow::Context;
use clap::Parser;
use sampletrace::config::{load_config_with_hash, validate, Config};
use sampletrace::crawler::{run_crawl, Coordinator};
use sampletrace::output::open_emitter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sampletrace: a bidirectional sample-graph crawler
///
/// Sampletrace walks a music sampling site outward from seed listings,
/// following "contains samples of" and "was sampled in" links up to the
/// configured depths, and writes tracks and sampling edges as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "sampletrace")]
#[command(version)]
#[command(about = "A polite bidirectional sample-graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Seed URL to crawl instead of the configured seeds (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Stop after dispatching this many tasks
    #[arg(long, value_name = "N")]
    max_requests: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if !cli.seeds.is_empty() {
        config.seeds.urls = cli.seeds.clone();
    }
    if let Some(max_requests) = cli.max_requests {
        config.crawler.max_requests = max_requests;
    }
    validate(&config).context("invalid command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sampletrace=info,warn"),
            1 => EnvFilter::new("sampletrace=debug,info"),
            2 => EnvFilter::new("sampletrace=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the resolved configuration and seeds
fn handle_dry_run(config: &Config) {
    println!("=== Sampletrace Dry Run ===\n");

    println!("Traversal:");
    println!("  Forward depth limit: {}", config.crawler.forward_depth_limit);
    println!("  Reverse depth limit: {}", config.crawler.reverse_depth_limit);
    println!(
        "  Concurrent requests per domain: {}",
        config.crawler.concurrent_requests_per_domain
    );
    println!(
        "  Year-index page limit: {}",
        config.crawler.pagination_page_limit
    );
    println!("  List page limit: {}", config.crawler.list_page_limit);
    println!("  Obey robots.txt: {}", config.crawler.obey_robots);
    if config.crawler.max_requests > 0 {
        println!("  Request budget: {}", config.crawler.max_requests);
    }
    if config.crawler.max_duration_secs > 0 {
        println!("  Time budget: {}s", config.crawler.max_duration_secs);
    }

    println!("\nPoliteness:");
    println!(
        "  Delay range: {:.1}s - {:.1}s (ceiling {:.1}s)",
        config.politeness.base_delay_range[0],
        config.politeness.base_delay_range[1],
        config.politeness.max_delay
    );
    println!("  Max retries: {}", config.politeness.max_retries);
    println!(
        "  Retryable status codes: {:?}",
        config.politeness.retryable_status_codes
    );

    println!("\nIdentity:");
    println!("  User agents: {}", config.identity.user_agents.len());
    println!("  Proxies: {}", config.identity.proxies.len());
    if let Some(referer) = &config.identity.referer {
        println!("  Referer: {}", referer);
    }

    if let Some(solver) = &config.challenge.solver_url {
        println!("\nChallenge solver: {}", solver);
        println!("  Domains: {}", config.challenge.domains.join(", "));
    }

    println!("\nOutput:");
    println!("  Tracks: {}", config.output.tracks_path);
    println!("  Edges: {}", config.output.edges_path);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    println!("\nSeeds ({}):", config.seeds.urls.len());
    for seed in &config.seeds.urls {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    let emitter = open_emitter(&config.output).context("failed to open output files")?;
    let coordinator = Coordinator::new(config, emitter)?.with_config_hash(config_hash);

    let stop = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight requests");
            stop.cancel();
        }
    });

    match run_crawl(coordinator).await {
        Ok(_) => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
