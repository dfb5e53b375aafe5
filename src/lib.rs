//! Sampletrace: a bidirectional sample-graph crawler
//!
//! This crate walks a music sampling site outward from a seed listing, following
//! "contains samples of" links forward and "was sampled in" links in reverse,
//! while pacing requests, rotating request identities and retrying transient
//! failures. Tracks and sampling relationships are handed to an [`output::Emitter`]
//! exactly once each.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sampletrace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Extractor error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("Emitter error: {0}")]
    Emit(#[from] output::EmitError),

    #[error("Invalid phase transition for track {track_id}: {from} -> {to}")]
    InvalidTransition {
        track_id: String,
        from: state::TrackPhase,
        to: state::TrackPhase,
    },

    #[error("Invalid proxy {proxy}: {message}")]
    Proxy { proxy: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sampletrace operations
pub type Result<T> = std::result::Result<T, TraceError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, Frontier};
pub use model::{CrawlTask, Direction, PageRole, SampleEdge, TrackRef};
pub use state::TrackPhase;
pub use url::{extract_domain, identity_key};
