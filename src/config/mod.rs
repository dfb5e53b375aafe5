//! Configuration module for Sampletrace
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so a file holding only a `[seeds]` table is valid.
//!
//! # Example
//!
//! ```no_run
//! use sampletrace::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sampletrace.toml")).unwrap();
//! println!("Forward depth limit: {}", config.crawler.forward_depth_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChallengeConfig, Config, CrawlerConfig, IdentityConfig, OutputConfig, PolitenessConfig,
    SeedConfig, MAX_DELAY_LIMIT_SECS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
