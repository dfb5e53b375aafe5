//! Output module: record emitters and run reports
//!
//! This module handles:
//! - The [`Emitter`] contract and its JSON-lines and in-memory implementations
//! - Run statistics and the printed summary
//! - The optional markdown report

mod jsonl;
mod markdown;
mod memory;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesEmitter;
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use memory::MemoryEmitter;
pub use stats::{print_statistics, CrawlStats, CrawlSummary, FailureKind, StopReason};
pub use traits::{EmitError, EmitResult, Emitter};

use crate::config::OutputConfig;
use std::path::Path;

/// Opens the JSON-lines emitter at the configured paths
///
/// Missing parent directories are created and existing files are truncated.
///
/// # Arguments
///
/// * `config` - Output section of the configuration
///
/// # Returns
///
/// * `Ok(Box<dyn Emitter>)` - An emitter writing `tracks-path` and `edges-path`
/// * `Err(EmitError)` - Either file could not be created
pub fn open_emitter(config: &OutputConfig) -> EmitResult<Box<dyn Emitter>> {
    let emitter = JsonLinesEmitter::create(
        Path::new(&config.tracks_path),
        Path::new(&config.edges_path),
    )?;
    Ok(Box::new(emitter))
}
