//! Emitter trait and error type
//!
//! An emitter receives every track and sampling edge exactly once; the
//! frontier deduplicates upstream, so implementations only have to persist.

use crate::model::{Direction, SampleEdge, TrackRef};
use thiserror::Error;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for emitter operations
pub type EmitResult<T> = Result<T, EmitError>;

/// Sink for crawl records
pub trait Emitter: Send {
    /// Persists a track seen on its own page
    fn emit_track(&mut self, track: &TrackRef) -> EmitResult<()>;

    /// Persists a sampling edge together with the direction it was found in
    fn emit_edge(&mut self, edge: &SampleEdge, direction: Direction) -> EmitResult<()>;

    /// Persists the new records of one page
    ///
    /// The default writes them one at a time. Emitters that can stage a page
    /// before writing override this so a failure leaves nothing behind.
    fn emit_page(&mut self, tracks: &[TrackRef], edges: &[(SampleEdge, Direction)]) -> EmitResult<()> {
        for track in tracks {
            self.emit_track(track)?;
        }
        for (edge, direction) in edges {
            self.emit_edge(edge, *direction)?;
        }
        Ok(())
    }

    /// Flushes buffered records; called once at the end of a run
    fn flush(&mut self) -> EmitResult<()> {
        Ok(())
    }
}
