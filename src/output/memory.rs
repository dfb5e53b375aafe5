//! In-memory emitter, used by tests and dry runs

use crate::model::{Direction, SampleEdge, TrackRef};
use crate::output::traits::{EmitResult, Emitter};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Records {
    tracks: Vec<TrackRef>,
    edges: Vec<(SampleEdge, Direction)>,
}

/// Collects records in memory
///
/// Clones share the same storage, so a handle kept by the caller sees what
/// the crawl emitted.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmitter {
    records: Arc<Mutex<Records>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> Vec<TrackRef> {
        self.records
            .lock()
            .map(|r| r.tracks.clone())
            .unwrap_or_default()
    }

    pub fn edges(&self) -> Vec<(SampleEdge, Direction)> {
        self.records
            .lock()
            .map(|r| r.edges.clone())
            .unwrap_or_default()
    }
}

impl Emitter for MemoryEmitter {
    fn emit_track(&mut self, track: &TrackRef) -> EmitResult<()> {
        if let Ok(mut records) = self.records.lock() {
            records.tracks.push(track.clone());
        }
        Ok(())
    }

    fn emit_edge(&mut self, edge: &SampleEdge, direction: Direction) -> EmitResult<()> {
        if let Ok(mut records) = self.records.lock() {
            records.edges.push((edge.clone(), direction));
        }
        Ok(())
    }

    fn emit_page(&mut self, tracks: &[TrackRef], edges: &[(SampleEdge, Direction)]) -> EmitResult<()> {
        if let Ok(mut records) = self.records.lock() {
            records.tracks.extend_from_slice(tracks);
            records.edges.extend_from_slice(edges);
        }
        Ok(())
    }
}
