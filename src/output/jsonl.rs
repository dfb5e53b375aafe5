//! JSON-lines emitter

use crate::model::{Direction, SampleEdge, TrackRef};
use crate::output::traits::{EmitResult, Emitter};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct Stamped<'a, T: Serialize> {
    #[serde(flatten)]
    record: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    direction: Option<Direction>,
    scraped_at: &'a str,
}

/// Writes tracks and edges to two line-delimited JSON files
///
/// Both files are truncated when the emitter is created, so each holds one
/// line per track id or edge key from the current run; within the run they
/// are only appended to. Each line is stamped with an RFC 3339 `scraped_at`
/// time.
pub struct JsonLinesEmitter {
    tracks: BufWriter<File>,
    edges: BufWriter<File>,
}

impl JsonLinesEmitter {
    pub fn create(tracks_path: &Path, edges_path: &Path) -> EmitResult<Self> {
        Ok(Self {
            tracks: BufWriter::new(open_fresh(tracks_path)?),
            edges: BufWriter::new(open_fresh(edges_path)?),
        })
    }

    fn write_line<T: Serialize, W: Write>(
        writer: &mut W,
        record: &T,
        direction: Option<Direction>,
        scraped_at: &str,
    ) -> EmitResult<()> {
        let stamped = Stamped {
            record,
            direction,
            scraped_at,
        };
        serde_json::to_writer(&mut *writer, &stamped)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn open_fresh(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Emitter for JsonLinesEmitter {
    fn emit_track(&mut self, track: &TrackRef) -> EmitResult<()> {
        Self::write_line(&mut self.tracks, track, None, &now())
    }

    fn emit_edge(&mut self, edge: &SampleEdge, direction: Direction) -> EmitResult<()> {
        Self::write_line(&mut self.edges, edge, Some(direction), &now())
    }

    /// Serializes the whole page before touching either file
    fn emit_page(&mut self, tracks: &[TrackRef], edges: &[(SampleEdge, Direction)]) -> EmitResult<()> {
        let scraped_at = now();
        let mut track_lines = Vec::new();
        for track in tracks {
            Self::write_line(&mut track_lines, track, None, &scraped_at)?;
        }
        let mut edge_lines = Vec::new();
        for (edge, direction) in edges {
            Self::write_line(&mut edge_lines, edge, Some(*direction), &scraped_at)?;
        }

        self.tracks.write_all(&track_lines)?;
        self.edges.write_all(&edge_lines)?;
        Ok(())
    }

    fn flush(&mut self) -> EmitResult<()> {
        self.tracks.flush()?;
        self.edges.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use url::Url;

    #[test]
    fn test_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let tracks = dir.path().join("out/tracks.jsonl");
        let edges = dir.path().join("out/edges.jsonl");

        let mut emitter = JsonLinesEmitter::create(&tracks, &edges).unwrap();
        let url = Url::parse("https://www.example.com/A/B/").unwrap();
        emitter.emit_track(&TrackRef::new("A/B", "B", &url)).unwrap();
        emitter.emit_track(&TrackRef::new("C/D", "D", &url)).unwrap();
        emitter
            .emit_edge(&SampleEdge::new("A/B", "C/D"), Direction::Reverse)
            .unwrap();
        emitter.flush().unwrap();

        let written = fs::read_to_string(&tracks).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "A/B");
        assert!(first.get("direction").is_none());
        assert!(first["scraped_at"].as_str().unwrap().ends_with('Z'));

        let edge: serde_json::Value =
            serde_json::from_str(fs::read_to_string(&edges).unwrap().trim()).unwrap();
        assert_eq!(edge["source_id"], "A/B");
        assert_eq!(edge["target_id"], "C/D");
        assert_eq!(edge["direction"], "reverse");
    }

    #[test]
    fn test_page_shares_one_timestamp() {
        let dir = TempDir::new().unwrap();
        let tracks = dir.path().join("tracks.jsonl");
        let edges = dir.path().join("edges.jsonl");
        let url = Url::parse("https://www.example.com/A/B/").unwrap();

        let mut emitter = JsonLinesEmitter::create(&tracks, &edges).unwrap();
        emitter
            .emit_page(
                &[TrackRef::new("A/B", "B", &url)],
                &[
                    (SampleEdge::new("A/B", "C/D"), Direction::Forward),
                    (SampleEdge::new("E/F", "A/B"), Direction::Reverse),
                ],
            )
            .unwrap();
        emitter.flush().unwrap();

        let track: serde_json::Value =
            serde_json::from_str(fs::read_to_string(&tracks).unwrap().trim()).unwrap();
        let written = fs::read_to_string(&edges).unwrap();
        let edge_lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(edge_lines.len(), 2);
        assert_eq!(edge_lines[1]["direction"], "reverse");
        assert!(edge_lines.iter().all(|e| e["scraped_at"] == track["scraped_at"]));
    }

    #[test]
    fn test_rerun_keeps_one_line_per_key() {
        let dir = TempDir::new().unwrap();
        let tracks = dir.path().join("tracks.jsonl");
        let edges = dir.path().join("edges.jsonl");
        let url = Url::parse("https://www.example.com/A/B/").unwrap();

        for _ in 0..2 {
            let mut emitter = JsonLinesEmitter::create(&tracks, &edges).unwrap();
            emitter.emit_track(&TrackRef::new("A/B", "B", &url)).unwrap();
            emitter
                .emit_edge(&SampleEdge::new("A/B", "C/D"), Direction::Forward)
                .unwrap();
            emitter.flush().unwrap();
        }

        let written = fs::read_to_string(&tracks).unwrap();
        let ids: Vec<String> = written
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(ids, vec!["A/B"]);
        assert_eq!(fs::read_to_string(&edges).unwrap().lines().count(), 1);
    }
}
