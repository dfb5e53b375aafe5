//! Typed records and crawl tasks
//!
//! Records ([`TrackRef`], [`SampleEdge`]) are value objects handed to the
//! emitter. Tasks ([`CrawlTask`]) are owned by the frontier until dispatched.
//! Extractors describe the links they find as [`FollowUp`] values; the
//! frontier turns those into tasks.

mod edge;
mod task;
mod track;

pub use edge::SampleEdge;
pub use task::{CrawlTask, Direction, FollowUp, PageRole, TaskContext};
pub use track::{track_id_from_url, TrackRef};
