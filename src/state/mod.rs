//! Per-track crawl state
//!
//! A track moves through `Undiscovered → Queued → Fetched → Expanded → Terminal`.
//! The frontier stores the phase of every track it has seen, keyed by track id,
//! and rejects any move [`TrackPhase::can_transition_to`] does not allow.

mod track_phase;

pub use track_phase::TrackPhase;
