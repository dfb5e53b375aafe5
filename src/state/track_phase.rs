use std::fmt;

/// Lifecycle phase of a track within one crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackPhase {
    /// Never referenced by an admitted task
    Undiscovered,

    /// A TrackPage task for the track sits in the frontier or is in flight
    Queued,

    /// The track page was downloaded
    Fetched,

    /// Follow-up links from the track page were evaluated
    Expanded,

    /// No further action; dropped tasks also end here
    Terminal,
}

impl TrackPhase {
    /// Returns true once nothing more will happen to the track
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// Returns true while a task for the track is pending or being processed
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetched | Self::Expanded)
    }

    /// Whether `next` is a legal successor of this phase
    ///
    /// Any active phase may fall straight to `Terminal` when its task is
    /// dropped. Everything else moves strictly forward one step.
    pub fn can_transition_to(&self, next: TrackPhase) -> bool {
        matches!(
            (self, next),
            (Self::Undiscovered, Self::Queued)
                | (Self::Queued, Self::Fetched)
                | (Self::Fetched, Self::Expanded)
                | (Self::Queued, Self::Terminal)
                | (Self::Fetched, Self::Terminal)
                | (Self::Expanded, Self::Terminal)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undiscovered => "undiscovered",
            Self::Queued => "queued",
            Self::Fetched => "fetched",
            Self::Expanded => "expanded",
            Self::Terminal => "terminal",
        }
    }

    /// Returns all phases in lifecycle order
    pub fn all_phases() -> [Self; 5] {
        [
            Self::Undiscovered,
            Self::Queued,
            Self::Fetched,
            Self::Expanded,
            Self::Terminal,
        ]
    }
}

impl fmt::Display for TrackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
