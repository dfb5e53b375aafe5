use serde::Serialize;

/// A directed "source samples target" relationship
///
/// Identity is the ordered pair `(source_id, target_id)`; timestamps are
/// payload and never take part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleEdge {
    pub source_id: String,
    pub target_id: String,
    /// `mm:ss` offsets where the sample appears in the source track
    pub timestamps_in_source: Vec<String>,
    /// `mm:ss` offsets of the sampled part in the target track
    pub timestamps_in_target: Vec<String>,
}

impl SampleEdge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            timestamps_in_source: Vec::new(),
            timestamps_in_target: Vec::new(),
        }
    }

    /// Returns the deduplication key
    pub fn key(&self) -> (String, String) {
        (self.source_id.clone(), self.target_id.clone())
    }
}
