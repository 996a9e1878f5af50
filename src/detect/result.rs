use serde::Serialize;

/// Outcome of analysing one frame.
///
/// Published as a whole into the latest-result slot; never updated field by
/// field.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    /// Raw vocabulary label, present only when the decision was accepted.
    pub label: Option<String>,
    /// Index of the winning class, present only when accepted.
    pub class_index: Option<usize>,
    /// Probability of the top class, accepted or not.
    pub confidence: f32,
    /// Sequence number of the frame that produced this result.
    pub sequence: u64,
}

impl DetectionResult {
    /// Result for a frame where nothing cleared the threshold.
    pub fn unrecognized(confidence: f32, sequence: u64) -> Self {
        Self {
            label: None,
            class_index: None,
            confidence,
            sequence,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.label.is_some()
    }
}
