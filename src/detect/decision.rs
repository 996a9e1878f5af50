use crate::detect::result::DetectionResult;
use crate::labels::LabelVocabulary;

/// Minimum probability, exclusive, before a class is shown to the user.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Index of the largest value; the lowest index wins ties.
///
/// NaN entries are skipped. Returns `None` when no entry is a number.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some(current) if *value <= values[current] => {}
            _ => best = Some(index),
        }
    }
    best
}

/// Verdict for one probability vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decision {
    Accepted { index: usize, confidence: f32 },
    Unrecognized { confidence: f32 },
}

impl Decision {
    pub fn confidence(&self) -> f32 {
        match self {
            Decision::Accepted { confidence, .. } | Decision::Unrecognized { confidence } => {
                *confidence
            }
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Decision::Accepted { index, .. } => Some(*index),
            Decision::Unrecognized { .. } => None,
        }
    }
}

/// Stateless top-1 thresholding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionPolicy {
    threshold: f32,
}

impl DecisionPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Accept the top class only when its probability is strictly above the
    /// threshold.
    pub fn decide(&self, probabilities: &[f32]) -> Decision {
        let Some(index) = argmax(probabilities) else {
            return Decision::Unrecognized { confidence: 0.0 };
        };
        let confidence = probabilities[index];
        if confidence > self.threshold {
            Decision::Accepted { index, confidence }
        } else {
            Decision::Unrecognized { confidence }
        }
    }

    /// Decide and attach the vocabulary label.
    ///
    /// An accepted index outside the vocabulary is reported as unrecognized.
    pub fn resolve(
        &self,
        probabilities: &[f32],
        vocabulary: &LabelVocabulary,
        sequence: u64,
    ) -> DetectionResult {
        match self.decide(probabilities) {
            Decision::Accepted { index, confidence } => match vocabulary.get(index) {
                Some(label) => DetectionResult {
                    label: Some(label.to_string()),
                    class_index: Some(index),
                    confidence,
                    sequence,
                },
                None => DetectionResult::unrecognized(confidence, sequence),
            },
            Decision::Unrecognized { confidence } => {
                DetectionResult::unrecognized(confidence, sequence)
            }
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_maximum_wins_ties() {
        let decision = DecisionPolicy::default().decide(&[0.2, 0.71, 0.71]);
        assert_eq!(
            decision,
            Decision::Accepted {
                index: 1,
                confidence: 0.71
            }
        );
    }

    #[test]
    fn even_split_is_unrecognized() {
        let decision = DecisionPolicy::default().decide(&[0.5, 0.5]);
        assert_eq!(decision, Decision::Unrecognized { confidence: 0.5 });
        assert_eq!(decision.index(), None);
    }

    #[test]
    fn threshold_is_strict() {
        let policy = DecisionPolicy::default();
        assert_eq!(
            policy.decide(&[0.1, 0.7, 0.2]),
            Decision::Unrecognized { confidence: 0.7 }
        );
        assert!(matches!(
            policy.decide(&[0.1, 0.7001, 0.2]),
            Decision::Accepted { index: 1, .. }
        ));
    }

    #[test]
    fn empty_vector_is_unrecognized() {
        assert_eq!(
            DecisionPolicy::default().decide(&[]),
            Decision::Unrecognized { confidence: 0.0 }
        );
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn nan_never_wins() {
        assert_eq!(argmax(&[0.3, f32::NAN, 0.9]), Some(2));
        assert_eq!(argmax(&[f32::NAN, 0.9]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.2]), Some(1));
        let decision = DecisionPolicy::default().decide(&[f32::NAN, 0.9]);
        assert_eq!(
            decision,
            Decision::Accepted {
                index: 1,
                confidence: 0.9
            }
        );
    }

    #[test]
    fn all_nan_vector_is_unrecognized() {
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), None);
        assert_eq!(
            DecisionPolicy::default().decide(&[f32::NAN, f32::NAN]),
            Decision::Unrecognized { confidence: 0.0 }
        );
    }

    #[test]
    fn argmax_matches_lowest_index_of_maximum() {
        let cases: &[&[f32]] = &[
            &[1.0],
            &[0.0, 0.0, 0.0],
            &[0.1, 0.9, 0.3, 0.9],
            &[0.9, 0.1, 0.9],
            &[-1.0, -0.5, -0.5],
        ];
        for values in cases {
            let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let expected = values.iter().position(|v| *v == max);
            assert_eq!(argmax(values), expected, "values {:?}", values);
        }
    }

    #[test]
    fn resolve_attaches_label() {
        let vocabulary = LabelVocabulary::new(vec!["Yield".into(), "Stop".into()]).unwrap();
        let policy = DecisionPolicy::default();

        let accepted = policy.resolve(&[0.05, 0.95], &vocabulary, 9);
        assert_eq!(accepted.label.as_deref(), Some("Stop"));
        assert_eq!(accepted.class_index, Some(1));
        assert_eq!(accepted.sequence, 9);

        let rejected = policy.resolve(&[0.6, 0.4], &vocabulary, 10);
        assert!(!rejected.is_recognized());
        assert_eq!(rejected.confidence, 0.6);

        let out_of_range = policy.resolve(&[0.0, 0.0, 0.99], &vocabulary, 11);
        assert!(!out_of_range.is_recognized());
    }
}
