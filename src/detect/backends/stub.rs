use anyhow::{anyhow, Result};

use crate::detect::backend::ClassifierBackend;
use crate::preprocess::InputTensor;

/// Stub backend for demos without a model file.
///
/// Picks a class from the mean input intensity and reports it with a fixed
/// confidence, so a changing synthetic scene walks through the classes.
pub struct StubBackend {
    num_classes: usize,
    confidence: f32,
}

impl StubBackend {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            confidence: 0.9,
        }
    }

    /// Override the confidence reported for the chosen class.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

impl ClassifierBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.num_classes)
    }

    fn classify(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        if self.num_classes == 0 {
            return Err(anyhow!("stub backend has no classes"));
        }
        let level = (input.mean().clamp(0.0, 1.0) * 255.0).round() as usize;
        let chosen = level % self.num_classes;

        let rest = if self.num_classes > 1 {
            (1.0 - self.confidence).max(0.0) / (self.num_classes - 1) as f32
        } else {
            0.0
        };
        let mut probabilities = vec![rest; self.num_classes];
        probabilities[chosen] = self.confidence;
        Ok(probabilities)
    }
}

/// Backend that returns the same probability vector for every input.
#[derive(Clone, Debug)]
pub struct FixedBackend {
    probabilities: Vec<f32>,
    calls: u64,
}

impl FixedBackend {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self {
            probabilities,
            calls: 0,
        }
    }

    /// One-hot-ish vector: `confidence` at `index`, the remainder spread evenly.
    pub fn peaked(num_classes: usize, index: usize, confidence: f32) -> Self {
        let rest = if num_classes > 1 {
            (1.0 - confidence).max(0.0) / (num_classes - 1) as f32
        } else {
            0.0
        };
        let mut probabilities = vec![rest; num_classes];
        if let Some(slot) = probabilities.get_mut(index) {
            *slot = confidence;
        }
        Self::new(probabilities)
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl ClassifierBackend for FixedBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.probabilities.len())
    }

    fn classify(&mut self, _input: &InputTensor) -> Result<Vec<f32>> {
        self.calls += 1;
        Ok(self.probabilities.clone())
    }
}
