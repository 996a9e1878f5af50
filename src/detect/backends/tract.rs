#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tract_onnx::prelude::*;

use crate::detect::backend::ClassifierBackend;
use crate::preprocess::InputTensor;

/// Tract-based backend for ONNX inference.
///
/// Loads a local model file once and runs single-channel `[1, S, S, 1]`
/// float inputs through it. The first model output is taken as the class
/// score vector.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    num_classes: Option<usize>,
    softmax: bool,
    fingerprint: String,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let bytes = std::fs::read(model_path)
            .with_context(|| format!("failed to read ONNX model {}", model_path.display()))?;
        let fingerprint = model_fingerprint(&bytes);

        let side = input_size as usize;
        let typed = tract_onnx::onnx()
            .model_for_read(&mut bytes.as_slice())
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, 1)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?;

        let num_classes = typed
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(|dims| dims.iter().product()));

        let model = typed
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded ONNX model {} (sha256 {}…, classes {})",
            model_path.display(),
            fingerprint,
            num_classes.map_or_else(|| "dynamic".to_string(), |n: usize| n.to_string())
        );

        Ok(Self {
            model,
            input_size,
            num_classes,
            softmax: false,
            fingerprint,
        })
    }

    /// Apply softmax to the raw output, for models that emit logits.
    pub fn with_softmax(mut self, softmax: bool) -> Self {
        self.softmax = softmax;
        self
    }

    /// Short content hash of the loaded model file.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn build_input(&self, input: &InputTensor) -> Result<Tensor> {
        if input.size() != self.input_size {
            return Err(anyhow!(
                "input tensor side {} does not match model input {}",
                input.size(),
                self.input_size
            ));
        }
        let side = self.input_size as usize;
        let array = tract_ndarray::Array4::from_shape_vec(
            (1, side, side, 1),
            input.as_slice().to_vec(),
        )
        .context("failed to shape input tensor")?;
        Ok(array.into_tensor())
    }

    fn extract_scores(&self, outputs: TVec<TValue>) -> Result<Vec<f32>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .iter()
            .copied()
            .collect();
        if self.softmax {
            Ok(softmax(&scores))
        } else {
            Ok(scores)
        }
    }
}

impl ClassifierBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    fn classify(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        self.extract_scores(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = InputTensor::filled(self.input_size, 0.0);
        self.classify(&blank).map(|_| ())
    }
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; scores.len()];
    }
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// First 8 bytes of the model's SHA-256, hex encoded.
fn model_fingerprint(bytes: &[u8]) -> String {
    hex::encode(&Sha256::digest(bytes)[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_load_error() {
        let err = TractBackend::new("/nonexistent/model.onnx", 32)
            .err()
            .expect("load must fail");
        assert!(err.to_string().contains("failed to read ONNX model"));
    }

    #[test]
    fn fingerprint_is_sha256_prefix() {
        assert_eq!(model_fingerprint(b""), "e3b0c44298fc1c14");
        assert_eq!(model_fingerprint(b"abc"), "ba7816bf8f01cfea");
    }

    #[test]
    fn softmax_normalizes_logits() {
        let probabilities = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probabilities[2] > probabilities[1] && probabilities[1] > probabilities[0]);
        assert_eq!(softmax(&[]), Vec::<f32>::new());
    }
}
