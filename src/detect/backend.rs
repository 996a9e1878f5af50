use anyhow::Result;

use crate::preprocess::InputTensor;

/// Classifier backend trait.
///
/// A backend is loaded once at startup and then called from the analysis
/// worker, one tensor at a time. Callers treat `classify` as a pure
/// function of its input; internal scratch buffers are the backend's
/// business.
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Width of the probability vector, when known ahead of the first call.
    fn num_classes(&self) -> Option<usize>;

    /// Run one inference pass over a `[1, S, S, 1]` tensor.
    fn classify(&mut self, input: &InputTensor) -> Result<Vec<f32>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
