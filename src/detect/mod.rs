//! Classification: backends, decision policy and per-frame results.

mod backend;
mod backends;
mod decision;
mod result;

pub use backend::ClassifierBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{FixedBackend, StubBackend};
pub use decision::{argmax, Decision, DecisionPolicy, DEFAULT_THRESHOLD};
pub use result::DetectionResult;
