//! Traffic Sign Classifier
//!
//! Points a camera at the road, classifies what it sees against the 43
//! German Traffic Sign Recognition Benchmark classes, and shows the
//! recognised sign with a short Indonesian explanation.
//!
//! # Architecture
//!
//! Frames flow one way:
//!
//! 1. **Capture**: a `FrameSource` pushes into a keep-latest slot; frames
//!    the worker has not reached yet are replaced, never queued.
//! 2. **Pre-process**: rotate upright, crop the central quarter, BT.601
//!    luma, histogram equalisation, resize to 32×32, scale to `[0, 1]`.
//! 3. **Classify**: a `ClassifierBackend` maps the `[1, 32, 32, 1]` tensor
//!    to one probability per vocabulary entry.
//! 4. **Decide**: top-1 strictly above the threshold (0.7), else
//!    unrecognized.
//! 5. **Present**: the newest result is swapped in as an immutable snapshot
//!    and polled once a second.
//!
//! # Module Structure
//!
//! - `frame`: captured frames and the keep-latest slot
//! - `ingest`: frame sources (synthetic, local images, V4L2)
//! - `preprocess`: frame → input tensor
//! - `detect`: classifier backends, decision policy, results
//! - `labels`: vocabulary file and the built-in sign catalog
//! - `pipeline`: per-frame analysis and the capture/analysis threads
//! - `session`: camera permission and torch state
//! - `presenter`: display states and terminal rendering
//! - `app`: ties the above together for the `signd` binary

pub mod app;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod pipeline;
pub mod preprocess;
pub mod presenter;
pub mod session;
pub mod ui;

pub use app::SignApp;
pub use detect::{ClassifierBackend, Decision, DecisionPolicy, DetectionResult, DEFAULT_THRESHOLD};
pub use frame::{Frame, LatestFrameSlot, PixelData};
pub use ingest::{open_source, FrameSource, SourceConfig, TorchControl};
pub use labels::{LabelVocabulary, SignCatalog, SignRecord};
pub use pipeline::{AnalysisRuntime, LatestResult, Pipeline, PipelineStats};
pub use preprocess::{FrameTransform, InputTensor, Preprocessor, INPUT_SIZE};
pub use presenter::{DisplayState, Presenter};
pub use session::{CameraSession, PermissionProbe, PermissionState, TorchOutcome};
