//! Per-frame analysis and the threads that drive it.
//!
//! - `Pipeline`: pre-process → classify → decide for one frame.
//! - `LatestResult`: the single slot the presenter polls. Each result is an
//!   immutable snapshot swapped in whole.
//! - `AnalysisRuntime`: one capture thread feeding a keep-latest slot and one
//!   worker thread draining it, strictly one frame at a time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::detect::{ClassifierBackend, DecisionPolicy, DetectionResult};
use crate::frame::{Frame, LatestFrameSlot};
use crate::ingest::FrameSource;
use crate::labels::LabelVocabulary;
use crate::preprocess::FrameTransform;

const WORKER_POLL: Duration = Duration::from_millis(100);
const CAPTURE_RETRY_BACKOFF: Duration = Duration::from_millis(200);

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

/// Frame → decision for a single frame.
pub struct Pipeline {
    transform: Box<dyn FrameTransform>,
    classifier: Box<dyn ClassifierBackend>,
    policy: DecisionPolicy,
    vocabulary: Arc<LabelVocabulary>,
}

impl Pipeline {
    /// Assemble a pipeline. Fails when the classifier's known output width
    /// disagrees with the vocabulary.
    pub fn new(
        transform: Box<dyn FrameTransform>,
        classifier: Box<dyn ClassifierBackend>,
        policy: DecisionPolicy,
        vocabulary: Arc<LabelVocabulary>,
    ) -> Result<Self> {
        if let Some(num_classes) = classifier.num_classes() {
            vocabulary
                .ensure_width(num_classes)
                .with_context(|| format!("classifier '{}'", classifier.name()))?;
        }
        Ok(Self {
            transform,
            classifier,
            policy,
            vocabulary,
        })
    }

    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Analyse one frame.
    ///
    /// Errors mean the frame is skipped; they never describe a decision.
    pub fn analyze(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let input = self
            .transform
            .prepare(frame)
            .with_context(|| format!("pre-process frame {}", frame.sequence))?;
        let probabilities = self
            .classifier
            .classify(&input)
            .with_context(|| format!("classify frame {}", frame.sequence))?;
        self.vocabulary.ensure_width(probabilities.len())?;
        Ok(self
            .policy
            .resolve(&probabilities, &self.vocabulary, frame.sequence))
    }
}

// ----------------------------------------------------------------------------
// LatestResult
// ----------------------------------------------------------------------------

/// Last-write-wins slot holding the newest detection.
#[derive(Debug, Default)]
pub struct LatestResult {
    slot: RwLock<Arc<DetectionResult>>,
}

impl LatestResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, result: DetectionResult) {
        let snapshot = Arc::new(result);
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn snapshot(&self) -> Arc<DetectionResult> {
        Arc::clone(&self.slot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Forget the last detection.
    pub fn reset(&self) {
        self.publish(DetectionResult::default());
    }
}

// ----------------------------------------------------------------------------
// AnalysisRuntime
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    captured: AtomicU64,
    capture_errors: AtomicU64,
    analysed: AtomicU64,
    skipped: AtomicU64,
}

/// Snapshot of runtime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub capture_errors: u64,
    /// Frames replaced in the slot before the worker reached them.
    pub frames_dropped: u64,
    pub frames_analysed: u64,
    /// Frames the pipeline could not analyse (decode or inference errors).
    pub frames_skipped: u64,
}

/// Running capture + analysis threads.
pub struct AnalysisRuntime {
    stop: Arc<AtomicBool>,
    slot: Arc<LatestFrameSlot>,
    counters: Arc<Counters>,
    capture: Option<JoinHandle<Box<dyn FrameSource>>>,
    worker: Option<JoinHandle<Pipeline>>,
}

impl AnalysisRuntime {
    /// Spawn both threads. The source must already be connected.
    pub fn start(
        source: Box<dyn FrameSource>,
        pipeline: Pipeline,
        latest: Arc<LatestResult>,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(LatestFrameSlot::new());
        let counters = Arc::new(Counters::default());

        let worker = {
            let stop = Arc::clone(&stop);
            let slot = Arc::clone(&slot);
            let counters = Arc::clone(&counters);
            std::thread::Builder::new()
                .name("analysis".into())
                .spawn(move || run_worker(pipeline, &slot, &latest, &counters, &stop))
                .context("spawn analysis worker")?
        };

        let capture = {
            let stop = Arc::clone(&stop);
            let slot = Arc::clone(&slot);
            let counters = Arc::clone(&counters);
            std::thread::Builder::new()
                .name("capture".into())
                .spawn(move || run_capture(source, &slot, &counters, &stop))
        };
        let capture = match capture {
            Ok(handle) => handle,
            Err(err) => {
                stop.store(true, Ordering::SeqCst);
                slot.close();
                let _ = worker.join();
                return Err(anyhow::Error::new(err).context("spawn capture thread"));
            }
        };

        Ok(Self {
            stop,
            slot,
            counters,
            capture: Some(capture),
            worker: Some(worker),
        })
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.counters.captured.load(Ordering::Relaxed),
            capture_errors: self.counters.capture_errors.load(Ordering::Relaxed),
            frames_dropped: self.slot.stats().dropped,
            frames_analysed: self.counters.analysed.load(Ordering::Relaxed),
            frames_skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Stop both threads and hand back the source and pipeline.
    ///
    /// A source blocked in `next_frame` is only noticed after that call
    /// returns.
    pub fn stop(mut self) -> Result<(Box<dyn FrameSource>, Pipeline)> {
        self.signal_stop();
        let worker = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("analysis worker already joined"))?;
        let capture = self
            .capture
            .take()
            .ok_or_else(|| anyhow!("capture thread already joined"))?;
        let pipeline = worker
            .join()
            .map_err(|_| anyhow!("analysis worker panicked"))?;
        let source = capture
            .join()
            .map_err(|_| anyhow!("capture thread panicked"))?;
        Ok((source, pipeline))
    }

    fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.slot.close();
    }
}

impl Drop for AnalysisRuntime {
    fn drop(&mut self) {
        self.signal_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(capture) = self.capture.take() {
            let _ = capture.join();
        }
    }
}

fn run_capture(
    mut source: Box<dyn FrameSource>,
    slot: &LatestFrameSlot,
    counters: &Counters,
    stop: &AtomicBool,
) -> Box<dyn FrameSource> {
    while !stop.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(frame) => {
                counters.captured.fetch_add(1, Ordering::Relaxed);
                if !slot.push(frame) {
                    break;
                }
            }
            Err(err) => {
                let errors = counters.capture_errors.fetch_add(1, Ordering::Relaxed);
                if errors == 0 {
                    log::warn!("capture failed: {:#}", err);
                } else {
                    log::debug!("capture failed: {:#}", err);
                }
                std::thread::sleep(CAPTURE_RETRY_BACKOFF);
            }
        }
    }
    log::debug!("capture thread stopped");
    source
}

fn run_worker(
    mut pipeline: Pipeline,
    slot: &LatestFrameSlot,
    latest: &LatestResult,
    counters: &Counters,
    stop: &AtomicBool,
) -> Pipeline {
    while !stop.load(Ordering::SeqCst) {
        let Some(frame) = slot.take_timeout(WORKER_POLL) else {
            if slot.is_closed() {
                break;
            }
            continue;
        };
        match pipeline.analyze(&frame) {
            Ok(result) => {
                counters.analysed.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "frame {}: label={:?} conf={:.2} age={}ms",
                    result.sequence,
                    result.label,
                    result.confidence,
                    frame.age().as_millis()
                );
                latest.publish(result);
            }
            Err(err) => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                log::debug!("frame skipped: {:#}", err);
            }
        }
    }
    log::debug!("analysis worker stopped");
    pipeline
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
