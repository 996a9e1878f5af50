use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};

use sign_classifier::detect::FixedBackend;
use sign_classifier::ingest::{NoTorch, SourceStats};
use sign_classifier::labels::load_checked;
use sign_classifier::session::PermissionProbe;
use sign_classifier::{
    ClassifierBackend, DecisionPolicy, DisplayState, Frame, FrameSource, InputTensor,
    LabelVocabulary, PermissionState, Pipeline, PixelData, Preprocessor, Presenter, SignApp,
    SignCatalog, TorchControl,
};

const LABELS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/labels.txt");
const STOP_INDEX: usize = 14;

fn encoded_sign() -> Vec<u8> {
    let image = RgbImage::from_fn(96, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgb([200, 30, 30])
        } else {
            Rgb([240, 240, 240])
        }
    });
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

fn vocabulary() -> Arc<LabelVocabulary> {
    Arc::new(load_checked(LABELS, &SignCatalog::builtin()).expect("bundled labels"))
}

/// Counts classify calls from outside the pipeline.
struct CountingBackend {
    inner: FixedBackend,
    calls: Arc<AtomicU64>,
}

impl ClassifierBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn num_classes(&self) -> Option<usize> {
        self.inner.num_classes()
    }

    fn classify(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.classify(input)
    }
}

struct SwitchProbe(Arc<AtomicBool>);

impl PermissionProbe for SwitchProbe {
    fn check(&self) -> PermissionState {
        if self.0.load(Ordering::SeqCst) {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

/// Camera stand-in replaying one encoded frame, gated by a permission switch.
struct FakeCamera {
    frame: Vec<u8>,
    granted: Arc<AtomicBool>,
    captured: u64,
}

impl FrameSource for FakeCamera {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        std::thread::sleep(Duration::from_millis(5));
        self.captured += 1;
        Ok(Frame::new(
            PixelData::Encoded(self.frame.clone()),
            96,
            64,
            self.captured,
        ))
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.captured,
            url: "fake://camera".to_string(),
        }
    }

    fn torch(&self) -> Box<dyn TorchControl> {
        Box::new(NoTorch)
    }

    fn permission_probe(&self) -> Box<dyn PermissionProbe> {
        Box::new(SwitchProbe(Arc::clone(&self.granted)))
    }
}

fn counting_pipeline(calls: &Arc<AtomicU64>) -> Pipeline {
    Pipeline::new(
        Box::new(Preprocessor::default()),
        Box::new(CountingBackend {
            inner: FixedBackend::peaked(43, STOP_INDEX, 0.95),
            calls: Arc::clone(calls),
        }),
        DecisionPolicy::default(),
        vocabulary(),
    )
    .expect("pipeline")
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn stop_sign_is_presented_as_berhenti() -> Result<()> {
    let catalog = Arc::new(SignCatalog::builtin());
    let mut pipeline = Pipeline::new(
        Box::new(Preprocessor::default()),
        Box::new(FixedBackend::peaked(43, STOP_INDEX, 0.95)),
        DecisionPolicy::default(),
        vocabulary(),
    )?;
    let frame = Frame::new(PixelData::Encoded(encoded_sign()), 96, 64, 1).with_rotation(90);

    let result = pipeline.analyze(&frame)?;
    assert_eq!(result.label.as_deref(), Some("Stop"));
    assert_eq!(result.class_index, Some(STOP_INDEX));

    let mut presenter = Presenter::new(Arc::clone(&catalog), 0.7);
    let rendered = presenter
        .refresh(PermissionState::Granted, &result)
        .render();
    let stop = catalog.lookup("Stop").expect("stop record");
    assert_eq!(rendered.headline, "Berhenti");
    assert_eq!(rendered.body, stop.explanation());
    Ok(())
}

#[test]
fn denied_permission_never_invokes_pipeline() -> Result<()> {
    let calls = Arc::new(AtomicU64::new(0));
    let granted = Arc::new(AtomicBool::new(false));
    let camera = FakeCamera {
        frame: encoded_sign(),
        granted: Arc::clone(&granted),
        captured: 0,
    };
    let mut app = SignApp::new(
        Box::new(camera),
        Some(counting_pipeline(&calls)),
        Arc::new(SignCatalog::builtin()),
        0.7,
    );

    for _ in 0..5 {
        app.sync_permission()?;
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!app.is_analysing());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.refresh(), &DisplayState::PermissionRequired);
    app.shutdown()
}

#[test]
fn revoked_permission_hides_stale_result() -> Result<()> {
    let calls = Arc::new(AtomicU64::new(0));
    let granted = Arc::new(AtomicBool::new(true));
    let camera = FakeCamera {
        frame: encoded_sign(),
        granted: Arc::clone(&granted),
        captured: 0,
    };
    let mut app = SignApp::new(
        Box::new(camera),
        Some(counting_pipeline(&calls)),
        Arc::new(SignCatalog::builtin()),
        0.7,
    );
    app.sync_permission()?;
    assert!(app.is_analysing());
    assert!(wait_for(|| matches!(app.refresh(), DisplayState::Recognized(_))));

    granted.store(false, Ordering::SeqCst);
    app.sync_permission()?;
    assert!(!app.is_analysing());
    assert_eq!(app.refresh(), &DisplayState::PermissionRequired);
    assert!(!app.latest().snapshot().is_recognized());

    let after_stop = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(calls.load(Ordering::SeqCst), after_stop);

    granted.store(true, Ordering::SeqCst);
    app.sync_permission()?;
    assert!(app.is_analysing());
    assert!(wait_for(|| calls.load(Ordering::SeqCst) > after_stop));
    app.shutdown()
}

#[test]
fn threshold_is_strict_and_ties_pick_lowest_index() {
    let policy = DecisionPolicy::default();
    assert_eq!(policy.decide(&[0.2, 0.71, 0.71]).index(), Some(1));
    assert_eq!(policy.decide(&[0.5, 0.5]).index(), None);
    assert_eq!(policy.decide(&[0.1, 0.7, 0.2]).index(), None);
    assert_eq!(policy.decide(&[0.1, 0.7, 0.2]).confidence(), 0.7);
}

#[test]
fn preprocessing_is_deterministic_for_encoded_frames() -> Result<()> {
    use sign_classifier::FrameTransform;

    let frame = Frame::new(PixelData::Encoded(encoded_sign()), 96, 64, 1).with_rotation(180);
    let preprocessor = Preprocessor::default();
    let first = preprocessor.prepare(&frame)?;
    let second = preprocessor.prepare(&frame)?;
    assert_eq!(first.shape(), [1, 32, 32, 1]);
    assert_eq!(first, second);
    assert!(first.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    Ok(())
}
