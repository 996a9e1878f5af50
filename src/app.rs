//! Application shell: wires the camera session, analysis runtime and
//! presenter together.
//!
//! The binary owns the terminal and the timers; `SignApp` owns every
//! decision those timers trigger.

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::{BackendKind, SigndConfig};
use crate::detect::{ClassifierBackend, DecisionPolicy, StubBackend};
use crate::ingest::{FrameSource, TorchControl};
use crate::labels::{LabelVocabulary, SignCatalog};
use crate::pipeline::{AnalysisRuntime, LatestResult, Pipeline, PipelineStats};
use crate::preprocess::Preprocessor;
use crate::presenter::{DisplayState, Presenter};
use crate::session::{CameraSession, PermissionProbe, PermissionState, TorchOutcome};

/// Load the configured classifier.
pub fn load_classifier(
    cfg: &SigndConfig,
    vocabulary: &LabelVocabulary,
) -> Result<Box<dyn ClassifierBackend>> {
    let mut backend: Box<dyn ClassifierBackend> = match cfg.backend {
        BackendKind::Stub => Box::new(StubBackend::new(vocabulary.len())),
        BackendKind::Tract => load_tract(cfg)?,
    };
    backend.warm_up()?;
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn load_tract(cfg: &SigndConfig) -> Result<Box<dyn ClassifierBackend>> {
    let backend = crate::detect::TractBackend::new(&cfg.model_path, cfg.classifier.input_size)?
        .with_softmax(cfg.classifier.softmax);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_cfg: &SigndConfig) -> Result<Box<dyn ClassifierBackend>> {
    Err(anyhow!(
        "tract backend requested but this build lacks the backend-tract feature"
    ))
}

/// Build the per-frame pipeline from configuration and a loaded classifier.
pub fn build_pipeline(
    cfg: &SigndConfig,
    classifier: Box<dyn ClassifierBackend>,
    vocabulary: Arc<LabelVocabulary>,
) -> Result<Pipeline> {
    Pipeline::new(
        Box::new(Preprocessor::new(cfg.classifier.input_size)),
        classifier,
        DecisionPolicy::new(cfg.classifier.threshold),
        vocabulary,
    )
}

/// The running application.
pub struct SignApp {
    session: CameraSession,
    probe: Box<dyn PermissionProbe>,
    torch: Box<dyn TorchControl>,
    latest: Arc<LatestResult>,
    presenter: Presenter,
    // Parked while analysis is stopped; moved into the runtime while it runs.
    source: Option<Box<dyn FrameSource>>,
    pipeline: Option<Pipeline>,
    runtime: Option<AnalysisRuntime>,
    connect_failures: u32,
}

impl SignApp {
    /// `pipeline` is `None` when the classifier could not be loaded; the app
    /// then stays in the unrecognized state.
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: Option<Pipeline>,
        catalog: Arc<SignCatalog>,
        threshold: f32,
    ) -> Self {
        let probe = source.permission_probe();
        let torch = source.torch();
        let session = CameraSession::new(probe.check());
        Self {
            session,
            probe,
            torch,
            latest: Arc::new(LatestResult::new()),
            presenter: Presenter::new(catalog, threshold),
            source: Some(source),
            pipeline,
            runtime: None,
            connect_failures: 0,
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.session.permission()
    }

    pub fn is_analysing(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn latest(&self) -> Arc<LatestResult> {
        Arc::clone(&self.latest)
    }

    pub fn stats(&self) -> Option<PipelineStats> {
        self.runtime.as_ref().map(AnalysisRuntime::stats)
    }

    /// Re-probe permission and start or stop analysis to match.
    pub fn sync_permission(&mut self) -> Result<()> {
        self.session.recheck(self.probe.as_ref(), self.torch.as_mut());
        match (self.session.permission().is_granted(), self.runtime.is_some()) {
            (true, false) => self.start_analysis(),
            (false, true) => self.stop_analysis(),
            _ => Ok(()),
        }
    }

    /// Recompute what the user should see.
    pub fn refresh(&mut self) -> &DisplayState {
        let latest = self.latest.snapshot();
        self.presenter.refresh(self.session.permission(), &latest)
    }

    pub fn toggle_torch(&mut self) -> TorchOutcome {
        self.session.toggle_torch(self.torch.as_mut())
    }

    /// Stop analysis and switch the torch off.
    pub fn shutdown(mut self) -> Result<()> {
        if self.session.torch_on() {
            self.toggle_torch();
        }
        if self.runtime.is_some() {
            self.stop_analysis()?;
        }
        Ok(())
    }

    fn start_analysis(&mut self) -> Result<()> {
        if self.pipeline.is_none() {
            return Ok(());
        }
        let mut source = self
            .source
            .take()
            .ok_or_else(|| anyhow!("frame source is not parked"))?;
        if let Err(err) = source.connect() {
            if self.connect_failures == 0 {
                log::warn!("camera unavailable: {:#}", err);
            } else {
                log::debug!("camera unavailable: {:#}", err);
            }
            self.connect_failures += 1;
            self.source = Some(source);
            return Ok(());
        }
        self.connect_failures = 0;

        let pipeline = self
            .pipeline
            .take()
            .ok_or_else(|| anyhow!("pipeline is not parked"))?;
        log::info!(
            "analysis started ({} on {})",
            pipeline.classifier_name(),
            source.stats().url
        );
        self.runtime = Some(AnalysisRuntime::start(
            source,
            pipeline,
            Arc::clone(&self.latest),
        )?);
        Ok(())
    }

    fn stop_analysis(&mut self) -> Result<()> {
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };
        let (source, pipeline) = runtime.stop()?;
        self.source = Some(source);
        self.pipeline = Some(pipeline);
        self.latest.reset();
        log::info!("analysis stopped");
        Ok(())
    }
}

impl Drop for SignApp {
    fn drop(&mut self) {
        if self.session.torch_on() {
            let _ = self.torch.set_torch(false);
        }
    }
}
