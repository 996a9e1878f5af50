//! Frame ingestion sources.
//!
//! This module provides the sources the capture thread pulls frames from:
//! - Synthetic scenes (`stub://<name>`, testing and demos)
//! - Local still images, a single file or a directory (looped)
//! - USB/V4L2 camera devices (feature: ingest-v4l2)
//!
//! Sources never reach the network. Any `scheme://` other than `stub://`
//! is rejected.
//!
//! Every source also exposes the camera-side controls the session layer
//! needs: a torch handle and a permission probe.

pub mod file;
pub(crate) mod normalize;
pub mod stub;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::session::PermissionProbe;

pub use file::FileSource;
pub use stub::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Configuration shared by all sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    /// `stub://<name>`, a `/dev/video*` node, or a local image path.
    pub url: String,
    /// Target frame rate. Synthetic and file sources pace themselves to it.
    pub target_fps: u32,
    /// Preferred capture width.
    pub width: u32,
    /// Preferred capture height.
    pub height: u32,
    /// Clockwise rotation stamped on every captured frame.
    pub rotation_degrees: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            rotation_degrees: 0,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// A camera-like producer of frames.
pub trait FrameSource: Send {
    /// Open the underlying device or file set.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame. Blocks until one is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;

    /// Handle for the illumination LED. Usable while the source is capturing
    /// on another thread.
    fn torch(&self) -> Box<dyn TorchControl>;

    /// Probe for access to the underlying camera.
    fn permission_probe(&self) -> Box<dyn PermissionProbe>;
}

/// Camera torch/flash control.
pub trait TorchControl: Send {
    fn has_flash_unit(&self) -> bool;

    fn set_torch(&mut self, on: bool) -> Result<()>;
}

/// Torch handle for sources without a flash unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTorch;

impl TorchControl for NoTorch {
    fn has_flash_unit(&self) -> bool {
        false
    }

    fn set_torch(&mut self, _on: bool) -> Result<()> {
        Err(anyhow!("no flash unit"))
    }
}

/// Open the source named by `config.url`.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    let url = config.url.trim();
    if url.is_empty() {
        return Err(anyhow!("source url must not be empty"));
    }
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if url.contains("://") {
        return Err(anyhow!(
            "unsupported source url {} (only stub://, /dev/video* and local paths)",
            url
        ));
    }
    if url.starts_with("/dev/video") {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Source::new(config)));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(anyhow!(
                "camera capture from {} requires the ingest-v4l2 feature",
                url
            ));
        }
    }
    Ok(Box::new(FileSource::new(config)?))
}

/// Sleeps between frames so self-driven sources match their target rate.
pub(crate) struct FramePacer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl FramePacer {
    pub(crate) fn new(target_fps: u32) -> Self {
        let interval = (target_fps > 0).then(|| Duration::from_secs(1) / target_fps);
        Self {
            interval,
            next_due: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        let due = match self.next_due {
            Some(due) if due > now => {
                std::thread::sleep(due - now);
                due
            }
            _ => now,
        };
        self.next_due = Some(due + interval);
    }
}
