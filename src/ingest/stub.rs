//! Synthetic frame source (`stub://` URLs).
//!
//! Produces flat gray scenes whose level steps every `FRAMES_PER_SCENE`
//! frames. Flat frames survive pre-processing unchanged in level, which
//! makes the stub classifier walk through the classes as the scene changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use super::{FramePacer, FrameSource, SourceConfig, SourceStats, TorchControl};
use crate::frame::{Frame, PixelData};
use crate::session::{PermissionProbe, PermissionState, StaticPermission};

const FRAMES_PER_SCENE: u64 = 50;

/// Synthetic source for tests and demos.
pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    scene_state: u8,
    torch: Arc<AtomicBool>,
    pacer: FramePacer,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        let pacer = FramePacer::new(config.target_fps);
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
            torch: Arc::new(AtomicBool::new(false)),
            pacer,
        }
    }

    /// Whether the simulated torch is lit.
    pub fn torch_on(&self) -> bool {
        self.torch.load(Ordering::Relaxed)
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        if self.frame_count % FRAMES_PER_SCENE == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        vec![self.scene_state; pixel_count]
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.pacer.wait();
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Frame::new(
            PixelData::Rgb24(pixels),
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .with_rotation(self.config.rotation_degrees))
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn torch(&self) -> Box<dyn TorchControl> {
        Box::new(SyntheticTorch {
            lit: Arc::clone(&self.torch),
        })
    }

    fn permission_probe(&self) -> Box<dyn PermissionProbe> {
        Box::new(StaticPermission(PermissionState::Granted))
    }
}

struct SyntheticTorch {
    lit: Arc<AtomicBool>,
}

impl TorchControl for SyntheticTorch {
    fn has_flash_unit(&self) -> bool {
        true
    }

    fn set_torch(&mut self, on: bool) -> Result<()> {
        self.lit.store(on, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> SourceConfig {
        SourceConfig {
            url: "stub://test".to_string(),
            target_fps: 0,
            width: 64,
            height: 48,
            rotation_degrees: 90,
        }
    }

    #[test]
    fn synthetic_source_produces_numbered_frames() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.connect()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_eq!((first.width, first.height), (64, 48));
        assert_eq!(first.rotation_degrees, 90);
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn scene_level_steps_periodically() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        let first = source.next_frame()?;
        for _ in 1..FRAMES_PER_SCENE {
            source.next_frame()?;
        }
        let changed = source.next_frame()?;
        assert_ne!(first.pixels(), changed.pixels());
        Ok(())
    }

    #[test]
    fn torch_handle_drives_simulated_led() -> Result<()> {
        let source = SyntheticSource::new(stub_config());
        let mut torch = source.torch();
        assert!(torch.has_flash_unit());
        torch.set_torch(true)?;
        assert!(source.torch_on());
        torch.set_torch(false)?;
        assert!(!source.torch_on());
        Ok(())
    }
}
