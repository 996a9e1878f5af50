//! V4L2 frame source.
//!
//! This module provides `V4l2Source` for capturing frames from local V4L2
//! camera devices (e.g., /dev/video0). Frames are handed on in the device's
//! native layout (RGB24, YUYV, NV12 or MJPEG); conversion happens during
//! pre-processing.
//!
//! Torch control goes through a second handle on the same device node, using
//! the standard flash LED mode control when the driver exposes one.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::{FrameSource, NoTorch, SourceConfig, SourceStats, TorchControl};
use crate::frame::{Frame, PixelData};
use crate::session::{DeviceAccessProbe, PermissionProbe};

/// V4L2_CID_FLASH_LED_MODE
const CID_FLASH_LED_MODE: u32 = 0x009c_0901;
const FLASH_LED_MODE_NONE: i64 = 0;
const FLASH_LED_MODE_TORCH: i64 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NativeFormat {
    Rgb24,
    Yuyv,
    Nv12,
    Mjpeg,
}

impl NativeFormat {
    fn from_fourcc(fourcc: v4l::FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"RGB3" => Some(NativeFormat::Rgb24),
            b"YUYV" => Some(NativeFormat::Yuyv),
            b"NV12" => Some(NativeFormat::Nv12),
            b"MJPG" => Some(NativeFormat::Mjpeg),
            _ => None,
        }
    }

    fn wrap(self, bytes: Vec<u8>) -> PixelData {
        match self {
            NativeFormat::Rgb24 => PixelData::Rgb24(bytes),
            NativeFormat::Yuyv => PixelData::Yuyv(bytes),
            NativeFormat::Nv12 => PixelData::Nv12(bytes),
            NativeFormat::Mjpeg => PixelData::Encoded(bytes),
        }
    }
}

/// V4L2 frame source backed by libv4l.
pub struct V4l2Source {
    config: SourceConfig,
    state: Option<V4l2State>,
    format: NativeFormat,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: NativeFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.url)
            .with_context(|| format!("open v4l2 device {}", self.config.url))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.url,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.format = NativeFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} uses unsupported pixel format {}",
                self.config.url,
                format.fourcc
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.url,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.url,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        // MJPEG buffers are only partially filled.
        let used = (meta.bytesused as usize).min(buf.len());
        let bytes = if used > 0 { buf[..used].to_vec() } else { buf.to_vec() };

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;

        Ok(Frame::new(
            self.format.wrap(bytes),
            self.active_width,
            self.active_height,
            self.frame_count,
        )
        .with_rotation(self.config.rotation_degrees))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn torch(&self) -> Box<dyn TorchControl> {
        match V4l2Torch::open(&self.config.url) {
            Ok(Some(torch)) => Box::new(torch),
            Ok(None) => Box::new(NoTorch),
            Err(err) => {
                log::debug!("V4l2Source: torch unavailable on {}: {}", self.config.url, err);
                Box::new(NoTorch)
            }
        }
    }

    fn permission_probe(&self) -> Box<dyn PermissionProbe> {
        Box::new(DeviceAccessProbe::read_write(Path::new(&self.config.url)))
    }
}

/// Torch handle using the V4L2 flash LED mode control.
struct V4l2Torch {
    device: v4l::Device,
}

impl V4l2Torch {
    /// Returns `None` when the driver has no flash LED control.
    fn open(path: &str) -> Result<Option<Self>> {
        let device =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {}", path))?;
        let controls = device
            .query_controls()
            .context("query v4l2 controls")?;
        if controls.iter().any(|desc| desc.id == CID_FLASH_LED_MODE) {
            Ok(Some(Self { device }))
        } else {
            Ok(None)
        }
    }
}

impl TorchControl for V4l2Torch {
    fn has_flash_unit(&self) -> bool {
        true
    }

    fn set_torch(&mut self, on: bool) -> Result<()> {
        let mode = if on {
            FLASH_LED_MODE_TORCH
        } else {
            FLASH_LED_MODE_NONE
        };
        self.device
            .set_control(v4l::control::Control {
                id: CID_FLASH_LED_MODE,
                value: v4l::control::Value::Integer(mode),
            })
            .context("set v4l2 flash led mode")
    }
}
