//! Local still-image frame source.
//!
//! `FileSource` replays one image file, or every image in a directory in
//! name order, as a looping camera feed. Files are read fresh on every tick
//! and handed on still encoded; decoding happens during pre-processing so
//! an unreadable image only costs that one tick.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FramePacer, FrameSource, NoTorch, SourceConfig, SourceStats, TorchControl};
use crate::frame::{Frame, PixelData};
use crate::session::{DeviceAccessProbe, PermissionProbe};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Local file frame source.
pub struct FileSource {
    config: SourceConfig,
    root: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    last_error: Option<String>,
    pacer: FramePacer,
}

impl FileSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if !is_local_file_path(&config.url) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let pacer = FramePacer::new(config.target_fps);
        Ok(Self {
            root: PathBuf::from(config.url.trim()),
            config,
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            last_error: None,
            pacer,
        })
    }

    /// Files in replay order. Empty until `connect`.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        self.files = list_images(&self.root)?;
        if self.files.is_empty() {
            return Err(anyhow!("no images found at {}", self.root.display()));
        }
        self.cursor = 0;
        log::info!(
            "FileSource: connected to {} ({} images)",
            self.root.display(),
            self.files.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.files.is_empty() {
            return Err(anyhow!("file source not connected"));
        }
        self.pacer.wait();

        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(anyhow::Error::new(err)
                    .context(format!("read image {}", path.display())));
            }
        };
        self.last_error = None;
        self.frame_count += 1;

        Ok(Frame::new(
            PixelData::Encoded(bytes),
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .with_rotation(self.config.rotation_degrees))
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none() && !self.files.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn torch(&self) -> Box<dyn TorchControl> {
        Box::new(NoTorch)
    }

    fn permission_probe(&self) -> Box<dyn PermissionProbe> {
        Box::new(DeviceAccessProbe::read_only(&self.root))
    }
}

fn list_images(root: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("failed to stat image source {}", root.display()))?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("failed to list image directory {}", root.display()))?
    {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(path: &Path) -> SourceConfig {
        SourceConfig {
            url: path.display().to_string(),
            target_fps: 0,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn directory_is_replayed_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.png"), b"second")?;
        fs::write(dir.path().join("a.JPG"), b"first")?;
        fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let mut source = FileSource::new(config_for(dir.path()))?;
        source.connect()?;
        assert_eq!(source.files().len(), 2);

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        let third = source.next_frame()?;
        assert_eq!(first.pixels(), &PixelData::Encoded(b"first".to_vec()));
        assert_eq!(second.pixels(), &PixelData::Encoded(b"second".to_vec()));
        assert_eq!(third.pixels(), first.pixels());
        assert_eq!(third.sequence, 3);
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_connect() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = FileSource::new(config_for(dir.path()))?;
        assert!(source.connect().is_err());
        assert!(source.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn url_schemes_are_rejected() {
        let config = SourceConfig {
            url: "file://tmp/a.png".to_string(),
            ..SourceConfig::default()
        };
        assert!(FileSource::new(config).is_err());
    }

    #[test]
    fn file_source_has_no_flash() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = FileSource::new(config_for(dir.path()))?;
        assert!(!source.torch().has_flash_unit());
        Ok(())
    }
}
