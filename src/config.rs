use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::DEFAULT_THRESHOLD;
use crate::ingest::SourceConfig;
use crate::preprocess::INPUT_SIZE;

const DEFAULT_LABELS_PATH: &str = "assets/labels.txt";
const DEFAULT_MODEL_PATH: &str = "assets/model_trained.onnx";
const DEFAULT_SOURCE_URL: &str = "/dev/video0";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_REFRESH_MS: u64 = 1000;
const DEFAULT_PERMISSION_RECHECK_MS: u64 = 500;

#[derive(Debug, Deserialize, Default)]
struct SigndConfigFile {
    labels_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    backend: Option<String>,
    source: Option<SourceConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    presenter: Option<PresenterConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    rotation_degrees: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    threshold: Option<f32>,
    input_size: Option<u32>,
    softmax: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct PresenterConfigFile {
    refresh_ms: Option<u64>,
    permission_recheck_ms: Option<u64>,
}

/// Which classifier implementation to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// ONNX model through tract.
    Tract,
    /// Deterministic stand-in that needs no model file.
    Stub,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(BackendKind::Tract),
            "stub" => Ok(BackendKind::Stub),
            other => Err(anyhow!(
                "unknown classifier backend '{}' (expected tract or stub)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SigndConfig {
    pub labels_path: PathBuf,
    pub model_path: PathBuf,
    pub backend: BackendKind,
    pub source: SourceConfig,
    pub classifier: ClassifierSettings,
    pub presenter: PresenterSettings,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierSettings {
    pub threshold: f32,
    pub input_size: u32,
    /// Apply softmax to raw model outputs.
    pub softmax: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PresenterSettings {
    pub refresh: Duration,
    pub permission_recheck: Duration,
}

impl SigndConfig {
    /// Load from `$SIGN_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SIGN_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (or defaults), then environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Replace the capture source, keeping the other source settings.
    pub fn override_source(&mut self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        self.source.url = url.trim().to_string();
        Ok(())
    }

    fn from_file(file: SigndConfigFile) -> Result<Self> {
        let backend = match file.backend.as_deref() {
            Some(name) => name.parse()?,
            None => BackendKind::Tract,
        };
        let source = file.source.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        let presenter = file.presenter.unwrap_or_default();
        Ok(Self {
            labels_path: file
                .labels_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            model_path: file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            backend,
            source: SourceConfig {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                rotation_degrees: source.rotation_degrees.unwrap_or(0),
            },
            classifier: ClassifierSettings {
                threshold: classifier.threshold.unwrap_or(DEFAULT_THRESHOLD),
                input_size: classifier.input_size.unwrap_or(INPUT_SIZE),
                softmax: classifier.softmax.unwrap_or(false),
            },
            presenter: PresenterSettings {
                refresh: Duration::from_millis(presenter.refresh_ms.unwrap_or(DEFAULT_REFRESH_MS)),
                permission_recheck: Duration::from_millis(
                    presenter
                        .permission_recheck_ms
                        .unwrap_or(DEFAULT_PERMISSION_RECHECK_MS),
                ),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SIGN_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.labels_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("SIGN_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("SIGN_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend.parse()?;
            }
        }
        if let Ok(url) = std::env::var("SIGN_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(rotation) = std::env::var("SIGN_ROTATION") {
            self.source.rotation_degrees = rotation
                .trim()
                .parse()
                .map_err(|_| anyhow!("SIGN_ROTATION must be a whole number of degrees"))?;
        }
        if let Ok(threshold) = std::env::var("SIGN_THRESHOLD") {
            self.classifier.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("SIGN_THRESHOLD must be a number"))?;
        }
        if let Ok(refresh) = std::env::var("SIGN_REFRESH_MS") {
            let millis: u64 = refresh.trim().parse().map_err(|_| {
                anyhow!("SIGN_REFRESH_MS must be an integer number of milliseconds")
            })?;
            self.presenter.refresh = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let threshold = self.classifier.threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(anyhow!("classifier threshold must be in [0, 1), got {}", threshold));
        }
        if self.source.rotation_degrees % 90 != 0 {
            return Err(anyhow!(
                "rotation must be a multiple of 90 degrees, got {}",
                self.source.rotation_degrees
            ));
        }
        self.source.rotation_degrees %= 360;
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.classifier.input_size == 0 {
            return Err(anyhow!("classifier input_size must be greater than zero"));
        }
        if self.presenter.refresh.is_zero() || self.presenter.permission_recheck.is_zero() {
            return Err(anyhow!("presenter intervals must be greater than zero"));
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SigndConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
