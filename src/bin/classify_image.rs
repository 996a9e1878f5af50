//! classify_image - run the classifier over still images
//!
//! Prints one JSON document per image on stdout.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use sign_classifier::app::{build_pipeline, load_classifier};
use sign_classifier::config::{BackendKind, SigndConfig};
use sign_classifier::ui::Ui;
use sign_classifier::{labels, Frame, PixelData, SignCatalog};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Images to classify (JPEG or PNG).
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// JSON configuration file.
    #[arg(long, env = "SIGN_CONFIG")]
    config: Option<PathBuf>,
    /// Classifier backend (tract|stub); overrides the configuration.
    #[arg(long)]
    backend: Option<BackendKind>,
    /// Clockwise rotation applied before cropping.
    #[arg(long)]
    rotation: Option<u32>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
struct ImageReport {
    path: String,
    label: Option<String>,
    class_index: Option<usize>,
    confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    localized_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), false);

    let mut cfg = SigndConfig::load_from(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        cfg.backend = backend;
    }
    let rotation = args.rotation.unwrap_or(cfg.source.rotation_degrees);
    if rotation % 90 != 0 {
        return Err(anyhow!("rotation must be a multiple of 90 degrees"));
    }

    let catalog = SignCatalog::builtin();
    let vocabulary = {
        let stage = ui.stage("Load labels");
        let vocabulary = labels::load_checked(&cfg.labels_path, &catalog)?;
        stage.finish(Some(&format!("{} classes", vocabulary.len())));
        Arc::new(vocabulary)
    };
    let mut pipeline = {
        let stage = ui.stage("Load classifier");
        let classifier = load_classifier(&cfg, &vocabulary)?;
        let name = classifier.name();
        let pipeline = build_pipeline(&cfg, classifier, vocabulary)?;
        stage.finish(Some(name));
        pipeline
    };

    let mut failures = 0usize;
    for (index, path) in args.images.iter().enumerate() {
        let report = match std::fs::read(path) {
            Ok(bytes) => {
                let frame = Frame::new(PixelData::Encoded(bytes), 0, 0, index as u64 + 1)
                    .with_rotation(rotation);
                match pipeline.analyze(&frame) {
                    Ok(result) => ImageReport {
                        path: path.display().to_string(),
                        localized_name: result
                            .label
                            .as_deref()
                            .and_then(|label| catalog.lookup(label))
                            .map(|record| record.localized_name().to_string()),
                        label: result.label,
                        class_index: result.class_index,
                        confidence: result.confidence,
                        error: None,
                    },
                    Err(err) => error_report(path, format!("{:#}", err)),
                }
            }
            Err(err) => error_report(path, format!("read image: {}", err)),
        };
        if report.error.is_some() {
            failures += 1;
        }
        println!("{}", serde_json::to_string(&report)?);
    }

    if failures > 0 {
        return Err(anyhow!(
            "{} of {} images could not be classified",
            failures,
            args.images.len()
        ));
    }
    Ok(())
}

fn error_report(path: &std::path::Path, error: String) -> ImageReport {
    ImageReport {
        path: path.display().to_string(),
        label: None,
        class_index: None,
        confidence: 0.0,
        localized_name: None,
        error: Some(error),
    }
}
