use std::sync::Mutex;

use tempfile::NamedTempFile;

use sign_classifier::config::{BackendKind, SigndConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SIGN_CONFIG",
        "SIGN_LABELS_PATH",
        "SIGN_MODEL_PATH",
        "SIGN_BACKEND",
        "SIGN_SOURCE_URL",
        "SIGN_ROTATION",
        "SIGN_THRESHOLD",
        "SIGN_REFRESH_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "labels_path": "/opt/signs/labels.txt",
            "model_path": "/opt/signs/model.onnx",
            "backend": "stub",
            "source": {
                "url": "stub://dashcam",
                "target_fps": 15,
                "width": 800,
                "height": 600,
                "rotation_degrees": 90
            },
            "classifier": {
                "threshold": 0.8,
                "softmax": true
            },
            "presenter": {
                "refresh_ms": 750
            }
        }"#,
    );

    std::env::set_var("SIGN_CONFIG", file.path());
    std::env::set_var("SIGN_SOURCE_URL", "/dev/video2");
    std::env::set_var("SIGN_ROTATION", "270");

    let cfg = SigndConfig::load().expect("load config");

    assert_eq!(cfg.labels_path.to_str(), Some("/opt/signs/labels.txt"));
    assert_eq!(cfg.model_path.to_str(), Some("/opt/signs/model.onnx"));
    assert_eq!(cfg.backend, BackendKind::Stub);
    assert_eq!(cfg.source.url, "/dev/video2");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.source.width, 800);
    assert_eq!(cfg.source.height, 600);
    assert_eq!(cfg.source.rotation_degrees, 270);
    assert_eq!(cfg.classifier.threshold, 0.8);
    assert_eq!(cfg.classifier.input_size, 32);
    assert!(cfg.classifier.softmax);
    assert_eq!(cfg.presenter.refresh.as_millis(), 750);
    assert_eq!(cfg.presenter.permission_recheck.as_millis(), 500);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SigndConfig::load().expect("load defaults");
    assert_eq!(cfg.labels_path.to_str(), Some("assets/labels.txt"));
    assert_eq!(cfg.backend, BackendKind::Tract);
    assert_eq!(cfg.source.url, "/dev/video0");
    assert_eq!(cfg.classifier.threshold, 0.7);
    assert_eq!(cfg.presenter.refresh.as_millis(), 1000);
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGN_THRESHOLD", "high");
    assert!(SigndConfig::load().is_err());
    clear_env();

    std::env::set_var("SIGN_THRESHOLD", "1.5");
    assert!(SigndConfig::load().is_err());
    clear_env();

    std::env::set_var("SIGN_ROTATION", "45");
    assert!(SigndConfig::load().is_err());
    clear_env();

    std::env::set_var("SIGN_BACKEND", "tflite");
    assert!(SigndConfig::load().is_err());
    clear_env();

    std::env::set_var("SIGN_REFRESH_MS", "0");
    assert!(SigndConfig::load().is_err());
    clear_env();
}

#[test]
fn malformed_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("{ \"source\": ");
    let err = SigndConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    let err = SigndConfig::load_from(Some(std::path::Path::new("/nonexistent/signd.json")))
        .unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}
