use std::sync::Mutex;

use tempfile::NamedTempFile;

use helmwatch::{HelmwatchConfig, SourceKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HELMWATCH_CONFIG",
        "HELMWATCH_THRESHOLD",
        "HELMWATCH_SOURCE",
        "HELMWATCH_INPUT",
        "HELMWATCH_DISPLAY_SIZE",
        "HELMWATCH_BACKEND",
        "HELMWATCH_MODEL",
        "HELMWATCH_OUTPUT",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "confidence_threshold": 0.55,
        "source": "video",
        "input": "/data/site.mp4",
        "display_size": "1280x720",
        "backend": "stub",
        "output": "annotated"
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("HELMWATCH_CONFIG", file.path());
    std::env::set_var("HELMWATCH_SOURCE", "camera");
    std::env::set_var("HELMWATCH_INPUT", "stub://cam");

    let cfg = HelmwatchConfig::load().expect("load config");

    assert_eq!(cfg.confidence_threshold, 0.55);
    assert_eq!(cfg.source_kind, SourceKind::Camera);
    assert_eq!(cfg.input, "stub://cam");
    assert_eq!(cfg.display_size, Some((1280, 720)));
    assert_eq!(cfg.backend, "stub");
    assert_eq!(cfg.output, "annotated");

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = HelmwatchConfig::load().expect("load config");

    assert_eq!(cfg.confidence_threshold, 0.4);
    assert_eq!(cfg.source_kind, SourceKind::Camera);
    assert_eq!(cfg.input, "stub://cam");
    assert_eq!(cfg.display_size, None);
    assert_eq!(cfg.backend, "stub");

    clear_env();
}

#[test]
fn out_of_range_threshold_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HELMWATCH_THRESHOLD", "1.5");
    assert!(HelmwatchConfig::load().is_err());

    std::env::set_var("HELMWATCH_THRESHOLD", "0");
    assert!(HelmwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn tract_backend_requires_model_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HELMWATCH_BACKEND", "tract");
    assert!(HelmwatchConfig::load().is_err());

    std::env::set_var("HELMWATCH_MODEL", "/models/helmet.onnx");
    let cfg = HelmwatchConfig::load().expect("load config");
    assert_eq!(cfg.backend, "tract");
    assert_eq!(cfg.model_path.as_deref(), Some("/models/helmet.onnx"));

    clear_env();
}
