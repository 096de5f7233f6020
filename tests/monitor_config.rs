use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use phone_witness::config::MonitorConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PHONE_WITNESS_CONFIG",
        "PHONE_WITNESS_SOURCE",
        "PHONE_WITNESS_MAX_FRAMES",
        "PHONE_WITNESS_PHONE_MODEL",
        "PHONE_WITNESS_ACTIVITY_MODEL",
        "PHONE_WITNESS_PHONE_THRESHOLD",
        "PHONE_WITNESS_HAND_THRESHOLD",
        "PHONE_WITNESS_HOLDING_LABELS",
        "PHONE_WITNESS_ALARM_PATH",
        "PHONE_WITNESS_LOG_PATH",
        "PHONE_WITNESS_DRIVER_ID",
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
            "source": {
                "url": "/dev/video2",
                "target_fps": 15,
                "width": 1280,
                "height": 720,
                "max_frames": 300
            },
            "detectors": {
                "phone_model": "models/phone.jsonl",
                "activity_model": "models/activity.jsonl",
                "input_size": 416
            },
            "thresholds": { "phone": 0.25, "hand": 0.5 },
            "holding_labels": ["on_call"],
            "alarm": {
                "asset_path": "sounds/beep.wav",
                "player": ["aplay", "-q", "{asset}"]
            },
            "log": {
                "path": "out/violations.txt",
                "json_path": "out/violations.jsonl",
                "event_description": "Phone held",
                "driver_id": "bus-7"
            }
        }"#,
    );

    std::env::set_var("PHONE_WITNESS_CONFIG", file.path());
    std::env::set_var("PHONE_WITNESS_HAND_THRESHOLD", "0.65");
    std::env::set_var("PHONE_WITNESS_HOLDING_LABELS", "nelpon, ga_nelpon");
    std::env::set_var("PHONE_WITNESS_DRIVER_ID", "bus-9");

    let cfg = MonitorConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "/dev/video2");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(cfg.source.max_frames, Some(300));
    assert_eq!(cfg.detectors.phone_model, "models/phone.jsonl");
    assert_eq!(cfg.detectors.activity_model, "models/activity.jsonl");
    assert_eq!(cfg.detectors.phone_classes, vec!["handphone"]);
    assert_eq!(cfg.detectors.input_size, 416);
    assert_eq!(cfg.phone_threshold, 0.25);
    assert_eq!(cfg.hand_threshold, 0.65);
    assert_eq!(cfg.holding_labels, vec!["nelpon", "ga_nelpon"]);
    assert_eq!(cfg.alarm.asset_path, PathBuf::from("sounds/beep.wav"));
    assert_eq!(
        cfg.alarm.player,
        vec!["aplay".to_string(), "-q".to_string(), "{asset}".to_string()]
    );
    assert_eq!(cfg.log.path, PathBuf::from("out/violations.txt"));
    assert_eq!(cfg.log.json_path, Some(PathBuf::from("out/violations.jsonl")));
    assert_eq!(cfg.log.event_description, "Phone held");
    assert_eq!(cfg.log.driver_id, "bus-9");

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load defaults");

    #[cfg(not(feature = "ingest-v4l2"))]
    assert_eq!(cfg.source.url, "stub://camera");
    #[cfg(feature = "ingest-v4l2")]
    assert_eq!(cfg.source.url, "/dev/video0");
    assert_eq!(cfg.source.max_frames, None);
    assert_eq!(cfg.detectors.phone_model, "Model/handphone.onnx");
    assert_eq!(cfg.detectors.activity_model, "Model/HandphoneDetect_Fix.onnx");
    assert_eq!(cfg.detectors.activity_classes, vec!["ga_nelpon", "nelpon"]);
    assert_eq!(cfg.phone_threshold, 0.10);
    assert_eq!(cfg.hand_threshold, 0.40);
    assert_eq!(cfg.log.event_description, "Terdeteksi memegang handphone (Overlap)");
    assert_eq!(cfg.log.driver_id, "Mntp123");
    assert_eq!(cfg.log.json_path, None);
    assert_eq!(
        cfg.alarm.player,
        vec!["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "{asset}"]
    );

    clear_env();
}

#[test]
fn env_overrides_source_models_and_paths() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PHONE_WITNESS_SOURCE", "stub://cabin");
    std::env::set_var("PHONE_WITNESS_MAX_FRAMES", "25");
    std::env::set_var("PHONE_WITNESS_PHONE_MODEL", "phone.jsonl");
    std::env::set_var("PHONE_WITNESS_ACTIVITY_MODEL", "activity.jsonl");
    std::env::set_var("PHONE_WITNESS_PHONE_THRESHOLD", "0.3");
    std::env::set_var("PHONE_WITNESS_ALARM_PATH", "/tmp/alarm.mp3");
    std::env::set_var("PHONE_WITNESS_LOG_PATH", "/tmp/pelanggaran.txt");

    let cfg = MonitorConfig::load_from(None).expect("load config");

    assert_eq!(cfg.source.url, "stub://cabin");
    assert_eq!(cfg.source.max_frames, Some(25));
    assert_eq!(cfg.detectors.phone_model, "phone.jsonl");
    assert_eq!(cfg.detectors.activity_model, "activity.jsonl");
    assert_eq!(cfg.phone_threshold, 0.3);
    assert_eq!(cfg.alarm.asset_path, PathBuf::from("/tmp/alarm.mp3"));
    assert_eq!(cfg.log.path, PathBuf::from("/tmp/pelanggaran.txt"));

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PHONE_WITNESS_PHONE_THRESHOLD", "high");
    assert!(MonitorConfig::load_from(None).is_err());

    std::env::set_var("PHONE_WITNESS_PHONE_THRESHOLD", "1.2");
    assert!(MonitorConfig::load_from(None).is_err());
    std::env::remove_var("PHONE_WITNESS_PHONE_THRESHOLD");

    std::env::set_var("PHONE_WITNESS_MAX_FRAMES", "-3");
    assert!(MonitorConfig::load_from(None).is_err());
    std::env::remove_var("PHONE_WITNESS_MAX_FRAMES");

    let file = write_config(r#"{ "source": { "target_fps": 0 } }"#);
    assert!(MonitorConfig::load_from(Some(file.path())).is_err());

    let file = write_config(r#"{ "holding_labels": [] }"#);
    assert!(MonitorConfig::load_from(Some(file.path())).is_err());

    let file = write_config(r#"{ "alarm": { "player": [" ", "{asset}"] } }"#);
    assert!(MonitorConfig::load_from(Some(file.path())).is_err());

    let file = write_config(r#"{ "alarm": { "player": [] } }"#);
    let cfg = MonitorConfig::load_from(Some(file.path())).expect("empty player selects the bell");
    assert!(cfg.alarm.player.is_empty());

    let file = write_config("{ not json");
    let err = MonitorConfig::load_from(Some(file.path())).expect_err("malformed file");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
