use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::{DEFAULT_HAND_THRESHOLD, DEFAULT_HOLDING_LABELS, DEFAULT_PHONE_THRESHOLD};
use crate::ingest::CameraConfig;
use crate::log::DEFAULT_EVENT_DESCRIPTION;

#[cfg(feature = "ingest-v4l2")]
const DEFAULT_SOURCE_URL: &str = "/dev/video0";
#[cfg(not(feature = "ingest-v4l2"))]
const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_PHONE_MODEL: &str = "Model/handphone.onnx";
const DEFAULT_ACTIVITY_MODEL: &str = "Model/HandphoneDetect_Fix.onnx";
const DEFAULT_PHONE_CLASS: &str = "handphone";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_ALARM_PATH: &str = "alert.mp3";
const DEFAULT_LOG_PATH: &str = "log/log_pelanggaran.txt";
const DEFAULT_DRIVER_ID: &str = "Mntp123";
const DEFAULT_ALARM_PLAYER: [&str; 6] = ["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "{asset}"];

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    source: Option<SourceConfigFile>,
    detectors: Option<DetectorConfigFile>,
    thresholds: Option<ThresholdConfigFile>,
    holding_labels: Option<Vec<String>>,
    alarm: Option<AlarmConfigFile>,
    log: Option<LogConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    phone_model: Option<String>,
    activity_model: Option<String>,
    phone_classes: Option<Vec<String>>,
    activity_classes: Option<Vec<String>>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    phone: Option<f32>,
    hand: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlarmConfigFile {
    asset_path: Option<PathBuf>,
    player: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct LogConfigFile {
    path: Option<PathBuf>,
    json_path: Option<PathBuf>,
    event_description: Option<String>,
    driver_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: CameraConfig,
    pub detectors: DetectorSettings,
    /// Phone detections must score strictly above this.
    pub phone_threshold: f32,
    /// Holding-activity detections must score strictly above this.
    pub hand_threshold: f32,
    pub holding_labels: Vec<String>,
    pub alarm: AlarmSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub phone_model: String,
    pub activity_model: String,
    pub phone_classes: Vec<String>,
    pub activity_classes: Vec<String>,
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct AlarmSettings {
    pub asset_path: PathBuf,
    /// External player command; `{asset}` is replaced by the asset path.
    /// Defaults to `ffplay`; an empty command rings the terminal bell.
    pub player: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub event_description: String,
    pub driver_id: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_file(MonitorConfigFile::default())
    }
}

impl MonitorConfig {
    /// Load from `PHONE_WITNESS_CONFIG` (if set), then env overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PHONE_WITNESS_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then env overrides, then validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => MonitorConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Self {
        let source_file = file.source.unwrap_or_default();
        let source = CameraConfig {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            width: source_file.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            max_frames: source_file.max_frames,
        };

        let detector_file = file.detectors.unwrap_or_default();
        let detectors = DetectorSettings {
            phone_model: detector_file
                .phone_model
                .unwrap_or_else(|| DEFAULT_PHONE_MODEL.to_string()),
            activity_model: detector_file
                .activity_model
                .unwrap_or_else(|| DEFAULT_ACTIVITY_MODEL.to_string()),
            phone_classes: detector_file
                .phone_classes
                .unwrap_or_else(|| vec![DEFAULT_PHONE_CLASS.to_string()]),
            activity_classes: detector_file
                .activity_classes
                .unwrap_or_else(default_holding_labels),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };

        let thresholds = file.thresholds.unwrap_or_default();
        let alarm_file = file.alarm.unwrap_or_default();
        let log_file = file.log.unwrap_or_default();

        Self {
            source,
            detectors,
            phone_threshold: thresholds.phone.unwrap_or(DEFAULT_PHONE_THRESHOLD),
            hand_threshold: thresholds.hand.unwrap_or(DEFAULT_HAND_THRESHOLD),
            holding_labels: file.holding_labels.unwrap_or_else(default_holding_labels),
            alarm: AlarmSettings {
                asset_path: alarm_file
                    .asset_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ALARM_PATH)),
                player: alarm_file.player.unwrap_or_else(|| {
                    DEFAULT_ALARM_PLAYER.iter().map(|arg| arg.to_string()).collect()
                }),
            },
            log: LogSettings {
                path: log_file
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
                json_path: log_file.json_path,
                event_description: log_file
                    .event_description
                    .unwrap_or_else(|| DEFAULT_EVENT_DESCRIPTION.to_string()),
                driver_id: log_file
                    .driver_id
                    .unwrap_or_else(|| DEFAULT_DRIVER_ID.to_string()),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("PHONE_WITNESS_SOURCE") {
            self.source.url = url;
        }
        if let Some(max) = non_empty_env("PHONE_WITNESS_MAX_FRAMES") {
            let max: u64 = max
                .parse()
                .map_err(|_| anyhow!("PHONE_WITNESS_MAX_FRAMES must be an integer frame count"))?;
            self.source.max_frames = Some(max);
        }
        if let Some(model) = non_empty_env("PHONE_WITNESS_PHONE_MODEL") {
            self.detectors.phone_model = model;
        }
        if let Some(model) = non_empty_env("PHONE_WITNESS_ACTIVITY_MODEL") {
            self.detectors.activity_model = model;
        }
        if let Some(value) = non_empty_env("PHONE_WITNESS_PHONE_THRESHOLD") {
            self.phone_threshold = parse_threshold("PHONE_WITNESS_PHONE_THRESHOLD", &value)?;
        }
        if let Some(value) = non_empty_env("PHONE_WITNESS_HAND_THRESHOLD") {
            self.hand_threshold = parse_threshold("PHONE_WITNESS_HAND_THRESHOLD", &value)?;
        }
        if let Ok(labels) = std::env::var("PHONE_WITNESS_HOLDING_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.holding_labels = parsed;
            }
        }
        if let Some(path) = non_empty_env("PHONE_WITNESS_ALARM_PATH") {
            self.alarm.asset_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("PHONE_WITNESS_LOG_PATH") {
            self.log.path = PathBuf::from(path);
        }
        if let Some(driver_id) = non_empty_env("PHONE_WITNESS_DRIVER_ID") {
            self.log.driver_id = driver_id;
        }
        Ok(())
    }

    /// Reject values that would make the monitor meaningless.
    pub fn validate(&self) -> Result<()> {
        check_threshold("phone threshold", self.phone_threshold)?;
        check_threshold("hand threshold", self.hand_threshold)?;
        if self.holding_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(anyhow!("holding_labels must name at least one activity class"));
        }
        if self.detectors.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self
            .alarm
            .player
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(anyhow!("alarm player program must not be blank"));
        }
        Ok(())
    }
}

fn default_holding_labels() -> Vec<String> {
    DEFAULT_HOLDING_LABELS.iter().map(|l| l.to_string()).collect()
}

fn check_threshold(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

fn parse_threshold(var: &str, value: &str) -> Result<f32> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a number between 0 and 1", var))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
