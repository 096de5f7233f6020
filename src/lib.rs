//! Phone-handling witness
//!
//! Watches a live camera feed for a person holding a phone, sounds an alarm for
//! as long as that lasts, and appends one record per episode to a violation log.
//!
//! # Architecture
//!
//! Two detectors run on every frame: one finds phones, the other finds hand
//! activity ("on a call", "not on a call"). A phone counts as held when its box
//! lies entirely inside a confident holding-activity box.
//!
//! 1. **Classify**: reduce both detector outputs to "phone present" and "phone held".
//! 2. **Track**: two debounced states turn those booleans into start/end events.
//! 3. **React**: "held" start sounds the alarm; "held" end silences it and logs
//!    the episode.
//!
//! Everything runs on one thread, one frame at a time, in arrival order.
//!
//! # Module Structure
//!
//! - `detect`: boxes, detections, containment, detector backends
//! - `classify`: per-frame reduction to phone/overlap booleans
//! - `state`: debounced episode tracking and violation records
//! - `alarm`: idempotent alarm switch and looping output
//! - `log`: append-only violation log
//! - `render`: display annotations
//! - `ingest` / `frame`: frame sources
//! - `monitor`: the per-frame core and the capture loop
//! - `config`: JSON file + environment configuration

use chrono::{DateTime, Local};

pub mod alarm;
pub mod classify;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod log;
pub mod monitor;
pub mod render;
pub mod state;

/// Wall-clock time of a frame, local zone (violation logs use local time).
pub type Timestamp = DateTime<Local>;

pub use alarm::{AlarmAsset, AlarmController, AlarmOutput, AlarmSound, LoopingAlarm};
pub use classify::{FrameClassifier, FrameResult, OverlapPair};
pub use config::MonitorConfig;
pub use detect::{
    contains, open_detector, BoundingBox, Detection, Detector, DetectorRole, DetectorUnavailable,
    ScriptedBackend,
};
pub use frame::{Frame, FrameSource};
pub use ingest::{CameraConfig, CameraSource};
pub use self::log::{ViolationLogger, ViolationSink};
pub use monitor::{FrameReport, Monitor, MonitorStats, Pipeline, RunSummary, StopReason};
pub use render::{LogRenderer, Overlay, Renderer};
pub use state::{DebouncedState, ViolationEvent, ViolationRecord, ViolationStateMachine};
