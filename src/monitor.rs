//! The per-frame monitor and the capture loop around it.
//!
//! `Monitor` is the deterministic core: classification, episode tracking,
//! alarm and violation log. `Pipeline` feeds it from a frame source and the two
//! detectors, one frame at a time, in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::alarm::AlarmController;
use crate::classify::{FrameClassifier, FrameResult};
use crate::config::MonitorConfig;
use crate::detect::{Detection, Detector};
use crate::frame::FrameSource;
use crate::log::{format_timestamp, ViolationLogger, ViolationSink};
use crate::render::{Overlay, Renderer};
use crate::state::{seconds_between, ViolationEvent, ViolationStateMachine};
use crate::Timestamp;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub result: FrameResult,
    pub events: Vec<ViolationEvent>,
}

/// Running totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub frames: u64,
    pub phone_episodes: u64,
    pub violations: u64,
}

pub struct Monitor {
    classifier: FrameClassifier,
    machine: ViolationStateMachine,
    alarm: AlarmController,
    sink: Box<dyn ViolationSink>,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(classifier: FrameClassifier, alarm: AlarmController, sink: Box<dyn ViolationSink>) -> Self {
        Self {
            classifier,
            machine: ViolationStateMachine::new(),
            alarm,
            sink,
            stats: MonitorStats::default(),
        }
    }

    /// Wire up classifier, alarm and file log from configuration.
    ///
    /// A missing alarm asset yields a silent alarm, never an error.
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        let classifier = FrameClassifier::new(
            cfg.phone_threshold,
            cfg.hand_threshold,
            cfg.holding_labels.clone(),
        );
        let alarm = AlarmController::from_settings(&cfg.alarm.asset_path, &cfg.alarm.player);
        let mut logger = ViolationLogger::new(&cfg.log.path)
            .with_description(cfg.log.event_description.clone())
            .with_driver_id(cfg.log.driver_id.clone());
        if let Some(json_path) = &cfg.log.json_path {
            logger = logger.with_json_mirror(json_path);
        }
        Self::new(classifier, alarm, Box::new(logger))
    }

    /// Classify one frame's detections and react to any state edges.
    pub fn process(&mut self, now: Timestamp, phone: &[Detection], activity: &[Detection]) -> FrameReport {
        let result = self.classifier.classify(phone, activity);
        let events = self
            .machine
            .update(now, result.phone_present(), result.overlap_present());
        for event in &events {
            self.apply(event);
        }
        self.stats.frames += 1;
        FrameReport { result, events }
    }

    fn apply(&mut self, event: &ViolationEvent) {
        match event {
            ViolationEvent::PhoneStart { at } => {
                self.stats.phone_episodes += 1;
                log::info!("phone detected in frame at {}", format_timestamp(at));
            }
            ViolationEvent::PhoneEnd { since, at } => {
                log::info!(
                    "phone no longer detected ({:.2}s)",
                    seconds_between(*since, *at)
                );
            }
            ViolationEvent::OverlapStart { at } => {
                log::warn!("phone held in hand since {}", format_timestamp(at));
                self.alarm.start();
            }
            ViolationEvent::OverlapEnd(record) => {
                self.stats.violations += 1;
                self.sink.record(record);
                self.alarm.stop();
            }
        }
    }

    /// Stop the alarm if it is still sounding. Open episodes are not logged.
    pub fn shutdown(&mut self) {
        if self.alarm.is_playing() {
            log::info!("shutdown with alarm active; stopping alarm");
        }
        self.alarm.stop();
    }

    pub fn alarm_playing(&self) -> bool {
        self.alarm.is_playing()
    }

    pub fn state(&self) -> &ViolationStateMachine {
        &self.machine
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }
}

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    ReadFailure,
    StopSignal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: MonitorStats,
}

/// Single-threaded capture → detect → classify → react → render loop.
pub struct Pipeline<S: FrameSource> {
    source: S,
    phone: Box<dyn Detector>,
    activity: Box<dyn Detector>,
    renderer: Box<dyn Renderer>,
    monitor: Monitor,
}

impl<S: FrameSource> Pipeline<S> {
    pub fn new(
        source: S,
        phone: Box<dyn Detector>,
        activity: Box<dyn Detector>,
        renderer: Box<dyn Renderer>,
        monitor: Monitor,
    ) -> Self {
        Self {
            source,
            phone,
            activity,
            renderer,
            monitor,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Run until end of stream, a read failure, or `stop` is raised.
    ///
    /// The alarm is stopped on every exit path, including detector errors.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<RunSummary> {
        let outcome = self.run_frames(stop);
        self.monitor.shutdown();
        let reason = outcome?;
        let summary = RunSummary {
            reason,
            stats: self.monitor.stats(),
        };
        log::info!(
            "monitor stopped ({:?}): frames={} phone_episodes={} violations={}",
            summary.reason,
            summary.stats.frames,
            summary.stats.phone_episodes,
            summary.stats.violations
        );
        Ok(summary)
    }

    fn run_frames(&mut self, stop: &AtomicBool) -> Result<StopReason> {
        let mut last_health_log = Instant::now();

        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(StopReason::StopSignal);
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(StopReason::EndOfStream),
                Err(e) => {
                    log::warn!("frame read failed, ending stream: {:#}", e);
                    return Ok(StopReason::ReadFailure);
                }
            };

            let activity = self
                .activity
                .detect(&frame)
                .with_context(|| format!("{} detector failed on frame {}", self.activity.name(), frame.index))?;
            let phone = self
                .phone
                .detect(&frame)
                .with_context(|| format!("{} detector failed on frame {}", self.phone.name(), frame.index))?;

            let report = self.monitor.process(frame.captured_at, &phone, &activity);
            log::debug!(
                "frame {}: phones={} overlaps={} events={}",
                frame.index,
                report.result.phones.len(),
                report.result.overlaps.len(),
                report.events.len()
            );

            let overlay = Overlay::from_result(&report.result);
            if let Err(e) = self.renderer.render(&frame, &overlay) {
                log::warn!("render failed on frame {}: {:#}", frame.index, e);
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = self.monitor.stats();
                log::info!(
                    "source health={} frames={} violations={} alarm={} src={}",
                    self.source.is_healthy(),
                    self.source.frames_captured(),
                    stats.violations,
                    self.monitor.alarm_playing(),
                    self.source.describe()
                );
                last_health_log = Instant::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::state::ViolationRecord;
    use chrono::{Duration as ChronoDuration, Local, TimeZone};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<ViolationRecord>>>);

    impl ViolationSink for MemorySink {
        fn record(&mut self, violation: &ViolationRecord) {
            self.0.lock().unwrap().push(violation.clone());
        }
    }

    fn t(ms: i64) -> Timestamp {
        Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap() + ChronoDuration::milliseconds(ms)
    }

    fn det(coords: [i32; 4], label: &str, confidence: f32) -> Detection {
        let bbox = BoundingBox::new(coords[0], coords[1], coords[2], coords[3]).unwrap();
        Detection::new(bbox, label, confidence)
    }

    fn monitor() -> (Monitor, MemorySink) {
        let sink = MemorySink::default();
        let monitor = Monitor::new(
            FrameClassifier::default(),
            AlarmController::silent(),
            Box::new(sink.clone()),
        );
        (monitor, sink)
    }

    #[test]
    fn held_phone_starts_alarm_and_release_logs_once() {
        let (mut monitor, sink) = monitor();
        let phone = [det([100, 100, 150, 150], "handphone", 0.6)];
        let hand = [det([80, 80, 200, 200], "nelpon", 0.7)];

        let report = monitor.process(t(0), &phone, &hand);
        assert!(report.events.contains(&ViolationEvent::OverlapStart { at: t(0) }));
        assert!(monitor.alarm_playing());

        monitor.process(t(100), &phone, &hand);
        monitor.process(t(200), &phone, &hand);
        assert!(sink.0.lock().unwrap().is_empty());

        monitor.process(t(300), &phone, &[]);
        assert!(!monitor.alarm_playing());
        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start, t(0));
        assert_eq!(records[0].end, t(300));
        assert!((records[0].duration_seconds - 0.3).abs() < 1e-9);

        let stats = monitor.stats();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.phone_episodes, 1);
        assert_eq!(stats.violations, 1);
    }

    #[test]
    fn alarm_tracks_overlap_state_every_frame() {
        let (mut monitor, _sink) = monitor();
        let phone = [det([10, 10, 20, 20], "handphone", 0.9)];
        let hand = [det([0, 0, 50, 50], "ga_nelpon", 0.9)];

        for (i, held) in [true, false, true, true, false, false, true].iter().enumerate() {
            let activity: &[Detection] = if *held { &hand } else { &[] };
            monitor.process(t(i as i64 * 40), &phone, activity);
            assert_eq!(monitor.alarm_playing(), monitor.state().overlap().is_active());
        }
    }

    #[test]
    fn shutdown_stops_alarm_without_logging_open_episode() {
        let (mut monitor, sink) = monitor();
        monitor.process(
            t(0),
            &[det([10, 10, 20, 20], "handphone", 0.9)],
            &[det([0, 0, 50, 50], "nelpon", 0.9)],
        );
        assert!(monitor.alarm_playing());
        monitor.shutdown();
        assert!(!monitor.alarm_playing());
        monitor.shutdown();
        assert!(sink.0.lock().unwrap().is_empty());
    }
}
