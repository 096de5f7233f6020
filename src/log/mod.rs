//! Append-only violation log.
//!
//! One human-readable block per completed "phone held" episode, optionally
//! mirrored as JSON lines for machine consumption. Write failures are reported
//! through `log::error!` and never interrupt the monitor loop.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::state::ViolationRecord;
use crate::Timestamp;

pub const DEFAULT_EVENT_DESCRIPTION: &str = "Terdeteksi memegang handphone (Overlap)";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Receiver of completed violation episodes.
pub trait ViolationSink {
    /// Persist one record. Must not fail the caller.
    fn record(&mut self, violation: &ViolationRecord);
}

/// Text block for one episode, blank line included.
pub fn format_record(description: &str, violation: &ViolationRecord) -> String {
    format!(
        "Event : {}\nDari jam : {}\nSampai jam : {}\nDurasi : {:.2} detik\n\n",
        description,
        format_timestamp(&violation.start),
        format_timestamp(&violation.end),
        violation.duration_seconds
    )
}

pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    event: &'a str,
    driver_id: &'a str,
    #[serde(flatten)]
    violation: &'a ViolationRecord,
}

/// File-backed violation log.
pub struct ViolationLogger {
    path: PathBuf,
    json_path: Option<PathBuf>,
    description: String,
    driver_id: String,
    written: u64,
    failures: u64,
}

impl ViolationLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            json_path: None,
            description: DEFAULT_EVENT_DESCRIPTION.to_string(),
            driver_id: String::new(),
            written: 0,
            failures: 0,
        }
    }

    pub fn with_json_mirror(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_path = Some(path.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_driver_id(mut self, driver_id: impl Into<String>) -> Self {
        self.driver_id = driver_id.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records successfully appended to the text log.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Failed append attempts (text or JSON).
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Append one record, surfacing I/O errors.
    pub fn append(&self, violation: &ViolationRecord) -> Result<()> {
        append_to(&self.path, &format_record(&self.description, violation))
    }

    fn append_json(&self, path: &Path, violation: &ViolationRecord) -> Result<()> {
        let line = serde_json::to_string(&JsonRecord {
            event: &self.description,
            driver_id: &self.driver_id,
            violation,
        })
        .context("failed to encode violation record")?;
        append_to(path, &format!("{}\n", line))
    }
}

impl ViolationSink for ViolationLogger {
    fn record(&mut self, violation: &ViolationRecord) {
        match self.append(violation) {
            Ok(()) => {
                self.written += 1;
                log::info!(
                    "violation logged to {}: {} -> {} ({:.2}s)",
                    self.path.display(),
                    format_timestamp(&violation.start),
                    format_timestamp(&violation.end),
                    violation.duration_seconds
                );
            }
            Err(e) => {
                self.failures += 1;
                log::error!("violation log write failed: {:#}", e);
            }
        }

        if let Some(json_path) = self.json_path.clone() {
            if let Err(e) = self.append_json(&json_path, violation) {
                self.failures += 1;
                log::error!("violation json log write failed: {:#}", e);
            }
        }
    }
}

fn append_to(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};

    fn record(start_s: i64, millis: i64) -> ViolationRecord {
        let start = Local.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap() + Duration::seconds(start_s);
        ViolationRecord::new(start, start + Duration::milliseconds(millis))
    }

    #[test]
    fn block_matches_expected_layout() {
        let text = format_record(DEFAULT_EVENT_DESCRIPTION, &record(5, 2250));
        assert_eq!(
            text,
            "Event : Terdeteksi memegang handphone (Overlap)\n\
             Dari jam : 2024-01-15 08:30:05\n\
             Sampai jam : 2024-01-15 08:30:07\n\
             Durasi : 2.25 detik\n\n"
        );
    }

    #[test]
    fn appends_blocks_and_creates_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("log").join("log_pelanggaran.txt");
        let mut logger = ViolationLogger::new(&path);

        logger.record(&record(0, 1000));
        logger.record(&record(10, 500));

        let text = std::fs::read_to_string(&path)?;
        assert_eq!(text.matches("Event : ").count(), 2);
        assert!(text.contains("Durasi : 1.00 detik"));
        assert!(text.contains("Durasi : 0.50 detik"));
        assert!(text.ends_with("\n\n"));
        assert_eq!(logger.written(), 2);
        assert_eq!(logger.failures(), 0);
        Ok(())
    }

    #[test]
    fn write_failure_is_counted_not_raised() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // A directory cannot be opened for append.
        let mut logger = ViolationLogger::new(dir.path());
        logger.record(&record(0, 100));
        assert_eq!(logger.written(), 0);
        assert_eq!(logger.failures(), 1);
        Ok(())
    }

    #[test]
    fn json_mirror_carries_driver_id() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut logger = ViolationLogger::new(dir.path().join("log.txt"))
            .with_json_mirror(dir.path().join("log.jsonl"))
            .with_driver_id("Mntp123");
        logger.record(&record(0, 1500));

        let line = std::fs::read_to_string(dir.path().join("log.jsonl"))?;
        let value: serde_json::Value = serde_json::from_str(line.trim())?;
        assert_eq!(value["driver_id"], "Mntp123");
        assert_eq!(value["event"], DEFAULT_EVENT_DESCRIPTION);
        assert_eq!(value["duration_seconds"], 1.5);
        assert!(value["start"].is_string());
        Ok(())
    }
}
