use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::Detector;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Replays a fixed detection sequence, one entry per `detect` call.
///
/// The file form is JSON lines: each line is a JSON array of detections for one
/// frame. Blank lines mean "nothing detected". Once the script runs out every
/// further frame yields no detections.
pub struct ScriptedBackend {
    frames: VecDeque<Vec<Detection>>,
}

impl ScriptedBackend {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Load a JSON-lines script. Every line is parsed up front.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        let frames = parse_script(&raw)
            .map_err(|e| anyhow!("invalid detection script {}: {}", path.display(), e))?;
        log::info!(
            "ScriptedBackend: loaded {} frames from {}",
            frames.len(),
            path.display()
        );
        Ok(Self::new(frames))
    }
}

fn parse_script(raw: &str) -> Result<Vec<Vec<Detection>>> {
    raw.lines()
        .enumerate()
        .map(|(n, line)| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(line).map_err(|e| anyhow!("line {}: {}", n + 1, e))
        })
        .collect()
}

impl Detector for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}
