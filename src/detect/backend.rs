use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Which of the two detector streams a backend feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorRole {
    /// Finds phones anywhere in the frame.
    Phone,
    /// Finds hand/holding activity ("on a call", "not on a call").
    Activity,
}

impl DetectorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorRole::Phone => "phone",
            DetectorRole::Activity => "activity",
        }
    }
}

/// Failure to bring a detector up. Fatal at startup.
#[derive(Clone, Debug)]
pub struct DetectorUnavailable {
    pub role: DetectorRole,
    pub model: String,
    pub reason: String,
}

impl std::fmt::Display for DetectorUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} detector unavailable ({}): {}",
            self.role.as_str(),
            self.model,
            self.reason
        )
    }
}

impl std::error::Error for DetectorUnavailable {}

/// Detector backend trait.
///
/// Maps one frame to a list of detections. Implementations treat the pixel
/// slice as read-only and must not keep it past the call. Thresholding against
/// the monitor's confidence limits happens downstream, so backends may return
/// low-confidence detections.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
