//! Frames flowing through the monitor loop.
//!
//! - `Frame`: one captured RGB image plus its capture time.
//! - `FrameSource`: where frames come from. `Ok(None)` marks end of stream.
//!
//! Frames are produced fresh per loop iteration and dropped once both detectors
//! have run. Nothing downstream of the detectors sees pixels.

use anyhow::Result;

use crate::Timestamp;

/// A single captured frame (packed RGB, 3 bytes per pixel).
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number assigned by the source, starting at 1.
    pub index: u64,
    /// Wall-clock capture time. Drives all episode timing.
    pub captured_at: Timestamp,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64, captured_at: Timestamp) -> Self {
        Self {
            pixels,
            width,
            height,
            index,
            captured_at,
        }
    }

    /// Pixel slice handed to detectors.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Expected byte length for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        rgb_len(self.width, self.height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("index", &self.index)
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Byte length of a packed RGB image, computed in `usize`.
pub fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Source of frames for the monitor loop.
pub trait FrameSource {
    /// Source identifier for logs.
    fn describe(&self) -> String;

    /// Next frame, or `Ok(None)` at end of stream.
    ///
    /// An `Err` is a read failure. The loop treats it as end of input, not a crash.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Frames produced so far.
    fn frames_captured(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    #[test]
    fn frame_reports_dimensions_without_pixels_in_debug() {
        let at = Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let frame = Frame::new(vec![7u8; 12], 2, 2, 1, at);
        assert_eq!(frame.expected_len(), 12);
        assert_eq!(frame.pixels().len(), 12);

        let debug = format!("{:?}", frame);
        assert!(debug.contains("bytes: 12"));
        assert!(!debug.contains("[7, 7"));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn rgb_len_does_not_wrap_for_large_sizes() {
        assert_eq!(rgb_len(70_000, 70_000), 14_700_000_000);
    }
}
