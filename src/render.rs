//! Display annotations for a classified frame.
//!
//! The monitor never reads anything back from the renderer. `Overlay` is the
//! drawing list a display would paint; `LogRenderer` reports status changes
//! instead of painting.

use anyhow::Result;

use crate::classify::FrameResult;
use crate::detect::BoundingBox;
use crate::frame::Frame;

pub const OVERLAP_BANNER: &str = "WARNING: Phone overlap detected!";
pub const PHONE_ONLY_STATUS: &str = "Phone detected (No overlap)";

/// RGB colors used for annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Phone boxes.
    Cyan,
    /// Holding boxes and the warning banner.
    Red,
}

impl Color {
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Color::Cyan => [0, 255, 255],
            Color::Red => [255, 0, 0],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxAnnotation {
    pub bbox: BoundingBox,
    pub color: Color,
    pub label: String,
}

/// Frame-level status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Clear,
    PhoneOnly,
    Overlap,
}

impl Status {
    pub fn text(&self) -> Option<&'static str> {
        match self {
            Status::Clear => None,
            Status::PhoneOnly => Some(PHONE_ONLY_STATUS),
            Status::Overlap => Some(OVERLAP_BANNER),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub boxes: Vec<BoxAnnotation>,
    pub status: Status,
}

impl Overlay {
    pub fn from_result(result: &FrameResult) -> Self {
        let mut boxes: Vec<BoxAnnotation> = result
            .phones
            .iter()
            .map(|phone| BoxAnnotation {
                bbox: phone.bbox,
                color: Color::Cyan,
                label: format!("Handphone {:.2}", phone.confidence),
            })
            .collect();
        boxes.extend(result.overlaps.iter().map(|pair| BoxAnnotation {
            bbox: pair.holding,
            color: Color::Red,
            label: format!("PERINGATAN: Memegang HP {:.2}", pair.holding_confidence),
        }));

        let status = if result.overlap_present() {
            Status::Overlap
        } else if result.phone_present() {
            Status::PhoneOnly
        } else {
            Status::Clear
        };

        Self { boxes, status }
    }
}

/// Display sink. Purely advisory; errors are logged by the caller and ignored.
pub trait Renderer {
    fn render(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()>;
}

/// Renderer that reports status transitions through the `log` facade.
#[derive(Default)]
pub struct LogRenderer {
    last: Option<Status>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        for annotation in &overlay.boxes {
            log::trace!(
                "frame {}: {:?} box {:?} {}",
                frame.index,
                annotation.color,
                annotation.bbox,
                annotation.label
            );
        }
        if self.last != Some(overlay.status) {
            match overlay.status.text() {
                Some(text) => log::info!("frame {}: {}", frame.index, text),
                None => log::debug!("frame {}: clear", frame.index),
            }
            self.last = Some(overlay.status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FrameClassifier;
    use crate::detect::Detection;

    fn det(coords: [i32; 4], label: &str, confidence: f32) -> Detection {
        let bbox = BoundingBox::new(coords[0], coords[1], coords[2], coords[3]).unwrap();
        Detection::new(bbox, label, confidence)
    }

    #[test]
    fn overlap_frame_gets_red_box_and_banner() {
        let result = FrameClassifier::default().classify(
            &[det([100, 100, 150, 150], "handphone", 0.876)],
            &[det([80, 80, 200, 200], "nelpon", 0.91)],
        );
        let overlay = Overlay::from_result(&result);

        assert_eq!(overlay.status, Status::Overlap);
        assert_eq!(overlay.status.text(), Some(OVERLAP_BANNER));
        assert_eq!(overlay.boxes.len(), 2);
        assert_eq!(overlay.boxes[0].label, "Handphone 0.88");
        assert_eq!(overlay.boxes[0].color, Color::Cyan);
        assert_eq!(overlay.boxes[1].label, "PERINGATAN: Memegang HP 0.91");
        assert_eq!(overlay.boxes[1].color.rgb(), [255, 0, 0]);
    }

    #[test]
    fn phone_without_overlap_shows_status_only() {
        let result =
            FrameClassifier::default().classify(&[det([0, 0, 10, 10], "handphone", 0.3)], &[]);
        let overlay = Overlay::from_result(&result);
        assert_eq!(overlay.status, Status::PhoneOnly);
        assert_eq!(overlay.status.text(), Some(PHONE_ONLY_STATUS));
        assert_eq!(overlay.boxes.len(), 1);
    }

    #[test]
    fn empty_frame_is_clear() {
        let overlay = Overlay::from_result(&FrameResult::default());
        assert_eq!(overlay.status, Status::Clear);
        assert!(overlay.status.text().is_none());
        assert!(overlay.boxes.is_empty());
    }
}
