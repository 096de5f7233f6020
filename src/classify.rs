//! Per-frame reduction of both detector streams into "phone present" and
//! "phone held".

use crate::detect::{contains, BoundingBox, Detection};

pub const DEFAULT_PHONE_THRESHOLD: f32 = 0.10;
pub const DEFAULT_HAND_THRESHOLD: f32 = 0.40;

/// Activity labels that mean a hand is holding something ("not on a call", "on a call").
pub const DEFAULT_HOLDING_LABELS: [&str; 2] = ["ga_nelpon", "nelpon"];

/// A holding-activity box that fully contains a phone box.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapPair {
    pub holding: BoundingBox,
    pub holding_confidence: f32,
    pub phone: BoundingBox,
}

/// Classification of one frame. Owned by the loop iteration, then dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameResult {
    /// Phone detections above the phone threshold.
    pub phones: Vec<Detection>,
    pub overlaps: Vec<OverlapPair>,
}

impl FrameResult {
    pub fn phone_present(&self) -> bool {
        !self.phones.is_empty()
    }

    pub fn overlap_present(&self) -> bool {
        !self.overlaps.is_empty()
    }

    pub fn phone_boxes(&self) -> impl Iterator<Item = &BoundingBox> + '_ {
        self.phones.iter().map(|d| &d.bbox)
    }
}

#[derive(Clone, Debug)]
pub struct FrameClassifier {
    phone_threshold: f32,
    hand_threshold: f32,
    holding_labels: Vec<String>,
}

impl Default for FrameClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PHONE_THRESHOLD,
            DEFAULT_HAND_THRESHOLD,
            DEFAULT_HOLDING_LABELS.iter().map(|l| l.to_string()).collect(),
        )
    }
}

impl FrameClassifier {
    pub fn new(phone_threshold: f32, hand_threshold: f32, holding_labels: Vec<String>) -> Self {
        Self {
            phone_threshold,
            hand_threshold,
            holding_labels,
        }
    }

    pub fn is_holding_label(&self, label: &str) -> bool {
        self.holding_labels.iter().any(|l| l == label)
    }

    /// Reduce one frame's detections.
    ///
    /// Every qualifying activity box is checked against every phone box; the
    /// first phone it contains is paired with it. Thresholds are strict (`>`).
    pub fn classify(&self, phone: &[Detection], activity: &[Detection]) -> FrameResult {
        let phones: Vec<Detection> = phone
            .iter()
            .filter(|d| d.confidence > self.phone_threshold)
            .cloned()
            .collect();

        let overlaps = activity
            .iter()
            .filter(|d| d.confidence > self.hand_threshold && self.is_holding_label(&d.label))
            .filter_map(|hand| {
                phones
                    .iter()
                    .find(|p| contains(&hand.bbox, &p.bbox))
                    .map(|p| OverlapPair {
                        holding: hand.bbox,
                        holding_confidence: hand.confidence,
                        phone: p.bbox,
                    })
            })
            .collect();

        FrameResult { phones, overlaps }
    }
}
