#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::Detector;
use crate::detect::result::{non_max_suppression, BoundingBox, Detection};
use crate::frame::Frame;

const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.05;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend for YOLOv8-style ONNX exports.
///
/// Expects a single `[1, 3, S, S]` float input and a `[1, 4 + classes, anchors]`
/// output where the first four rows are `cx, cy, w, h` in input pixels and the
/// remaining rows are per-class scores. Boxes are mapped back to frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    classes: Vec<String>,
    confidence_floor: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, classes: Vec<String>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)))
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            classes,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.pixels().len() != frame.expected_len() {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                frame.expected_len(),
                frame.pixels().len()
            ));
        }
        let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let resized = image::imageops::resize(
            &image,
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );

        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;

        let (_, rows, anchors) = view.dim();
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, need at least 5", rows));
        }
        let class_count = rows - 4;
        let scale_x = frame.width as f32 / self.input_size as f32;
        let scale_y = frame.height as f32 / self.input_size as f32;

        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let (class_idx, score) = (0..class_count)
                .map(|c| (c, view[[0, 4 + c, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            if !score.is_finite() || score < self.confidence_floor {
                continue;
            }

            let cx = view[[0, 0, anchor]];
            let cy = view[[0, 1, anchor]];
            let w = view[[0, 2, anchor]];
            let h = view[[0, 3, anchor]];
            let x1 = to_pixel((cx - w / 2.0) * scale_x, frame.width);
            let y1 = to_pixel((cy - h / 2.0) * scale_y, frame.height);
            let x2 = to_pixel((cx + w / 2.0) * scale_x, frame.width);
            let y2 = to_pixel((cy + h / 2.0) * scale_y, frame.height);
            let Ok(bbox) = BoundingBox::new(x1, y1, x2, y2) else {
                continue;
            };

            let label = self
                .classes
                .get(class_idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", class_idx));
            detections.push(Detection::new(bbox, label, score.min(1.0)));
        }

        Ok(non_max_suppression(detections, self.iou_threshold))
    }
}

fn to_pixel(value: f32, limit: u32) -> i32 {
    value.round().clamp(0.0, limit as f32) as i32
}

impl Detector for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }
}
