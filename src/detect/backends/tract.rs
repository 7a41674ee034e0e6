#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

const IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend for ONNX object detection.
///
/// Loads a local model file and runs inference on RGB frames. The model head
/// is expected in the single-output `[1, 4 + classes, anchors]` layout with
/// center-format boxes in input pixel coordinates. No network I/O, no disk
/// writes beyond model loading.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        labels: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.5,
            labels,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_output(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let rows = shape[1];
        let anchors = shape[2];
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, need at least 5", rows));
        }
        let num_classes = rows - 4;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let mut best_class = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let score = view[[0, 4 + c, a]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if !best_score.is_finite() || best_score < self.confidence_threshold {
                continue;
            }

            let cx = view[[0, 0, a]];
            let cy = view[[0, 1, a]];
            let w = view[[0, 2, a]];
            let h = view[[0, 3, a]];
            if w <= 0.0 || h <= 0.0 {
                continue;
            }

            let x = (cx - w / 2.0).max(0.0);
            let y = (cy - h / 2.0).max(0.0);
            let label = self
                .labels
                .get(best_class)
                .cloned()
                .unwrap_or_else(|| format!("class-{}", best_class));

            candidates.push(Detection::new(
                label,
                best_score.min(1.0),
                BoundingBox {
                    x: x as u32,
                    y: y as u32,
                    w: w as u32,
                    h: h as u32,
                },
            ));
        }

        Ok(suppress_overlaps(candidates))
    }
}

/// Greedy non-maximum suppression, highest confidence first.
fn suppress_overlaps(mut candidates: Vec<Detection>) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.label == candidate.label && iou(&k.bbox, &candidate.bbox) > IOU_THRESHOLD);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ax2 = a.x.saturating_add(a.w);
    let ay2 = a.y.saturating_add(a.h);
    let bx2 = b.x.saturating_add(b.w);
    let by2 = b.y.saturating_add(b.h);

    let ix = ax2.min(bx2).saturating_sub(a.x.max(b.x)) as f32;
    let iy = ay2.min(by2).saturating_sub(a.y.max(b.y)) as f32;
    let inter = ix * iy;
    let union = (a.w as f32 * a.h as f32) + (b.w as f32 * b.h as f32) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.width * self.height * 3) as usize];
        let _ = self.detect(&blank, self.width, self.height)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox {
            x: 10,
            y: 10,
            w: 20,
            h: 20,
        };
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox {
            x: 0,
            y: 0,
            w: 10,
            h: 10,
        };
        let b = BoundingBox {
            x: 50,
            y: 50,
            w: 10,
            h: 10,
        };
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn suppression_keeps_highest_confidence_per_overlap() {
        let base = BoundingBox {
            x: 10,
            y: 10,
            w: 40,
            h: 40,
        };
        let nearly = BoundingBox {
            x: 12,
            y: 12,
            w: 40,
            h: 40,
        };
        let candidates = vec![
            Detection::new("NO-Helmet", 0.6, nearly),
            Detection::new("NO-Helmet", 0.9, base.clone()),
        ];
        let kept = suppress_overlaps(candidates);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[0].bbox, base);
    }
}
