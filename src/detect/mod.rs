mod backend;
mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection};

use log::{debug, info};

use crate::error::PipelineError;
use crate::frame::Frame;

/// Default PPE label table, index order matches the shipped model head.
pub const DEFAULT_LABELS: &[&str] = &[
    "Hardhat",
    "Mask",
    "NO-Hardhat",
    "NO-Mask",
    "NO-Safety Vest",
    "Person",
    "Safety Cone",
    "Safety Vest",
    "machinery",
    "vehicle",
];

/// Detection service wrapping one loaded backend.
///
/// The model is loaded once at construction and held for the life of the
/// session. Callers hand frames in, detections come out; the backend choice
/// is invisible past this seam.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Detector {
    /// Wrap an already-constructed backend.
    pub fn new(backend: Box<dyn DetectorBackend>) -> Self {
        Self { backend }
    }

    /// Build a detector from a model locator.
    ///
    /// Locators starting with `stub://` select the scripted backend and need
    /// no model artifact. Anything else is treated as an ONNX model path,
    /// available only with the `backend-tract` feature.
    pub fn from_model(
        locator: &str,
        width: u32,
        height: u32,
        threshold: f32,
    ) -> Result<Self, PipelineError> {
        if locator.starts_with("stub://") {
            info!("detector: scripted backend ({})", locator);
            return Ok(Self::new(Box::new(ScriptedBackend::new())));
        }

        #[cfg(feature = "backend-tract")]
        {
            let labels = DEFAULT_LABELS.iter().map(|s| s.to_string()).collect();
            let backend = TractBackend::new(locator, width, height, labels)
                .map_err(|e| PipelineError::Detector {
                    reason: format!("{:#}", e),
                })?
                .with_threshold(threshold);
            info!("detector: tract backend loaded from {}", locator);
            return Ok(Self::new(Box::new(backend)));
        }

        #[cfg(not(feature = "backend-tract"))]
        {
            let _ = (width, height, threshold);
            Err(PipelineError::Detector {
                reason: format!(
                    "model path '{}' requires the backend-tract feature",
                    locator
                ),
            })
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the backend's warm-up pass so first-frame latency lands here
    /// instead of inside the display loop.
    pub fn warm_up(&mut self) -> Result<(), PipelineError> {
        self.backend
            .warm_up()
            .map_err(|e| PipelineError::Detector {
                reason: format!("{:#}", e),
            })
    }

    /// Run detection on one frame.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
        let detections = self
            .backend
            .detect(frame.pixels(), frame.width(), frame.height())
            .map_err(|e| PipelineError::Detector {
                reason: format!("{:#}", e),
            })?;
        debug!(
            "detector: {} detections on {}x{} frame",
            detections.len(),
            frame.width(),
            frame.height()
        );
        Ok(detections)
    }

    /// Drop the backend and the model it holds.
    pub fn release(self) {
        debug!("detector: releasing backend {}", self.backend.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_locator_selects_scripted_backend() {
        let detector = Detector::from_model("stub://ppe", 640, 480, 0.5).unwrap();
        assert_eq!(detector.backend_name(), "scripted");
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn model_path_without_tract_feature_is_an_error() {
        let err = Detector::from_model("/models/ppe.onnx", 640, 480, 0.5).unwrap_err();
        assert!(matches!(err, PipelineError::Detector { .. }));
    }

    #[test]
    fn detect_forwards_backend_output() {
        let det = Detection::new(
            "NO-Hardhat",
            0.87,
            BoundingBox {
                x: 1,
                y: 2,
                w: 3,
                h: 4,
            },
        );
        let backend = ScriptedBackend::with_frames(vec![vec![det.clone()]]);
        let mut detector = Detector::new(Box::new(backend));
        let frame = crate::frame::Frame::blank(8, 8);
        assert_eq!(detector.detect(&frame).unwrap(), vec![det]);
    }
}
