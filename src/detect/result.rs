/// A labeled bounding region in pixel coordinates.
///
/// Width/height may extend past the frame edge when the model emits sloppy
/// boxes; the annotator clips at draw time.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One model output: a labeled, confidence-scored bounding region.
///
/// Detections are produced fresh per frame, consumed immediately by the
/// annotator and the violation log, then discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Class label from the model's label table (e.g. "Helmet", "NO-Helmet").
    pub label: String,
    /// Confidence score in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}
