use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Scripted backend for tests and demos.
///
/// Replays queued detection sets, one per frame, then keeps returning the
/// configured steady-state answer (empty by default). Lets session tests
/// drive exact violation counts without a model artifact.
pub struct ScriptedBackend {
    queue: VecDeque<Vec<Detection>>,
    steady: Vec<Detection>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            steady: Vec::new(),
        }
    }

    /// Queue the detection set for the next unseen frame.
    pub fn push_frame(&mut self, detections: Vec<Detection>) {
        self.queue.push_back(detections);
    }

    pub fn with_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            queue: frames.into(),
            steady: Vec::new(),
        }
    }

    /// Answer returned after the queue is exhausted.
    pub fn with_steady(mut self, detections: Vec<Detection>) -> Self {
        self.steady = detections;
        self
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(self.queue.pop_front().unwrap_or_else(|| self.steady.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    #[test]
    fn replays_queue_then_steady_state() {
        let det = Detection::new(
            "NO-Helmet",
            0.9,
            BoundingBox {
                x: 0,
                y: 0,
                w: 10,
                h: 10,
            },
        );
        let mut backend = ScriptedBackend::with_frames(vec![vec![det.clone()], vec![]]);

        assert_eq!(backend.detect(&[], 0, 0).unwrap(), vec![det]);
        assert!(backend.detect(&[], 0, 0).unwrap().is_empty());
        // Queue exhausted: steady state (empty).
        assert!(backend.detect(&[], 0, 0).unwrap().is_empty());
    }
}
