use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend wraps one loaded model artifact. Implementations must treat the
/// pixel slice as read-only and ephemeral, and must not perform network I/O
/// during `detect`.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a packed RGB8 frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook (first-inference latency).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
