//! RGB frame container.
//!
//! `Frame` is the unit of work flowing through the pipeline: ingestion
//! produces frames, the detector reads their pixels, the annotator mutates
//! them, and a `FrameSink` renders them. Pixel layout is packed RGB8,
//! row-major, no padding.

use anyhow::{anyhow, Result};

/// Bytes per pixel (packed RGB8).
pub const CHANNELS: usize = 3;

/// An owned RGB8 frame.
///
/// Invariant: `data.len() == width * height * 3`, enforced at construction.
#[derive(Clone, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap a packed RGB8 buffer. Fails when the buffer length does not match
    /// the stated dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} RGB",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// An all-black frame of the given dimensions.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width as usize) * (height as usize) * CHANNELS],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Bounds-checked pixel write. Out-of-range coordinates are ignored so
    /// drawing code can clip implicitly.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        self.data[idx..idx + CHANNELS].copy_from_slice(&rgb);
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 4, 4).is_err());
        assert!(Frame::new(vec![0u8; 48], 4, 4).is_ok());
    }

    #[test]
    fn pixel_roundtrip_and_bounds() {
        let mut frame = Frame::blank(8, 8);
        frame.put_pixel(3, 5, [1, 2, 3]);
        assert_eq!(frame.pixel(3, 5), Some([1, 2, 3]));
        assert_eq!(frame.pixel(8, 0), None);

        // Out-of-range writes are no-ops, not panics.
        frame.put_pixel(100, 100, [9, 9, 9]);
        assert_eq!(frame.pixel(7, 7), Some([0, 0, 0]));
    }
}
