//! Single still image frame source.
//!
//! Decodes one image into a frame and then reports end-of-stream; the rest of
//! the pipeline treats an image exactly like a one-frame video, so annotation
//! and violation logging behave identically for both.

use std::path::{Path, PathBuf};

use super::{FrameRead, VideoSource};
use crate::error::PipelineError;
use crate::frame::Frame;

pub struct StillSource {
    path: PathBuf,
    frame: Option<Frame>,
    frames_read: u64,
}

impl StillSource {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let origin = format!("image:{}", path.display());
        let image = image::open(path).map_err(|e| PipelineError::SourceUnavailable {
            origin: origin.clone(),
            reason: format!("decode image: {e}"),
        })?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::new(rgb.into_raw(), width, height).map_err(|e| {
            PipelineError::SourceUnavailable {
                origin,
                reason: e.to_string(),
            }
        })?;
        log::info!("StillSource: decoded {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            frame: Some(frame),
            frames_read: 0,
        })
    }
}

impl VideoSource for StillSource {
    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        match self.frame.take() {
            Some(frame) => {
                self.frames_read += 1;
                Ok(FrameRead::Frame(frame))
            }
            None => Ok(FrameRead::EndOfStream),
        }
    }

    fn describe(&self) -> String {
        format!("image:{}", self.path.display())
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}
