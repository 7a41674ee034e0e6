//! Local video file frame source.
//!
//! `FileSource` decodes frames from a local video container. Real decoding is
//! backed by FFmpeg (feature: ingest-file-ffmpeg); `stub://` paths select a
//! synthetic backend that generates pattern frames for tests and demos.
//! A fully consumed file reports `EndOfStream`, which the display loop treats
//! as a successful terminal outcome.

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{stub_frame_limit, synthetic_pixels, FrameRead, VideoSource};
use crate::error::PipelineError;
use crate::frame::Frame;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/var/lib/sentinel/shift.mp4").
    pub path: String,
    /// Target frame rate. The backend may decimate to this rate.
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 10,
        }
    }
}

/// Local video file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(config: FileConfig) -> Result<Self, PipelineError> {
        if !is_local_file_path(&config.path) {
            return Err(PipelineError::SourceUnavailable {
                origin: format!("file:{}", config.path),
                reason: "file ingestion only supports local paths (no URL schemes)".to_string(),
            });
        }
        if config.path.starts_with("stub://") {
            let source = SyntheticFileSource::new(config);
            log::info!("FileSource: opened {} (synthetic)", source.config.path);
            return Ok(Self {
                backend: FileBackend::Synthetic(source),
            });
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(config)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(PipelineError::SourceUnavailable {
                origin: format!("file:{}", config.path),
                reason: "file ingestion requires the ingest-file-ffmpeg feature".to_string(),
            })
        }
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("origin", &self.describe())
            .field("frames_read", &self.frames_read())
            .finish()
    }
}

impl VideoSource for FileSource {
    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.read(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.read(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            FileBackend::Synthetic(source) => format!("file:{}", source.config.path),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.describe(),
        }
    }

    fn frames_read(&self) -> u64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frames_read(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    frame_count: u64,
    scene_state: u8,
    /// Simulated file length; `None` means the stub never ends.
    frame_limit: Option<u64>,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        let frame_limit = stub_frame_limit(&config.path);
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
            frame_limit,
        }
    }

    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                return Ok(FrameRead::EndOfStream);
            }
        }
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = synthetic_pixels(640, 480, self.frame_count, self.scene_state);
        let frame = Frame::new(pixels, 640, 480).map_err(|e| PipelineError::TransientRead {
            reason: e.to_string(),
        })?;
        Ok(FrameRead::Frame(frame))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_file_produces_frames() {
        let mut source = FileSource::open(FileConfig {
            path: "stub://shift".to_string(),
            target_fps: 10,
        })
        .unwrap();

        match source.read().unwrap() {
            FrameRead::Frame(frame) => {
                assert_eq!(frame.width(), 640);
                assert_eq!(frame.height(), 480);
            }
            FrameRead::EndOfStream => panic!("stub should not end immediately"),
        }
        assert_eq!(source.frames_read(), 1);
    }

    #[test]
    fn synthetic_file_ends_after_frame_limit() {
        let mut source = FileSource::open(FileConfig {
            path: "stub://shift?frames=2".to_string(),
            target_fps: 10,
        })
        .unwrap();

        assert!(matches!(source.read().unwrap(), FrameRead::Frame(_)));
        assert!(matches!(source.read().unwrap(), FrameRead::Frame(_)));
        assert!(matches!(source.read().unwrap(), FrameRead::EndOfStream));
        // End-of-stream is stable, not a one-shot.
        assert!(matches!(source.read().unwrap(), FrameRead::EndOfStream));
    }

    #[test]
    fn rejects_url_schemes() {
        let err = FileSource::open(FileConfig {
            path: "https://example.com/video.mp4".to_string(),
            target_fps: 10,
        })
        .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }
}
