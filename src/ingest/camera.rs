//! Local camera device frame source.
//!
//! `CameraSource` captures frames from a V4L2 device node (feature:
//! ingest-v4l2); `stub://` device strings select a synthetic backend.

#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;

use super::{synthetic_pixels, FrameRead, VideoSource};
use crate::error::PipelineError;
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://..." for synthetic.
    pub device: String,
    /// Target frame rate. The driver will decimate to this rate if it can.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Local camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCameraSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCameraSource),
}

impl CameraSource {
    pub fn open(config: CameraConfig) -> Result<Self, PipelineError> {
        if config.device.starts_with("stub://") {
            log::info!("CameraSource: opened {} (synthetic)", config.device);
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCameraSource::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceCameraSource::open(config)?),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(PipelineError::SourceUnavailable {
                origin: format!("camera:{}", config.device),
                reason: "camera ingestion requires the ingest-v4l2 feature".to_string(),
            })
        }
    }
}

impl VideoSource for CameraSource {
    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.read(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.read(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            CameraBackend::Synthetic(source) => format!("camera:{}", source.config.device),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => format!("camera:{}", source.config.device),
        }
    }

    fn frames_read(&self) -> u64 {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.frame_count,
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticCameraSource {
    config: CameraConfig,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticCameraSource {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = synthetic_pixels(
            self.config.width,
            self.config.height,
            self.frame_count,
            self.scene_state,
        );
        let frame = Frame::new(pixels, self.config.width, self.config.height).map_err(|e| {
            PipelineError::TransientRead {
                reason: e.to_string(),
            }
        })?;
        Ok(FrameRead::Frame(frame))
    }
}

// ----------------------------------------------------------------------------
// Production camera source using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCameraSource {
    config: CameraConfig,
    state: DeviceCameraState,
    frame_count: u64,
    failing: bool,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceCameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCameraSource {
    fn open(config: CameraConfig) -> Result<Self, PipelineError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let origin = format!("camera:{}", config.device);
        let unavailable = |reason: String| PipelineError::SourceUnavailable {
            origin: origin.clone(),
            reason,
        };

        let mut device = v4l::Device::with_path(&config.device)
            .map_err(|e| unavailable(format!("open device: {e}")))?;
        let mut format = device
            .format()
            .map_err(|e| unavailable(format!("read device format: {e}")))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("CameraSource: failed to set format on {}: {}", config.device, err);
                device
                    .format()
                    .map_err(|e| unavailable(format!("read format after set failure: {e}")))?
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("CameraSource: failed to set fps on {}: {}", config.device, err);
            }
        }

        let active_width = format.width;
        let active_height = format.height;

        let state = DeviceCameraStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|e| unavailable(format!("create capture stream: {e}")))?;

        log::info!(
            "CameraSource: connected to {} ({}x{})",
            config.device,
            active_width,
            active_height
        );

        Ok(Self {
            config,
            state,
            frame_count: 0,
            failing: false,
            active_width,
            active_height,
        })
    }

    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        use v4l::io::traits::CaptureStream;

        let (width, height) = (self.active_width, self.active_height);
        let capture = self.state.with_stream_mut(|stream| {
            stream.next().map(|(buf, _meta)| buf.to_vec())
        });
        let buf = match capture {
            Ok(buf) => buf,
            Err(err) => {
                self.failing = true;
                return Err(PipelineError::TransientRead {
                    reason: format!("capture camera frame: {err}"),
                });
            }
        };
        self.failing = false;

        let frame = Frame::new(buf, width, height).map_err(|e| PipelineError::TransientRead {
            reason: e.to_string(),
        })?;
        self.frame_count += 1;
        Ok(FrameRead::Frame(frame))
    }

    fn is_healthy(&self) -> bool {
        !self.failing
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_camera_produces_frames() {
        let mut source = CameraSource::open(CameraConfig {
            device: "stub://cam0".to_string(),
            target_fps: 10,
            width: 320,
            height: 240,
        })
        .unwrap();

        match source.read().unwrap() {
            FrameRead::Frame(frame) => {
                assert_eq!(frame.width(), 320);
                assert_eq!(frame.height(), 240);
            }
            FrameRead::EndOfStream => panic!("stub camera should not end"),
        }
        assert!(source.is_healthy());
    }
}
