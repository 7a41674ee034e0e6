//! Network stream frame source.
//!
//! `StreamSource` pulls frames from an RTSP/RTMP/HTTP video stream. Real
//! decoding is backed by GStreamer (feature: stream-gstreamer); `stub://`
//! URLs select a synthetic backend for tests and demos.
//!
//! Opening is fail-fast: if the transport cannot be established within the
//! connect timeout, `open` returns `SourceUnavailable` instead of hanging.
//! A stalled or briefly dropped stream surfaces individual reads as
//! `TransientRead`: RTSP cameras drop frames routinely, and it is the
//! display loop's job to decide when "transient" has become "lost".

use super::{redact_credentials, stub_frame_limit, synthetic_pixels, FrameRead, VideoSource};
use crate::error::PipelineError;
use crate::frame::Frame;

/// Configuration for a network stream source.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Stream URL (e.g., "rtsp://192.168.1.100:554/stream").
    pub url: String,
    /// Target frame rate. The backend will decimate to this rate.
    pub target_fps: u32,
    /// Frame width (used by synthetic frames).
    pub width: u32,
    /// Frame height (used by synthetic frames).
    pub height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "rtsp://localhost:554/stream".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Network stream frame source.
pub struct StreamSource {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticStreamSource),
    #[cfg(feature = "stream-gstreamer")]
    Gstreamer(GstreamerStreamSource),
}

impl StreamSource {
    pub fn open(config: StreamConfig) -> Result<Self, PipelineError> {
        if config.url.starts_with("stub://") {
            let source = SyntheticStreamSource::open(config)?;
            return Ok(Self {
                backend: StreamBackend::Synthetic(source),
            });
        }
        #[cfg(feature = "stream-gstreamer")]
        {
            Ok(Self {
                backend: StreamBackend::Gstreamer(GstreamerStreamSource::open(config)?),
            })
        }
        #[cfg(not(feature = "stream-gstreamer"))]
        {
            Err(PipelineError::SourceUnavailable {
                origin: format!("stream:{}", redact_credentials(&config.url)),
                reason: "stream ingestion requires the stream-gstreamer feature".to_string(),
            })
        }
    }
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("origin", &self.describe())
            .field("frames_read", &self.frames_read())
            .finish()
    }
}

impl VideoSource for StreamSource {
    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.read(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.read(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            StreamBackend::Synthetic(source) => {
                format!("stream:{}", redact_credentials(&source.config.url))
            }
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.describe(),
        }
    }

    fn frames_read(&self) -> u64 {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.frame_count,
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            StreamBackend::Synthetic(_) => true,
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.is_healthy(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticStreamSource {
    config: StreamConfig,
    frame_count: u64,
    scene_state: u8,
    frame_limit: Option<u64>,
}

impl SyntheticStreamSource {
    fn open(config: StreamConfig) -> Result<Self, PipelineError> {
        // "stub://unreachable" simulates a camera that cannot be reached,
        // so the fail-fast open contract is testable without a network.
        let host = config
            .url
            .trim_start_matches("stub://")
            .split(['/', '?'])
            .next()
            .unwrap_or("");
        if host == "unreachable" {
            return Err(PipelineError::SourceUnavailable {
                origin: format!("stream:{}", config.url),
                reason: "connection refused (synthetic)".to_string(),
            });
        }
        let frame_limit = stub_frame_limit(&config.url);
        log::info!("StreamSource: connected to {} (synthetic)", config.url);
        Ok(Self {
            config,
            frame_count: 0,
            scene_state: 0,
            frame_limit,
        })
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
// Production stream source using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "stream-gstreamer")]
use gstreamer::prelude::*;

#[cfg(feature = "stream-gstreamer")]
struct GstreamerStreamSource {
    config: StreamConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_error: Option<String>,
    reached_eos: bool,
}

#[cfg(feature = "stream-gstreamer")]
impl GstreamerStreamSource {
    /// Connect timeout for the fail-fast open contract.
    const CONNECT_TIMEOUT_SECS: u64 = 10;

    fn open(config: StreamConfig) -> Result<Self, PipelineError> {
        let origin = format!("stream:{}", redact_credentials(&config.url));
        let unavailable = |reason: String| PipelineError::SourceUnavailable {
            origin: origin.clone(),
            reason,
        };

        gstreamer::init().map_err(|e| unavailable(format!("initialize gstreamer: {e}")))?;

        let pipeline_description = format!(
            "rtspsrc location={} latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            config.url
        );
        let pipeline = gstreamer::parse::launch(&pipeline_description)
            .map_err(|e| unavailable(format!("build stream pipeline: {e}")))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| unavailable("stream pipeline is not a Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| unavailable("appsink element missing from pipeline".to_string()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| unavailable("appsink element has unexpected type".to_string()))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| unavailable(format!("start stream pipeline: {e}")))?;

        // Wait for the pipeline to actually reach Playing; an unreachable
        // camera fails here instead of hanging in the first read.
        let timeout = gstreamer::ClockTime::from_seconds(Self::CONNECT_TIMEOUT_SECS);
        let (state_result, _, _) = pipeline.state(timeout);
        if state_result.is_err() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(unavailable("stream did not reach playing state".to_string()));
        }

        log::info!("StreamSource: connected to {}", redact_credentials(&config.url));

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_error: None,
            reached_eos: false,
        })
    }

    fn describe(&self) -> String {
        format!("stream:{}", redact_credentials(&self.config.url))
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none() && !self.reached_eos
    }

    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        self.poll_bus();
        if self.reached_eos {
            return Ok(FrameRead::EndOfStream);
        }

        let sample = self
            .appsink
            .try_pull_sample(self.frame_timeout())
            .ok_or_else(|| PipelineError::TransientRead {
                reason: "stream stalled (no sample within timeout)".to_string(),
            })?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;
        let frame = Frame::new(pixels, width, height).map_err(|e| PipelineError::TransientRead {
            reason: e.to_string(),
        })?;
        self.frame_count += 1;
        Ok(FrameRead::Frame(frame))
    }

    fn frame_timeout(&self) -> gstreamer::ClockTime {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        gstreamer::ClockTime::from_mseconds(base_ms.max(500) as u64)
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.reached_eos = true;
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "stream-gstreamer")]
impl Drop for GstreamerStreamSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

#[cfg(feature = "stream-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32), PipelineError> {
    let transient = |reason: String| PipelineError::TransientRead { reason };

    let buffer = sample
        .buffer()
        .ok_or_else(|| transient("stream sample missing buffer".to_string()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| transient("stream sample missing caps".to_string()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| transient(format!("parse stream caps as video info: {e}")))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer
        .map_readable()
        .map_err(|e| transient(format!("map stream buffer: {e}")))?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| transient("stream buffer row is out of bounds".to_string()))?,
        );
    }

    Ok((pixels, width, height))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(url: &str) -> StreamConfig {
        StreamConfig {
            url: url.to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn stream_source_produces_frames() {
        let mut source = StreamSource::open(stub_config("stub://cam")).unwrap();
        match source.read().unwrap() {
            FrameRead::Frame(frame) => {
                assert_eq!(frame.width(), 640);
                assert_eq!(frame.height(), 480);
            }
            FrameRead::EndOfStream => panic!("stub stream should not end"),
        }
    }

    #[test]
    fn unreachable_stream_fails_fast_on_open() {
        let err = StreamSource::open(stub_config("stub://unreachable")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = StreamSource::open(stub_config("stub://cam")).unwrap();
        let FrameRead::Frame(a) = source.read().unwrap() else {
            panic!("expected frame");
        };
        let FrameRead::Frame(b) = source.read().unwrap() else {
            panic!("expected frame");
        };
        assert_ne!(a, b);
    }
}
