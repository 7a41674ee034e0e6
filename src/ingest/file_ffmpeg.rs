//! FFmpeg-backed local file decoder.
//!
//! Frames are decoded in-memory and converted to packed RGB24. Packet
//! exhaustion drains the decoder and then reports `EndOfStream`; individual
//! decode hiccups surface as `TransientRead` so the display loop can apply
//! its bounded tolerance.

use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use super::{FrameRead, VideoSource};
use crate::error::PipelineError;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(config: FileConfig) -> Result<Self, PipelineError> {
        let origin = format!("file:{}", config.path);
        let unavailable = |reason: String| PipelineError::SourceUnavailable {
            origin: origin.clone(),
            reason,
        };

        ffmpeg::init().map_err(|e| unavailable(format!("initialize ffmpeg: {e}")))?;
        let input = ffmpeg::format::input(&config.path)
            .map_err(|e| unavailable(format!("open video file: {e}")))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unavailable("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| unavailable(format!("load video decoder parameters: {e}")))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| unavailable(format!("open video decoder: {e}")))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| unavailable(format!("create RGB scaler: {e}")))?;

        log::info!("FileSource: opened {} (ffmpeg)", config.path);

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn describe(&self) -> String {
        format!("file:{}", self.config.path)
    }

    pub(crate) fn frames_read(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn is_healthy(&self) -> bool {
        !self.eof_sent
    }

    pub(crate) fn read(&mut self) -> Result<FrameRead, PipelineError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        while !self.eof_sent {
            let stream_index = self.stream_index;
            let packet = self
                .input
                .packets()
                .filter(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet)
                .next();

            match packet {
                Some(packet) => {
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| PipelineError::TransientRead {
                            reason: format!("send packet to decoder: {e}"),
                        })?;
                    if self.decoder.receive_frame(&mut decoded).is_ok() {
                        return self.convert(&decoded, &mut rgb_frame);
                    }
                }
                None => {
                    // Packets exhausted: flush the decoder for buffered frames.
                    self.eof_sent = true;
                    self.decoder
                        .send_eof()
                        .map_err(|e| PipelineError::TransientRead {
                            reason: format!("flush decoder: {e}"),
                        })?;
                }
            }
        }

        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return self.convert(&decoded, &mut rgb_frame);
        }
        Ok(FrameRead::EndOfStream)
    }

    fn convert(
        &mut self,
        decoded: &ffmpeg::frame::Video,
        rgb_frame: &mut ffmpeg::frame::Video,
    ) -> Result<FrameRead, PipelineError> {
        self.scaler
            .run(decoded, rgb_frame)
            .map_err(|e| PipelineError::TransientRead {
                reason: format!("scale frame to RGB: {e}"),
            })?;
        let (pixels, width, height) = frame_to_pixels(rgb_frame)?;
        let frame = Frame::new(pixels, width, height).map_err(|e| PipelineError::TransientRead {
            reason: e.to_string(),
        })?;
        self.frame_count += 1;
        Ok(FrameRead::Frame(frame))
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32), PipelineError> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).ok_or_else(|| {
            PipelineError::TransientRead {
                reason: "decoded frame row is out of bounds".to_string(),
            }
        })?);
    }

    Ok((pixels, width, height))
}
