//! Display session state machine.
//!
//! Owns the read/detect/annotate/log/render loop for one monitoring session.
//! The loop tolerates a bounded run of consecutive failed reads before
//! declaring the stream lost, and paces frame delivery so a fast source does
//! not spin the CPU.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::annotate::annotate;
use crate::detect::Detector;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::{FrameRead, VideoSource};
use crate::logbook::ViolationLog;

/// Consecutive failed reads tolerated before the session gives up. The
/// failure that pushes the count past this bound ends the session.
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 10;

/// Delay between rendered frames.
pub const DEFAULT_FRAME_PACING: Duration = Duration::from_millis(30);

/// Lifecycle of a display session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not yet running.
    Idle,
    Streaming,
    /// Operator asked for a stop; a clean exit.
    Stopped,
    /// The source reported end-of-stream; a clean exit.
    Ended,
    /// Too many consecutive read failures; the stream is lost.
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Streaming)
    }
}

/// Cooperative stop flag, shared between the session and signal handlers.
#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer of annotated frames. The daemon wires in a health logger, the
/// tests count frames; nothing in the loop cares which.
pub trait FrameSink {
    fn render(&mut self, frame: &Frame);
}

/// Sink that discards every frame.
pub struct NullSink;

impl FrameSink for NullSink {
    fn render(&mut self, _frame: &Frame) {}
}

/// How a finished session went.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub state: SessionState,
    pub frames_processed: u64,
    pub violations_logged: u64,
    pub read_attempts: u64,
}

/// One monitoring session over one source.
pub struct DisplaySession<S: VideoSource> {
    source: S,
    detector: Detector,
    logbook: ViolationLog,
    pacing: Duration,
    max_read_failures: u32,
    state: SessionState,
}

impl<S: VideoSource> DisplaySession<S> {
    pub fn new(source: S, detector: Detector, logbook: ViolationLog) -> Self {
        Self {
            source,
            detector,
            logbook,
            pacing: DEFAULT_FRAME_PACING,
            max_read_failures: MAX_CONSECUTIVE_READ_FAILURES,
            state: SessionState::Idle,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to a terminal state.
    ///
    /// Returns `Ok` with the report for every source-side outcome, including
    /// `Failed`; `Err` is reserved for faults the loop cannot absorb, a
    /// detector fault or a log write failure.
    pub fn run(
        mut self,
        stop: &StopSignal,
        sink: &mut dyn FrameSink,
    ) -> Result<SessionReport, PipelineError> {
        info!("session started on {}", self.source.describe());
        self.state = SessionState::Streaming;

        let mut frames_processed: u64 = 0;
        let mut violations_logged: u64 = 0;
        let mut read_attempts: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            if stop.is_stopped() {
                info!("session stopped by operator after {} frames", frames_processed);
                self.state = SessionState::Stopped;
                break;
            }

            read_attempts += 1;
            let mut frame = match self.source.read() {
                Ok(FrameRead::Frame(frame)) => {
                    consecutive_failures = 0;
                    frame
                }
                Ok(FrameRead::EndOfStream) => {
                    info!("source ended after {} frames", frames_processed);
                    self.state = SessionState::Ended;
                    break;
                }
                Err(e) if e.is_transient() => {
                    consecutive_failures += 1;
                    warn!(
                        "frame read failed ({}/{}): {}",
                        consecutive_failures, self.max_read_failures, e
                    );
                    if consecutive_failures > self.max_read_failures {
                        error!("stream lost: {}", self.source.describe());
                        self.state = SessionState::Failed;
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let detections = self.detector.detect(&frame)?;
            annotate(&mut frame, &detections);
            for detection in &detections {
                if self
                    .logbook
                    .record(&detection.label, detection.confidence)?
                    .is_some()
                {
                    violations_logged += 1;
                }
            }

            sink.render(&frame);
            frames_processed += 1;

            if !self.pacing.is_zero() {
                thread::sleep(self.pacing);
            }
        }

        self.detector.release();
        Ok(SessionReport {
            state: self.state,
            frames_processed,
            violations_logged,
            read_attempts,
        })
    }
}
