use std::time::Duration;

use tempfile::tempdir;

use ppe_sentinel::detect::{BoundingBox, Detection, ScriptedBackend};
use ppe_sentinel::pipeline::{DisplaySession, FrameSink, NullSink, SessionState, StopSignal};
use ppe_sentinel::{
    Detector, Frame, FrameRead, FrameSource, Origin, PipelineError, TriggerRule, VideoSource,
    ViolationLog,
};

/// Source whose every read fails with a transient error.
struct FailingSource {
    attempts: u64,
}

impl VideoSource for FailingSource {
    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        self.attempts += 1;
        Err(PipelineError::TransientRead {
            reason: "simulated decoder stall".to_string(),
        })
    }

    fn describe(&self) -> String {
        "test:failing".to_string()
    }

    fn frames_read(&self) -> u64 {
        0
    }
}

/// Source producing a fixed number of frames, then end-of-stream.
struct FiniteSource {
    remaining: u64,
    produced: u64,
}

impl FiniteSource {
    fn new(frames: u64) -> Self {
        Self {
            remaining: frames,
            produced: 0,
        }
    }
}

impl VideoSource for FiniteSource {
    fn read(&mut self) -> Result<FrameRead, PipelineError> {
        if self.remaining == 0 {
            return Ok(FrameRead::EndOfStream);
        }
        self.remaining -= 1;
        self.produced += 1;
        Ok(FrameRead::Frame(Frame::blank(32, 24)))
    }

    fn describe(&self) -> String {
        "test:finite".to_string()
    }

    fn frames_read(&self) -> u64 {
        self.produced
    }
}

fn scripted_detector(script: Vec<Vec<Detection>>) -> Detector {
    Detector::new(Box::new(ScriptedBackend::with_frames(script)))
}

fn no_hardhat(confidence: f32) -> Detection {
    Detection::new(
        "NO-Hardhat",
        confidence,
        BoundingBox {
            x: 4,
            y: 4,
            w: 8,
            h: 8,
        },
    )
}

#[test]
fn eleventh_consecutive_failure_ends_the_session() {
    let dir = tempdir().unwrap();
    let logbook = ViolationLog::new(dir.path().join("v.csv"), TriggerRule::default());
    let session = DisplaySession::new(
        FailingSource { attempts: 0 },
        scripted_detector(Vec::new()),
        logbook,
    )
    .with_pacing(Duration::ZERO);

    let report = session.run(&StopSignal::new(), &mut NullSink).unwrap();

    assert_eq!(report.state, SessionState::Failed);
    assert_eq!(report.frames_processed, 0);
    // Ten tolerated failures plus the one that tips the count over.
    assert_eq!(report.read_attempts, 11);
}

#[test]
fn end_of_stream_is_a_clean_exit() {
    let dir = tempdir().unwrap();
    let logbook = ViolationLog::new(dir.path().join("v.csv"), TriggerRule::default());
    let session = DisplaySession::new(FiniteSource::new(5), scripted_detector(Vec::new()), logbook)
        .with_pacing(Duration::ZERO);

    let report = session.run(&StopSignal::new(), &mut NullSink).unwrap();

    assert_eq!(report.state, SessionState::Ended);
    assert_eq!(report.frames_processed, 5);
    assert_eq!(report.violations_logged, 0);
}

#[test]
fn pre_set_stop_signal_processes_nothing() {
    let dir = tempdir().unwrap();
    let logbook = ViolationLog::new(dir.path().join("v.csv"), TriggerRule::default());
    let session = DisplaySession::new(
        FiniteSource::new(100),
        scripted_detector(Vec::new()),
        logbook,
    )
    .with_pacing(Duration::ZERO);

    let stop = StopSignal::new();
    stop.stop();
    let report = session.run(&stop, &mut NullSink).unwrap();

    assert_eq!(report.state, SessionState::Stopped);
    assert_eq!(report.frames_processed, 0);
    assert_eq!(report.read_attempts, 0);
}

#[test]
fn violations_land_in_the_log_during_a_session() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("v.csv");
    let script = vec![
        vec![no_hardhat(0.87)],
        vec![],
        vec![no_hardhat(0.91), no_hardhat(0.66)],
    ];
    let logbook = ViolationLog::new(&log_path, TriggerRule::default());
    let session = DisplaySession::new(FiniteSource::new(3), scripted_detector(script), logbook)
        .with_pacing(Duration::ZERO);

    let report = session.run(&StopSignal::new(), &mut NullSink).unwrap();

    assert_eq!(report.state, SessionState::Ended);
    assert_eq!(report.violations_logged, 3);

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].ends_with(",NO-Hardhat,0.87"));
}

#[test]
fn compliant_session_creates_no_log_file() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("v.csv");
    let script = vec![vec![Detection::new(
        "Hardhat",
        0.95,
        BoundingBox {
            x: 0,
            y: 0,
            w: 8,
            h: 8,
        },
    )]];
    let logbook = ViolationLog::new(&log_path, TriggerRule::default());
    let session = DisplaySession::new(FiniteSource::new(2), scripted_detector(script), logbook)
        .with_pacing(Duration::ZERO);

    let report = session.run(&StopSignal::new(), &mut NullSink).unwrap();

    assert_eq!(report.state, SessionState::Ended);
    assert_eq!(report.violations_logged, 0);
    assert!(!log_path.exists());
}

#[test]
fn annotated_frames_reach_the_sink() {
    struct CaptureSink {
        frames: Vec<Frame>,
    }
    impl FrameSink for CaptureSink {
        fn render(&mut self, frame: &Frame) {
            self.frames.push(frame.clone());
        }
    }

    let dir = tempdir().unwrap();
    let logbook = ViolationLog::new(dir.path().join("v.csv"), TriggerRule::default());
    let script = vec![vec![no_hardhat(0.87)]];
    let session = DisplaySession::new(FiniteSource::new(1), scripted_detector(script), logbook)
        .with_pacing(Duration::ZERO);

    let mut sink = CaptureSink { frames: Vec::new() };
    session.run(&StopSignal::new(), &mut sink).unwrap();

    assert_eq!(sink.frames.len(), 1);
    // Annotation touched the frame: it is no longer all-black.
    assert_ne!(sink.frames[0], Frame::blank(32, 24));
}

#[test]
fn unreachable_stream_fails_at_open_not_in_the_loop() {
    let err = FrameSource::open(Origin::Stream("stub://unreachable".to_string())).unwrap_err();
    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
}

#[test]
fn finite_stub_source_runs_to_ended() {
    let dir = tempdir().unwrap();
    let logbook = ViolationLog::new(dir.path().join("v.csv"), TriggerRule::default());
    let source = FrameSource::open(Origin::File("stub://clip?frames=4".into())).unwrap();
    let session = DisplaySession::new(source, scripted_detector(Vec::new()), logbook)
        .with_pacing(Duration::ZERO);

    let report = session.run(&StopSignal::new(), &mut NullSink).unwrap();
    assert_eq!(report.state, SessionState::Ended);
    assert_eq!(report.frames_processed, 4);
}
