//! sentineld - PPE monitoring daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (file, camera, stream or image)
//! 2. Runs the detector over each frame
//! 3. Annotates frames and appends trigger-matching detections to the
//!    violation log
//! 4. Stops cleanly on Ctrl-C, end-of-stream, or stream loss

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use ppe_sentinel::alert::{CommandNotifier, Notifier, NullNotifier};
use ppe_sentinel::pipeline::{DisplaySession, FrameSink, NullSink, SessionState, StopSignal};
use ppe_sentinel::{
    Detector, Frame, FrameSource, SentinelConfig, VideoSource, ViolationLog,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Sink that keeps a heartbeat in the journal instead of opening a window.
/// Headless deployments have nowhere to render; frame counts stand in for
/// the preview.
struct HealthLogSink {
    frames: u64,
    last_report: Instant,
}

impl HealthLogSink {
    fn new() -> Self {
        Self {
            frames: 0,
            last_report: Instant::now(),
        }
    }
}

impl FrameSink for HealthLogSink {
    fn render(&mut self, frame: &Frame) {
        self.frames += 1;
        if self.last_report.elapsed() >= HEALTH_LOG_INTERVAL {
            log::info!(
                "healthy: {} frames rendered, last {}x{}",
                self.frames,
                frame.width(),
                frame.height()
            );
            self.last_report = Instant::now();
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(SessionState::Failed) => {
            log::error!("sentineld exiting: stream lost");
            ExitCode::from(2)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("sentineld failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<SessionState> {
    let cfg = SentinelConfig::load().context("failed to load configuration")?;
    let origin = cfg.origin()?;

    log::info!(
        "sentineld v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        origin.describe()
    );
    log::info!("violation log: {}", cfg.log_path.display());

    let mut detector = Detector::from_model(
        &cfg.detector.model_path,
        cfg.source.width,
        cfg.source.height,
        cfg.detector.confidence_threshold,
    )?;
    detector.warm_up()?;
    log::info!("detector backend: {}", detector.backend_name());

    let notifier: Box<dyn Notifier> = match &cfg.alert_command {
        Some(alert) => Box::new(CommandNotifier::new(
            alert.program.clone(),
            alert.args.clone(),
        )),
        None => Box::new(NullNotifier),
    };
    let logbook =
        ViolationLog::new(&cfg.log_path, cfg.trigger.clone()).with_notifier(notifier);

    let settings = ppe_sentinel::ingest::SourceSettings {
        target_fps: cfg.source.target_fps,
        width: cfg.source.width,
        height: cfg.source.height,
    };
    let source = FrameSource::open_with(origin, &settings)?;
    log::info!("source open: {}", source.describe());

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("stop requested");
        handler_stop.stop();
    })
    .context("failed to install signal handler")?;

    let session = DisplaySession::new(source, detector, logbook).with_pacing(cfg.pacing);
    let mut sink: Box<dyn FrameSink> = if std::env::var_os("SENTINEL_NO_RENDER").is_some() {
        Box::new(NullSink)
    } else {
        Box::new(HealthLogSink::new())
    };

    let report = session.run(&stop, sink.as_mut())?;
    log::info!(
        "session finished: {:?}, {} frames, {} violations, {} read attempts",
        report.state,
        report.frames_processed,
        report.violations_logged,
        report.read_attempts
    );
    Ok(report.state)
}
