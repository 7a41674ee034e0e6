//! demo - end-to-end pipeline walkthrough without hardware
//!
//! Runs a short monitoring session over a synthetic source with a scripted
//! detector, then prints the resulting violation log. Useful as a smoke test
//! of the full read/detect/annotate/log path on a machine with no camera,
//! no model file and no network.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use ppe_sentinel::detect::{BoundingBox, Detection, ScriptedBackend};
use ppe_sentinel::pipeline::{DisplaySession, FrameSink, StopSignal};
use ppe_sentinel::ui::Ui;
use ppe_sentinel::{
    Detector, Frame, FrameSource, LogView, LogViewer, Origin, TriggerRule, ViolationLog,
};

#[derive(clap::Parser, Debug)]
#[command(name = "demo", about = "Run the PPE pipeline against synthetic frames")]
struct Args {
    /// Number of synthetic frames to produce
    #[arg(long, default_value_t = 30)]
    frames: u64,

    /// Frames per second of the synthetic source
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Where to write the violation log
    #[arg(long, default_value = "demo-violations.csv")]
    log: PathBuf,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

struct CountingSink {
    frames: u64,
}

impl FrameSink for CountingSink {
    fn render(&mut self, _frame: &Frame) {
        self.frames += 1;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = <Args as clap::Parser>::parse();
    let ui = Ui::from_flag(Some(&args.ui));

    let source = {
        let _stage = ui.stage("Open synthetic source");
        FrameSource::open(Origin::File(PathBuf::from(format!(
            "stub://demo?frames={}",
            args.frames
        ))))?
    };

    // Scripted detector: a compliant worker most frames, a missing hardhat
    // every tenth frame.
    let detector = {
        let _stage = ui.stage("Build scripted detector");
        let mut script = Vec::new();
        for i in 0..args.frames {
            let mut detections = vec![Detection::new(
                "Person",
                0.93,
                BoundingBox {
                    x: 120,
                    y: 80,
                    w: 160,
                    h: 320,
                },
            )];
            if i % 10 == 0 {
                detections.push(Detection::new(
                    "NO-Hardhat",
                    0.87,
                    BoundingBox {
                        x: 150,
                        y: 60,
                        w: 90,
                        h: 70,
                    },
                ));
            }
            script.push(detections);
        }
        Detector::new(Box::new(ScriptedBackend::with_frames(script)))
    };

    let logbook = ViolationLog::new(&args.log, TriggerRule::default());
    let pacing = Duration::from_millis(1000 / u64::from(args.fps.max(1)));
    let session = DisplaySession::new(source, detector, logbook).with_pacing(pacing);

    let report = {
        let stage = ui.stage("Run session");
        let stop = StopSignal::new();
        let mut sink = CountingSink { frames: 0 };
        let report = session.run(&stop, &mut sink).context("session failed")?;
        stage.progress(&format!("{} frames", sink.frames));
        report
    };

    ui.note(&format!(
        "session ended {:?}: {} frames, {} violations",
        report.state, report.frames_processed, report.violations_logged
    ));

    match LogViewer::new(&args.log).read_tail(10)? {
        LogView::Empty => println!("no violations logged"),
        LogView::Records(records) => {
            println!("last {} violations in {}:", records.len(), args.log.display());
            for record in records {
                println!(
                    "  {}  {}  {:.2}",
                    record.timestamp, record.label, record.confidence
                );
            }
        }
    }

    Ok(())
}
