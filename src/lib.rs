//! PPE Sentinel
//!
//! This crate implements a personal-protective-equipment monitoring pipeline
//! for industrial camera feeds.
//!
//! # Pipeline
//!
//! Frames flow through five stages:
//!
//! 1. **Ingest**: pull frames from a video file, camera device, network
//!    stream, or still image.
//! 2. **Detect**: run the configured detector backend over each frame.
//! 3. **Annotate**: draw labeled boxes onto the frame in place.
//! 4. **Log**: append trigger-matching detections to the violation CSV.
//! 5. **Render**: hand the annotated frame to the session's sink.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (file, camera, stream, still image, stub)
//! - `detect`: detector backends behind one trait
//! - `annotate`: box and label drawing
//! - `logbook` / `viewer`: violation CSV write and read sides
//! - `pipeline`: the display-session state machine
//! - `config`: JSON config file plus `SENTINEL_*` environment overrides

pub mod alert;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod logbook;
pub mod pipeline;
pub mod ui;
pub mod viewer;

pub use config::SentinelConfig;
pub use detect::{Detection, Detector};
pub use error::PipelineError;
pub use frame::Frame;
pub use ingest::{FrameRead, FrameSource, Origin, VideoSource};
pub use logbook::{TriggerRule, ViolationLog, ViolationRecord};
pub use pipeline::{DisplaySession, SessionReport, SessionState, StopSignal};
pub use viewer::{LogView, LogViewer};
