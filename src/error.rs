//! Pipeline error taxonomy.
//!
//! Each variant corresponds to a distinct failure mode with a distinct
//! handling policy:
//!
//! - `SourceUnavailable`: the origin could not be opened. Reported
//!   immediately, never retried.
//! - `TransientRead`: a single failed frame read. The display loop tolerates
//!   a bounded number of these before giving up on the source.
//! - `LogWrite`: the violation log append failed. Propagates to the caller;
//!   a violation must never be dropped silently.
//! - `LogRead` / `MalformedLog`: viewer-side failures, distinct from the
//!   "no violations yet" empty state.
//! - `Notification`: the best-effort alert side channel failed. Never fatal,
//!   never blocks the logging path.
//! - `Detector`: inference failed. Terminal for the current session.
//! - `ConfirmationRequired`: an irreversible operation (log clear) was
//!   requested without explicit confirmation.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum PipelineError {
    SourceUnavailable {
        origin: String,
        reason: String,
    },
    TransientRead {
        reason: String,
    },
    LogWrite {
        path: PathBuf,
        reason: String,
    },
    LogRead {
        path: PathBuf,
        reason: String,
    },
    MalformedLog {
        path: PathBuf,
        /// 1-based line number of the offending row.
        line: usize,
        reason: String,
    },
    Notification {
        reason: String,
    },
    Detector {
        reason: String,
    },
    ConfirmationRequired {
        operation: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::SourceUnavailable { origin, reason } => {
                write!(f, "source unavailable ({origin}): {reason}")
            }
            PipelineError::TransientRead { reason } => {
                write!(f, "transient read failure: {reason}")
            }
            PipelineError::LogWrite { path, reason } => {
                write!(f, "violation log write failed ({}): {reason}", path.display())
            }
            PipelineError::LogRead { path, reason } => {
                write!(f, "violation log read failed ({}): {reason}", path.display())
            }
            PipelineError::MalformedLog { path, line, reason } => {
                write!(
                    f,
                    "malformed violation log ({} line {line}): {reason}",
                    path.display()
                )
            }
            PipelineError::Notification { reason } => {
                write!(f, "alert notification failed: {reason}")
            }
            PipelineError::Detector { reason } => {
                write!(f, "detector failure: {reason}")
            }
            PipelineError::ConfirmationRequired { operation } => {
                write!(f, "{operation} requires explicit confirmation")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::TransientRead { .. })
    }
}
