//! Violation logbook.
//!
//! Append-only CSV record of trigger-matching detections. The file is the
//! durable output of a monitoring session and survives process restarts; a
//! session appends to an existing log rather than truncating it.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};

use crate::alert::Notifier;
use crate::error::PipelineError;

/// First line of every log file. The viewer refuses files whose header does
/// not match byte for byte.
pub const LOG_HEADER: &str = "Timestamp,Violation,Confidence";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decides which detection labels count as violations.
///
/// The default substring rule is an inherited label-taxonomy convention
/// (negative classes are spelled "NO-<item>"); sites with labels that would
/// false-positive on it should configure an allowlist instead.
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerRule {
    /// Case-insensitive substring match against the label.
    LabelSubstring(String),
    /// Exact-match allowlist of violation labels.
    Allowlist(Vec<String>),
}

impl TriggerRule {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            TriggerRule::LabelSubstring(needle) => label
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
            TriggerRule::Allowlist(labels) => {
                labels.iter().any(|l| l.eq_ignore_ascii_case(label))
            }
        }
    }
}

impl Default for TriggerRule {
    fn default() -> Self {
        TriggerRule::LabelSubstring("NO".to_string())
    }
}

/// One logged violation, as written to and read back from the CSV file.
#[derive(Clone, Debug, PartialEq)]
pub struct ViolationRecord {
    /// Local wall-clock time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub label: String,
    /// Confidence rounded to two decimals at write time.
    pub confidence: f32,
}

impl ViolationRecord {
    fn csv_line(&self) -> String {
        format!("{},{},{:.2}", self.timestamp, self.label, self.confidence)
    }
}

/// Append-side handle on the violation log.
pub struct ViolationLog {
    path: PathBuf,
    rule: TriggerRule,
    notifier: Option<Box<dyn Notifier>>,
}

impl ViolationLog {
    pub fn new(path: impl Into<PathBuf>, rule: TriggerRule) -> Self {
        Self {
            path: path.into(),
            rule,
            notifier: None,
        }
    }

    /// Attach a notifier fired on every logged violation. Notifier failures
    /// are logged and swallowed; they never fail the record.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rule(&self) -> &TriggerRule {
        &self.rule
    }

    /// Log a detection if its label matches the trigger rule.
    ///
    /// Returns the written record, or `None` when the label did not match.
    /// Labels containing a comma or newline would corrupt the row format and
    /// are rejected outright.
    pub fn record(
        &mut self,
        label: &str,
        confidence: f32,
    ) -> Result<Option<ViolationRecord>, PipelineError> {
        if !self.rule.matches(label) {
            return Ok(None);
        }
        if label.contains(',') || label.contains('\n') || label.contains('\r') {
            return Err(PipelineError::LogWrite {
                path: self.path.clone(),
                reason: format!("label '{}' contains a CSV delimiter", label.escape_default()),
            });
        }

        let record = ViolationRecord {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            label: label.to_string(),
            confidence: (confidence * 100.0).round() / 100.0,
        };
        self.append(&record)?;
        info!(
            "violation logged: {} ({:.2}) -> {}",
            record.label,
            record.confidence,
            self.path.display()
        );

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&record) {
                warn!("violation notifier failed: {}", e);
            }
        }

        Ok(Some(record))
    }

    fn append(&self, record: &ViolationRecord) -> Result<(), PipelineError> {
        let mut file = self.open_with_header()?;
        writeln!(file, "{}", record.csv_line()).map_err(|e| PipelineError::LogWrite {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Open the log for appending, writing the header exactly once.
    ///
    /// `create_new` makes header creation atomic against a concurrent opener:
    /// whoever wins the create writes the header, the loser falls through to
    /// a plain append.
    fn open_with_header(&self) -> Result<std::fs::File, PipelineError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", LOG_HEADER).map_err(|e| PipelineError::LogWrite {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(file)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| PipelineError::LogWrite {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }),
            Err(e) => Err(PipelineError::LogWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
