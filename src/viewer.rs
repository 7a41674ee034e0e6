//! Violation log viewer.
//!
//! Read side of the logbook. Keeps a strict distinction between a log with
//! no violations and a log that cannot be trusted: a missing file or a bare
//! header reads as `Empty`, while a bad header or an unparseable row is a
//! `MalformedLog` error naming the offending line.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::PipelineError;
use crate::logbook::{ViolationRecord, LOG_HEADER};

/// What a read of the log produced.
#[derive(Clone, Debug, PartialEq)]
pub enum LogView {
    /// No log file, or a header with no rows.
    Empty,
    Records(Vec<ViolationRecord>),
}

pub struct LogViewer {
    path: PathBuf,
}

impl LogViewer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the most recent `n` records, oldest first.
    pub fn read_tail(&self, n: usize) -> Result<LogView, PipelineError> {
        match self.read_all()? {
            LogView::Empty => Ok(LogView::Empty),
            LogView::Records(mut records) => {
                if records.len() > n {
                    records.drain(..records.len() - n);
                }
                Ok(LogView::Records(records))
            }
        }
    }

    /// Read every record in file order.
    pub fn read_all(&self) -> Result<LogView, PipelineError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogView::Empty),
            Err(e) => {
                return Err(PipelineError::LogRead {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let mut lines = content.lines().enumerate();
        match lines.next() {
            None => return Ok(LogView::Empty),
            Some((_, header)) if header == LOG_HEADER => {}
            Some((i, header)) => {
                return Err(PipelineError::MalformedLog {
                    path: self.path.clone(),
                    line: i + 1,
                    reason: format!("bad header '{}'", header),
                })
            }
        }

        let mut records = Vec::new();
        for (i, line) in lines {
            if line.is_empty() {
                continue;
            }
            records.push(self.parse_row(i + 1, line)?);
        }

        if records.is_empty() {
            Ok(LogView::Empty)
        } else {
            Ok(LogView::Records(records))
        }
    }

    fn parse_row(&self, line_no: usize, line: &str) -> Result<ViolationRecord, PipelineError> {
        let mut fields = line.splitn(3, ',');
        let (timestamp, label, confidence) = match (fields.next(), fields.next(), fields.next()) {
            (Some(t), Some(l), Some(c)) => (t, l, c),
            _ => {
                return Err(PipelineError::MalformedLog {
                    path: self.path.clone(),
                    line: line_no,
                    reason: "expected 3 comma-separated fields".to_string(),
                })
            }
        };

        let confidence: f32 = confidence.parse().map_err(|_| PipelineError::MalformedLog {
            path: self.path.clone(),
            line: line_no,
            reason: format!("confidence '{}' is not a number", confidence),
        })?;

        Ok(ViolationRecord {
            timestamp: timestamp.to_string(),
            label: label.to_string(),
            confidence,
        })
    }

    /// Return the raw file content for export, `None` when no log exists.
    ///
    /// The file is validated first so an export never hands out a log the
    /// viewer itself would refuse to display.
    pub fn export_all(&self) -> Result<Option<String>, PipelineError> {
        match self.read_all()? {
            LogView::Empty if !self.path.exists() => Ok(None),
            _ => fs::read_to_string(&self.path)
                .map(Some)
                .map_err(|e| PipelineError::LogRead {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Delete the log file. Destructive, so the caller must pass
    /// `confirm = true`; anything else is refused.
    pub fn clear(&self, confirm: bool) -> Result<(), PipelineError> {
        if !confirm {
            return Err(PipelineError::ConfirmationRequired {
                operation: "clear violation log".to_string(),
            });
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("violation log cleared: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::LogWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn write_log(path: &Path, rows: &[&str]) {
        let mut file = fs::File::create(path).unwrap();
        writeln!(file, "{}", LOG_HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
    }

    #[test]
    fn absent_file_reads_empty() {
        let dir = tempdir().unwrap();
        let viewer = LogViewer::new(dir.path().join("missing.csv"));
        assert_eq!(viewer.read_all().unwrap(), LogView::Empty);
        assert_eq!(viewer.export_all().unwrap(), None);
    }

    #[test]
    fn header_only_file_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("violations.csv");
        write_log(&path, &[]);
        let viewer = LogViewer::new(&path);
        assert_eq!(viewer.read_all().unwrap(), LogView::Empty);
        // Export still hands back the file, it exists.
        assert!(viewer.export_all().unwrap().is_some());
    }

    #[test]
    fn tail_returns_most_recent_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("violations.csv");
        write_log(
            &path,
            &[
                "2026-08-30 10:00:00,NO-Hardhat,0.87",
                "2026-08-30 10:00:01,NO-Mask,0.61",
                "2026-08-30 10:00:02,NO-Safety Vest,0.73",
            ],
        );
        let viewer = LogViewer::new(&path);
        match viewer.read_tail(2).unwrap() {
            LogView::Records(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].label, "NO-Mask");
                assert_eq!(records[1].label, "NO-Safety Vest");
                assert_eq!(records[1].confidence, 0.73);
            }
            LogView::Empty => panic!("expected records"),
        }
    }

    #[test]
    fn bad_header_is_malformed_not_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("violations.csv");
        fs::write(&path, "Time,Event\n").unwrap();
        let err = LogViewer::new(&path).read_all().unwrap_err();
        match err {
            PipelineError::MalformedLog { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn short_row_names_its_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("violations.csv");
        write_log(
            &path,
            &["2026-08-30 10:00:00,NO-Hardhat,0.87", "broken-row"],
        );
        let err = LogViewer::new(&path).read_all().unwrap_err();
        match err {
            PipelineError::MalformedLog { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn bad_confidence_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("violations.csv");
        write_log(&path, &["2026-08-30 10:00:00,NO-Hardhat,high"]);
        assert!(matches!(
            LogViewer::new(&path).read_all().unwrap_err(),
            PipelineError::MalformedLog { line: 2, .. }
        ));
    }

    #[test]
    fn clear_requires_confirmation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("violations.csv");
        write_log(&path, &["2026-08-30 10:00:00,NO-Hardhat,0.87"]);
        let viewer = LogViewer::new(&path);

        let err = viewer.clear(false).unwrap_err();
        assert!(matches!(err, PipelineError::ConfirmationRequired { .. }));
        assert!(path.exists());

        viewer.clear(true).unwrap();
        assert!(!path.exists());
        // Clearing an already-absent log is fine.
        viewer.clear(true).unwrap();
    }
}
