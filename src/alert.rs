//! Violation notifiers.
//!
//! Best-effort side channels fired when a violation lands in the logbook.
//! The logbook treats notifier failure as non-fatal; the CSV row is already
//! durable by the time a notifier runs.

use std::process::{Command, Stdio};
use std::thread;

use log::debug;

use crate::error::PipelineError;
use crate::logbook::ViolationRecord;

pub trait Notifier: Send {
    fn notify(&self, record: &ViolationRecord) -> Result<(), PipelineError>;
}

/// Notifier that drops everything on the floor.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _record: &ViolationRecord) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Spawns an external command per violation with the record appended as
/// three trailing arguments: timestamp, label, confidence.
///
/// The session never blocks on the child; a detached thread reaps it when
/// it exits, so a long-running daemon does not accumulate defunct
/// processes.
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, record: &ViolationRecord) -> Result<(), PipelineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&record.timestamp)
            .arg(&record.label)
            .arg(format!("{:.2}", record.confidence))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::Notification {
                reason: format!("failed to spawn '{}': {}", self.program, e),
            })?;
        debug!("notifier spawned {} (pid {})", self.program, child.id());
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ViolationRecord {
        ViolationRecord {
            timestamp: "2026-08-30 12:00:00".to_string(),
            label: "NO-Hardhat".to_string(),
            confidence: 0.87,
        }
    }

    #[test]
    fn null_notifier_always_succeeds() {
        assert!(NullNotifier.notify(&record()).is_ok());
    }

    #[test]
    fn missing_program_surfaces_as_notification_error() {
        let notifier = CommandNotifier::new("/nonexistent/alert-hook", Vec::new());
        let err = notifier.notify(&record()).unwrap_err();
        assert!(matches!(err, PipelineError::Notification { .. }));
    }

    /// Count direct children of this process in the defunct state.
    #[cfg(target_os = "linux")]
    fn defunct_children() -> usize {
        let my_pid = std::process::id().to_string();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };
        entries
            .flatten()
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
            .filter(|stat| {
                // stat format: pid (comm) state ppid ...
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                let state = fields.next();
                let ppid = fields.next();
                state == Some("Z") && ppid == Some(my_pid.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn exited_children_are_reaped() {
        let notifier = CommandNotifier::new("/bin/true", Vec::new());
        for _ in 0..5 {
            notifier.notify(&record()).unwrap();
        }

        // Give the children time to exit and the reaper threads time to run.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        std::thread::sleep(std::time::Duration::from_millis(500));
        while defunct_children() > 0 {
            assert!(
                std::time::Instant::now() < deadline,
                "defunct notifier children were not reaped"
            );
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
    }
}
