//! Append-only per-round performance journal.
//!
//! One text line per round, plus a status line whenever processes are
//! parked. A journal that cannot be written never disturbs the round; the
//! failure is reported through the diagnostic log and writing is retried on
//! the next round.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use tracing::warn;

use crate::sys::probe::ProcessRecord;

pub const DEFAULT_JOURNAL_PATH: &str = "scheduler.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct Journal {
    path: PathBuf,
    enabled: bool,
    file: Option<File>,
}

impl Journal {
    pub fn new() -> Self {
        Self::with_path(DEFAULT_JOURNAL_PATH)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            file: None,
        }
    }

    /// Retarget the sink; the current file is closed and the new one opened
    /// lazily on the next write.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.file = None;
        self.path = path.into();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.file = None;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append the round summary.
    pub fn log_round(&mut self, records: &[ProcessRecord], mem_pct: f64, cpu_pct: f64) {
        if !self.enabled {
            return;
        }

        if self.file.is_none() {
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    warn!("failed to open journal {}: {}", self.path.display(), e);
                    return;
                }
            }
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let mut entry = format!(
            "[{}] System - CPU: {:.2}%, Memory: {:.2}%, Processes: {}\n",
            timestamp,
            cpu_pct,
            mem_pct,
            records.len()
        );

        let suspended = records.iter().filter(|r| r.is_suspended).count();
        if suspended > 0 {
            entry.push_str(&format!(
                "[{}] Status - {} processes suspended\n",
                timestamp, suspended
            ));
        }

        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = file.write_all(entry.as_bytes()).and_then(|_| file.flush()) {
            warn!("failed to write journal {}: {}", self.path.display(), e);
            // Drop the handle so the next round reopens from scratch.
            self.file = None;
        }
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}
