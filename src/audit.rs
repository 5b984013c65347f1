// File: src/audit.rs
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;
use tracing::warn;

/// Append-only sink for the human-readable call log. A failed write must
/// never fail message processing.
pub trait AuditSink: Send + Sync {
    fn record(&self, timestamp: DateTime<Local>, call_id: &str, message: &str);
}

/// One line per event, `MM/DD/YYYY, HH:MM:SS - <call id> -> <message>`.
pub struct FileAuditSink {
    file: Mutex<File>,
}

impl FileAuditSink {
    pub fn open(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileAuditSink {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, timestamp: DateTime<Local>, call_id: &str, message: &str) {
        let line = format!(
            "{} - {} -> {}\n",
            timestamp.format("%m/%d/%Y, %H:%M:%S"),
            call_id,
            message
        );
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!(error = %e, "failed to append to call log");
                }
            }
            Err(_) => warn!("call log lock poisoned, event dropped"),
        }
    }
}
