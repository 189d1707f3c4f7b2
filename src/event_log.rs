//! Debug event logging.
//!
//! When `debug_logging` is enabled in the project config, every tracker
//! operation is appended as a JSONL line to `events.jsonl` next to the task
//! database. This allows debugging tracker behavior by inspecting exactly
//! which operations ran and what they returned.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSONL event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Create a log writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event.
    ///
    /// Errors are silently ignored; logging never breaks an operation.
    pub fn record(&self, operation: &str, payload: serde_json::Value) {
        let entry = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "operation": operation,
            "payload": payload,
        });
        let _ = self.append(&entry);
    }

    fn append(&self, entry: &serde_json::Value) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{entry}")
    }

    /// Read back all events, skipping lines that are not valid JSON.
    ///
    /// Returns an empty list if the log does not exist.
    #[must_use]
    pub fn read_events(&self) -> Vec<serde_json::Value> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        content.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }
}
