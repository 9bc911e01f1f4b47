// src/utils/logbook.rs
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Append-only JSONL trail of structural page events.
///
/// One line per event: `{"timestamp", "event", "data"}`. Callers treat a failed
/// append as a warning; the page operation that produced the event has already
/// happened.
#[derive(Debug, Clone)]
pub struct Logbook {
    path: PathBuf,
}

impl Logbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn emit(&self, event: &str, data: Value) -> Result<()> {
        emit_event(&self.path, event, data, &Utc::now().to_rfc3339())
    }

    /// Like `emit`, but only logs on failure.
    pub fn record(&self, event: &str, data: Value) {
        if let Err(e) = self.emit(event, data) {
            tracing::warn!("logbook append to {} failed: {:#}", self.path.display(), e);
        }
    }
}

pub fn emit_event(log_path: &Path, event: &str, data: Value, ts: &str) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::json!({
        "timestamp": ts,
        "event": event,
        "data": data
    });
    let json = serde_json::to_string(&line)?;
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(f, "{}", json)?;
    Ok(())
}
