//! Append-only JSONL execution journal — one self-contained line per
//! scheduler event. This is the only channel through which firing failures
//! are observable to callers.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::JobId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEvent {
    /// Job registered and its loop started.
    Scheduled,
    /// Firing attempt completed normally.
    Fired,
    /// Firing attempt returned an error or panicked.
    Failed,
    /// Job cancelled and removed from the registry.
    Cancelled,
}

/// One line in the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
    pub action: String,
    pub event: JournalEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only JSONL journal at `<data_dir>/scheduler/executions.jsonl`.
pub struct ExecutionJournal {
    path: PathBuf,
}

impl ExecutionJournal {
    /// Create a journal, ensuring the storage directory exists.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("scheduler");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create journal dir: {}", dir.display()))?;
        let path = dir.join("executions.jsonl");
        info!(path = %path.display(), "execution journal initialized");
        Ok(Self { path })
    }

    /// Append one event. Each line is self-contained, so plain appends are
    /// safe.
    pub fn record(&self, entry: JournalEntry) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("failed to open journal: {}", self.path.display()))?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append journal entry: {}", self.path.display()))?;
        Ok(())
    }

    /// The most recent entries, newest first, capped at `limit`. Malformed
    /// lines are skipped with a warning.
    pub fn recent(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read journal: {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (i, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = i + 1, error = %e, "skipping malformed journal line"),
            }
        }
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}
