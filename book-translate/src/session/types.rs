//! Progress record types for a translation session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk that was translated and written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedChunk {
    /// Source chunk filename
    pub filename: String,
    pub completed_at: DateTime<Utc>,
    /// Size of the translated file in bytes
    pub output_size: u64,
    /// Seconds spent translating
    pub duration: f64,
}

/// A chunk whose last attempt failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedChunk {
    /// Source chunk filename
    pub filename: String,
    pub failed_at: DateTime<Utc>,
    pub error: String,
}

/// Everything persisted about one translation session.
///
/// A filename is in at most one of `completed_chunks` and `failed_chunks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    pub session_id: String,
    pub target_language: String,
    pub total_chunks: usize,
    pub completed_chunks: Vec<CompletedChunk>,
    pub failed_chunks: Vec<FailedChunk>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub output_file: String,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            session_id: new_session_id(),
            target_language: String::new(),
            total_chunks: 0,
            completed_chunks: Vec::new(),
            failed_chunks: Vec::new(),
            start_time: None,
            last_update: None,
            output_file: String::new(),
        }
    }
}

impl ProgressRecord {
    /// Start a fresh session record.
    pub fn new(target_language: &str, total_chunks: usize, output_file: &str) -> Self {
        let now = Utc::now();
        Self {
            target_language: target_language.to_string(),
            total_chunks,
            start_time: Some(now),
            last_update: Some(now),
            output_file: output_file.to_string(),
            ..Self::default()
        }
    }

    pub fn record_completed(&mut self, filename: &str, output_size: u64, duration: f64) {
        self.completed_chunks.retain(|c| c.filename != filename);
        self.failed_chunks.retain(|c| c.filename != filename);

        let now = Utc::now();
        self.completed_chunks.push(CompletedChunk {
            filename: filename.to_string(),
            completed_at: now,
            output_size,
            duration,
        });
        self.last_update = Some(now);
    }

    pub fn record_failed(&mut self, filename: &str, error: &str) {
        self.completed_chunks.retain(|c| c.filename != filename);
        self.failed_chunks.retain(|c| c.filename != filename);

        let now = Utc::now();
        self.failed_chunks.push(FailedChunk {
            filename: filename.to_string(),
            failed_at: now,
            error: error.to_string(),
        });
        self.last_update = Some(now);
    }

    /// Whether any chunk attempt has been recorded.
    pub fn has_activity(&self) -> bool {
        !self.completed_chunks.is_empty() || !self.failed_chunks.is_empty()
    }

    pub fn stats(&self) -> ProgressStats {
        let completed = self.completed_chunks.len();
        let completion_percentage = if self.total_chunks > 0 {
            completed as f64 / self.total_chunks as f64 * 100.0
        } else {
            0.0
        };

        ProgressStats {
            total_chunks: self.total_chunks,
            completed_chunks: completed,
            failed_chunks: self.failed_chunks.len(),
            remaining_chunks: self.total_chunks.saturating_sub(completed),
            completion_percentage,
            session_id: self.session_id.clone(),
            target_language: self.target_language.clone(),
        }
    }
}

/// Summary numbers for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub failed_chunks: usize,
    pub remaining_chunks: usize,
    pub completion_percentage: f64,
    pub session_id: String,
    pub target_language: String,
}

/// Session ids are the UTC start time, e.g. `20240131_142501`.
pub fn new_session_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
