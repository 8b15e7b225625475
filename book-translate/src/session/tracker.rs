//! Persisted progress record shared by the chunk workers.

use super::types::{FailedChunk, ProgressRecord, ProgressStats};
use crate::error::{PipelineError, Result};
use crate::store::atomic_write;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Owns the progress file. Every mutation rewrites the whole record while
/// holding the lock, so concurrent workers never lose each other's updates.
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    record: Mutex<ProgressRecord>,
}

impl ProgressTracker {
    /// Load the record at `path`. A missing, unreadable or corrupt file
    /// starts an empty record.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let record = read_record(&path).unwrap_or_default();
        Self {
            path,
            record: Mutex::new(record),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the record with a fresh session.
    pub fn start_session(&self, target_language: &str, total_chunks: usize, output_file: &str) -> Result<()> {
        let mut record = self.lock();
        *record = ProgressRecord::new(target_language, total_chunks, output_file);
        log::info!("Started translation session {}", record.session_id);
        self.persist(&record)
    }

    /// Keep the existing session when it targets the same language and has
    /// recorded work, otherwise start fresh. Returns `true` when resumed.
    pub fn resume_or_start(&self, target_language: &str, total_chunks: usize, output_file: &str) -> Result<bool> {
        {
            let mut record = self.lock();

            if record.has_activity() && record.target_language == target_language {
                record.total_chunks = total_chunks;
                record.output_file = output_file.to_string();
                log::info!(
                    "Resuming session {} ({} completed)",
                    record.session_id,
                    record.completed_chunks.len()
                );
                self.persist(&record)?;
                return Ok(true);
            }

            if record.has_activity() {
                log::warn!(
                    "Discarding progress for {} (now translating to {})",
                    record.target_language,
                    target_language
                );
            }
        }

        self.start_session(target_language, total_chunks, output_file)?;
        Ok(false)
    }

    pub fn mark_completed(&self, filename: &str, output_size: u64, duration: f64) -> Result<()> {
        let mut record = self.lock();
        record.record_completed(filename, output_size, duration);
        self.persist(&record)
    }

    pub fn mark_failed(&self, filename: &str, error: &str) -> Result<()> {
        let mut record = self.lock();
        record.record_failed(filename, error);
        self.persist(&record)
    }

    pub fn completed_filenames(&self) -> HashSet<String> {
        self.lock()
            .completed_chunks
            .iter()
            .map(|c| c.filename.clone())
            .collect()
    }

    pub fn failed_chunks(&self) -> Vec<FailedChunk> {
        self.lock().failed_chunks.clone()
    }

    /// Filenames from `all` that have not been completed, in the given order.
    pub fn remaining(&self, all: &[String]) -> Vec<String> {
        let completed = self.completed_filenames();
        all.iter()
            .filter(|name| !completed.contains(*name))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> ProgressStats {
        self.lock().stats()
    }

    pub fn is_session_active(&self) -> bool {
        self.lock().has_activity()
    }

    pub fn session_info(&self) -> String {
        let stats = self.stats();
        format!(
            "Session: {} | Language: {} | Progress: {}/{} ({:.1}%)",
            stats.session_id,
            stats.target_language,
            stats.completed_chunks,
            stats.total_chunks,
            stats.completion_percentage
        )
    }

    /// A copy of the current record.
    pub fn snapshot(&self) -> ProgressRecord {
        self.lock().clone()
    }

    /// Delete the progress file and reset to an empty record.
    pub fn clear(&self) -> Result<()> {
        let mut record = self.lock();
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| PipelineError::persistence(&self.path, e))?;
        }
        *record = ProgressRecord::default();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ProgressRecord> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, record: &ProgressRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.path, &json)
    }
}

fn read_record(path: &Path) -> Option<ProgressRecord> {
    if !path.exists() {
        return None;
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Could not read progress file {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Ignoring corrupt progress file {}: {}", path.display(), e);
            None
        }
    }
}
