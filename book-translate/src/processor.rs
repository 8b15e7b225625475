//! Chunk processor: translates every source chunk on a bounded set of tasks.
//!
//! Each chunk runs its whole lifecycle (read, translate, clean up, write,
//! record progress) inside one task. Translation failures stay local to the
//! chunk; a failure to persist aborts the batch.

use crate::error::{PipelineError, Result};
use crate::session::ProgressTracker;
use crate::store::{ChunkFile, ChunkStore, translated_filename};
use crate::text::{clean_repetition, format_book_output};
use crate::translator::Translator;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub target_language: String,
    /// Run the book formatter over each translation
    pub format_output: bool,
    pub line_width: usize,
    /// Output token ceiling per call
    pub max_tokens: u32,
    pub temperature: f32,
    /// Chunks in flight at once; 1 processes them one by one in order
    pub workers: usize,
    /// Only process the first N chunks
    pub max_chunks: Option<usize>,
    /// Recorded in the progress file
    pub output_file: String,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            target_language: "Indonesian".to_string(),
            format_output: true,
            line_width: crate::text::formatter::DEFAULT_LINE_WIDTH,
            max_tokens: 18000,
            temperature: 0.1,
            workers: 4,
            max_chunks: None,
            output_file: String::new(),
        }
    }
}

/// Outcome of processing a single chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    pub index: u32,
    pub filename: String,
    pub success: bool,
    pub translated_filename: Option<String>,
    pub error: Option<String>,
    pub input_size: u64,
    pub output_size: u64,
    pub duration_seconds: f64,
    /// A translation already existed and was reused
    pub skipped: bool,
}

impl ProcessResult {
    fn succeeded(chunk: &ChunkFile, input_size: u64, output_size: u64, duration: f64) -> Self {
        Self {
            index: chunk.index,
            filename: chunk.filename.clone(),
            success: true,
            translated_filename: Some(translated_filename(&chunk.filename)),
            error: None,
            input_size,
            output_size,
            duration_seconds: duration,
            skipped: false,
        }
    }

    fn skipped(chunk: &ChunkFile, output_size: u64) -> Self {
        Self {
            skipped: true,
            ..Self::succeeded(chunk, chunk.size_bytes, output_size, 0.0)
        }
    }

    fn failed(chunk: &ChunkFile, input_size: u64, error: String, duration: f64) -> Self {
        Self {
            index: chunk.index,
            filename: chunk.filename.clone(),
            success: false,
            translated_filename: None,
            error: Some(error),
            input_size,
            output_size: 0,
            duration_seconds: duration,
            skipped: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every chunk succeeded
    Complete,
    /// Some chunks failed, at least one succeeded
    Partial,
    /// Nothing succeeded, or there was nothing to do
    Failed,
}

/// Results of a batch, sorted by chunk index.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<ProcessResult>,
    pub total_duration: Duration,
}

impl BatchReport {
    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.skipped).count()
    }

    /// `(filename, error)` for every failed chunk.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| (r.filename.as_str(), r.error.as_deref().unwrap_or("unknown error")))
            .collect()
    }

    /// A batch without a single successful chunk, empty ones included,
    /// counts as failed.
    pub fn outcome(&self) -> BatchOutcome {
        match (self.successful(), self.failed()) {
            (0, _) => BatchOutcome::Failed,
            (_, 0) => BatchOutcome::Complete,
            _ => BatchOutcome::Partial,
        }
    }
}

/// Drives translation of the chunk store.
#[derive(Clone)]
pub struct ChunkProcessor {
    translator: Arc<dyn Translator>,
    store: ChunkStore,
    progress: Arc<ProgressTracker>,
}

impl ChunkProcessor {
    pub fn new(translator: Arc<dyn Translator>, store: ChunkStore, progress: Arc<ProgressTracker>) -> Self {
        Self {
            translator,
            store,
            progress,
        }
    }

    /// Translate every chunk that has no translation yet.
    ///
    /// `on_progress` is called once per finished chunk, in completion order.
    /// The returned results are in chunk order.
    pub async fn process_all<F>(&self, options: &ProcessOptions, mut on_progress: F) -> Result<BatchReport>
    where
        F: FnMut(&ProcessResult),
    {
        let start = Instant::now();
        let mut chunks = self.store.list_chunks()?;
        if let Some(limit) = options.max_chunks {
            chunks.truncate(limit);
        }

        let resumed = self.progress.resume_or_start(
            &options.target_language,
            chunks.len(),
            &options.output_file,
        )?;
        log::info!(
            "Translating {} chunks to {} with {} workers{}",
            chunks.len(),
            options.target_language,
            options.workers.max(1),
            if resumed { " (resumed)" } else { "" }
        );

        let options = Arc::new(options.clone());
        let limit = options.workers.max(1);
        let mut queue = chunks.into_iter();
        let mut join_set = JoinSet::new();
        let mut in_flight = HashMap::new();
        let mut results = Vec::new();

        for chunk in queue.by_ref().take(limit) {
            self.spawn_chunk(&mut join_set, &mut in_flight, chunk, &options);
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            if let Some(chunk) = queue.next() {
                self.spawn_chunk(&mut join_set, &mut in_flight, chunk, &options);
            }

            let result = match joined {
                Ok((id, Ok(result))) => {
                    in_flight.remove(&id);
                    result
                }
                Ok((_, Err(e))) => {
                    log::error!("Aborting batch: {}", e);
                    join_set.abort_all();
                    return Err(e);
                }
                Err(join_err) => {
                    let Some(chunk) = in_flight.remove(&join_err.id()) else {
                        log::error!("Lost track of a chunk task: {}", join_err);
                        continue;
                    };
                    let message = format!("worker task failed: {}", join_err);
                    log::error!("{}: {}", chunk.filename, message);
                    self.record_failure(&chunk.filename, &message).await?;
                    ProcessResult::failed(&chunk, 0, message, 0.0)
                }
            };

            on_progress(&result);
            results.push(result);
        }

        results.sort_by_key(|r| r.index);
        Ok(BatchReport {
            results,
            total_duration: start.elapsed(),
        })
    }

    fn spawn_chunk(
        &self,
        join_set: &mut JoinSet<Result<ProcessResult>>,
        in_flight: &mut HashMap<tokio::task::Id, ChunkFile>,
        chunk: ChunkFile,
        options: &Arc<ProcessOptions>,
    ) {
        let this = self.clone();
        let options = Arc::clone(options);
        let task_chunk = chunk.clone();
        let handle = join_set.spawn(async move { this.process_chunk(&task_chunk, &options).await });
        in_flight.insert(handle.id(), chunk);
    }

    /// Translate one chunk. Only persistence failures are returned as errors.
    pub async fn process_chunk(&self, chunk: &ChunkFile, options: &ProcessOptions) -> Result<ProcessResult> {
        let translated_path = self.store.translated_path(&chunk.filename);
        if translated_path.exists() {
            match fs::read_to_string(&translated_path) {
                Ok(existing) => {
                    log::info!("Skipping {} (already translated)", chunk.filename);
                    return Ok(ProcessResult::skipped(chunk, existing.len() as u64));
                }
                Err(e) => {
                    let message = format!("Failed to read existing translation: {}", e);
                    return Ok(ProcessResult::failed(chunk, chunk.size_bytes, message, 0.0));
                }
            }
        }

        let start = Instant::now();
        let text = match self.store.read_chunk(chunk) {
            Ok(text) => text,
            Err(e) => {
                let message = format!("Failed to read chunk: {}", e);
                log::error!("{}: {}", chunk.filename, message);
                self.record_failure(&chunk.filename, &message).await?;
                return Ok(ProcessResult::failed(chunk, 0, message, 0.0));
            }
        };
        let input_size = text.len() as u64;

        log::debug!("Translating {} ({} chars)", chunk.filename, text.chars().count());
        let translated = self
            .translator
            .translate(
                &text,
                &options.target_language,
                options.max_tokens,
                options.temperature,
            )
            .await;
        let duration = start.elapsed().as_secs_f64();

        match translated {
            Ok(raw) => {
                let mut output = clean_repetition(&raw);
                if options.format_output {
                    output = format_book_output(&output, options.line_width);
                }

                let output_size = output.len() as u64;
                let store = self.store.clone();
                let progress = Arc::clone(&self.progress);
                let filename = chunk.filename.clone();
                off_runtime(self.store.translated_path(&chunk.filename), move || {
                    store.write_translated(&filename, &output)?;
                    progress.mark_completed(&filename, output_size, duration)
                })
                .await?;

                log::info!(
                    "Translated {} ({} -> {} bytes, {:.1}s)",
                    chunk.filename,
                    input_size,
                    output_size,
                    duration
                );
                Ok(ProcessResult::succeeded(chunk, input_size, output_size, duration))
            }
            Err(e) => {
                let failure = PipelineError::Translation {
                    filename: chunk.filename.clone(),
                    message: e.to_string(),
                };
                log::error!("{}", failure);
                self.record_failure(&chunk.filename, &e.to_string()).await?;
                Ok(ProcessResult::failed(chunk, input_size, e.to_string(), duration))
            }
        }
    }

    async fn record_failure(&self, filename: &str, message: &str) -> Result<()> {
        let progress = Arc::clone(&self.progress);
        let filename = filename.to_string();
        let message = message.to_string();
        off_runtime(self.progress.path().to_path_buf(), move || {
            progress.mark_failed(&filename, &message)
        })
        .await
    }
}

/// Run file writes and fsyncs on the blocking pool. A panic inside `work`
/// is resumed in the calling task.
async fn off_runtime<T, F>(path: PathBuf, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(PipelineError::persistence(path, std::io::Error::other(e))),
    }
}
