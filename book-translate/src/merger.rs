//! Reassembles translated chunks into one book.

use crate::error::{PipelineError, Result};
use crate::store::{ChunkFile, ChunkStore, atomic_write};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const BREAK_RULE_WIDTH: usize = 80;

/// Completeness of the translated chunk set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub total_chunks: usize,
    /// Indices absent from `1..=max(present)`
    pub missing: Vec<u32>,
    /// Indices outside `1..=max(present)`
    pub extra: Vec<u32>,
    pub chunk_files: Vec<String>,
}

impl ValidationReport {
    /// Turn an invalid report into a `Validation` error.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(PipelineError::Validation {
                missing: self.missing.clone(),
                extra: self.extra.clone(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Insert a `CHAPTER n` banner before every chunk but the first
    pub chapter_breaks: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            chapter_breaks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub total_chunks: usize,
    /// Characters of chunk content, separators excluded
    pub total_characters: usize,
    /// Size of the written file
    pub total_bytes: u64,
    pub output_file: PathBuf,
    pub chunk_files: Vec<String>,
}

pub struct ChunkMerger {
    store: ChunkStore,
}

impl ChunkMerger {
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    /// Translated chunks in merge order. Fails when there are none.
    pub fn list(&self) -> Result<Vec<ChunkFile>> {
        let files = self.store.list_translated()?;
        if files.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: self.store.translated_dir().to_path_buf(),
            });
        }
        Ok(files)
    }

    /// Compare the translated chunk numbers against `1..=max(present)`.
    pub fn validate(&self) -> Result<ValidationReport> {
        let files = self.list()?;
        let present: BTreeSet<u32> = files.iter().map(|f| f.index).collect();
        let highest = present.iter().next_back().copied().unwrap_or(0);

        let missing: Vec<u32> = (1..=highest).filter(|i| !present.contains(i)).collect();
        let extra: Vec<u32> = present
            .iter()
            .copied()
            .filter(|i| *i < 1 || *i > highest)
            .collect();

        Ok(ValidationReport {
            valid: missing.is_empty(),
            total_chunks: files.len(),
            missing,
            extra,
            chunk_files: files.into_iter().map(|f| f.filename).collect(),
        })
    }

    /// Write all translated chunks, in index order, to `output`.
    ///
    /// Nothing is written when there are no translated chunks. Re-running
    /// with the same inputs produces the same bytes.
    pub fn merge(&self, output: &Path, options: MergeOptions) -> Result<MergeResult> {
        let files = self.list()?;
        log::info!("Merging {} chunks into {}", files.len(), output.display());

        let mut book = String::new();
        let mut total_characters = 0;
        let last = files.len() - 1;

        for (i, file) in files.iter().enumerate() {
            let content =
                fs::read_to_string(&file.path).map_err(|e| PipelineError::persistence(&file.path, e))?;
            total_characters += content.chars().count();

            if options.chapter_breaks && i > 0 {
                book.push_str(&chapter_break(i + 1));
            }
            book.push_str(&content);
            if i < last {
                book.push_str("\n\n");
            }
            log::debug!("Merged {} ({} chars)", file.filename, content.chars().count());
        }

        atomic_write(output, book.as_bytes())?;

        Ok(MergeResult {
            total_chunks: files.len(),
            total_characters,
            total_bytes: book.len() as u64,
            output_file: output.to_path_buf(),
            chunk_files: files.into_iter().map(|f| f.filename).collect(),
        })
    }
}

fn chapter_break(number: usize) -> String {
    let rule = "=".repeat(BREAK_RULE_WIDTH);
    format!("\n{rule}\nCHAPTER {number}\n{rule}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::segmenter::{SegmentOptions, segment};
    use tempfile::TempDir;

    fn merger_with(temp: &TempDir, chunks: &[(u32, &str)]) -> ChunkMerger {
        let store = ChunkStore::new(temp.path().join("chunks"), temp.path().join("translated"));
        for (index, text) in chunks {
            store
                .write_translated(&crate::store::chunk_filename(*index), text)
                .unwrap();
        }
        ChunkMerger::new(store)
    }

    #[test]
    fn test_validate_reports_gap() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[(1, "a"), (2, "b"), (3, "c"), (5, "e")]);

        let report = merger.validate().unwrap();
        assert!(!report.valid);
        assert_eq!(report.missing, vec![4]);
        assert!(report.extra.is_empty());
        assert_eq!(report.total_chunks, 4);
        assert!(matches!(
            report.ensure_valid(),
            Err(PipelineError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_complete_set() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[(2, "b"), (1, "a")]);

        let report = merger.validate().unwrap();
        assert!(report.valid);
        assert_eq!(
            report.chunk_files,
            vec!["translated_chunk_01.txt", "translated_chunk_02.txt"]
        );
    }

    #[test]
    fn test_validate_zero_index_is_extra() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[(0, "zero"), (1, "a")]);

        let report = merger.validate().unwrap();
        assert!(report.valid);
        assert_eq!(report.extra, vec![0]);
    }

    #[test]
    fn test_merge_without_breaks() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[(10, "ten"), (2, "two"), (1, "one")]);
        let output = temp.path().join("out").join("book.txt");

        let result = merger
            .merge(&output, MergeOptions { chapter_breaks: false })
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "one\n\ntwo\n\nten");
        assert_eq!(result.total_chunks, 3);
        assert_eq!(result.total_characters, 9);
        assert_eq!(result.total_bytes, 13);
        assert_eq!(result.chunk_files[2], "translated_chunk_10.txt");
    }

    #[test]
    fn test_merge_with_chapter_breaks() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[(1, "one"), (2, "two")]);
        let output = temp.path().join("book.txt");

        merger.merge(&output, MergeOptions::default()).unwrap();

        let rule = "=".repeat(80);
        let expected = format!("one\n\n\n{rule}\nCHAPTER 2\n{rule}\n\ntwo");
        assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[(1, "satu"), (2, "dua"), (3, "tiga")]);
        let first = temp.path().join("first.txt");
        let second = temp.path().join("second.txt");

        merger.merge(&first, MergeOptions::default()).unwrap();
        merger.merge(&second, MergeOptions::default()).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_merge_fails_fast_without_chunks() {
        let temp = TempDir::new().unwrap();
        let merger = merger_with(&temp, &[]);
        let output = temp.path().join("book.txt");

        assert!(matches!(
            merger.merge(&output, MergeOptions::default()),
            Err(PipelineError::SourceNotFound { .. })
        ));

        fs::create_dir_all(temp.path().join("translated")).unwrap();
        assert!(matches!(
            merger.merge(&output, MergeOptions::default()),
            Err(PipelineError::EmptyInput { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_identity_round_trip() {
        let paragraphs: Vec<String> = (0..40)
            .map(|i| format!("Paragraph {i} talks about the voice. It has a few sentences! Does it end?"))
            .collect();
        let source = paragraphs.join("\n\n");

        let chunks = segment(&source, &SegmentOptions { target_tokens: 60, ..SegmentOptions::default() });
        assert!(chunks.len() > 1);

        let temp = TempDir::new().unwrap();
        let store = ChunkStore::new(temp.path().join("chunks"), temp.path().join("translated"));
        for chunk in &chunks {
            store
                .write_translated(&crate::store::chunk_filename(chunk.index), &chunk.text)
                .unwrap();
        }

        let output = temp.path().join("book.txt");
        ChunkMerger::new(store)
            .merge(&output, MergeOptions { chapter_breaks: false })
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), source);
    }
}
