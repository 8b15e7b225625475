//! On-disk chunk store.
//!
//! Source chunks live in one directory as `chunk_NN.txt`, translations in
//! another as `translated_chunk_NN.txt`. The number embedded in the filename
//! is the only ordering key; there is no manifest.

use crate::error::{PipelineError, Result};
use crate::text::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Prefix that marks a translated chunk file.
pub const TRANSLATED_PREFIX: &str = "translated_";

const CHUNK_PREFIX: &str = "chunk_";

static CHUNK_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"chunk_(\d+)\.txt").expect("valid regex"));

/// Filename for the source chunk at `index`.
pub fn chunk_filename(index: u32) -> String {
    format!("chunk_{:02}.txt", index)
}

/// Filename a source chunk is translated into.
pub fn translated_filename(source_filename: &str) -> String {
    format!("{}{}", TRANSLATED_PREFIX, source_filename)
}

/// Recover the chunk number from a source or translated filename.
pub fn parse_chunk_index(filename: &str) -> Option<u32> {
    CHUNK_INDEX
        .captures(filename)
        .and_then(|caps| caps[1].parse().ok())
}

/// Write `contents` to `path` through a temp file in the same directory.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PipelineError::persistence(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::persistence(path, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| PipelineError::persistence(path, e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::persistence(path, e.error))?;

    Ok(())
}

/// A numbered file found in one of the store directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    pub index: u32,
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Source and translated chunk directories.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    chunks_dir: PathBuf,
    translated_dir: PathBuf,
}

impl ChunkStore {
    pub fn new(chunks_dir: impl Into<PathBuf>, translated_dir: impl Into<PathBuf>) -> Self {
        Self {
            chunks_dir: chunks_dir.into(),
            translated_dir: translated_dir.into(),
        }
    }

    pub fn chunks_dir(&self) -> &Path {
        &self.chunks_dir
    }

    pub fn translated_dir(&self) -> &Path {
        &self.translated_dir
    }

    /// Persist a fresh segmentation, removing chunk files it no longer covers.
    pub fn write_chunks(&self, chunks: &[Chunk]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.chunks_dir)
            .map_err(|e| PipelineError::persistence(&self.chunks_dir, e))?;

        let mut written = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let path = self.chunks_dir.join(chunk_filename(chunk.index));
            atomic_write(&path, chunk.text.as_bytes())?;
            written.push(path);
        }

        let last = chunks.iter().map(|c| c.index).max().unwrap_or(0);
        for stale in list_numbered(&self.chunks_dir, CHUNK_PREFIX)? {
            if stale.index > last || !written.contains(&stale.path) {
                log::debug!("Removing stale chunk file {}", stale.filename);
                fs::remove_file(&stale.path)
                    .map_err(|e| PipelineError::persistence(&stale.path, e))?;
            }
        }

        Ok(written)
    }

    /// Source chunk files in ascending numeric order.
    ///
    /// A missing directory is `SourceNotFound`; a directory with no chunk
    /// files is `EmptyInput`.
    pub fn list_chunks(&self) -> Result<Vec<ChunkFile>> {
        if !self.chunks_dir.is_dir() {
            return Err(PipelineError::SourceNotFound {
                path: self.chunks_dir.clone(),
            });
        }

        let chunks = list_numbered(&self.chunks_dir, CHUNK_PREFIX)?;
        if chunks.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: self.chunks_dir.clone(),
            });
        }
        Ok(chunks)
    }

    pub fn read_chunk(&self, chunk: &ChunkFile) -> std::io::Result<String> {
        fs::read_to_string(&chunk.path)
    }

    /// Where the translation of `source_filename` is stored.
    pub fn translated_path(&self, source_filename: &str) -> PathBuf {
        self.translated_dir.join(translated_filename(source_filename))
    }

    pub fn write_translated(&self, source_filename: &str, text: &str) -> Result<PathBuf> {
        let path = self.translated_path(source_filename);
        atomic_write(&path, text.as_bytes())?;
        Ok(path)
    }

    /// Translated chunk files in ascending numeric order.
    ///
    /// Errors with `SourceNotFound` when the directory does not exist; an
    /// empty directory yields an empty list.
    pub fn list_translated(&self) -> Result<Vec<ChunkFile>> {
        if !self.translated_dir.is_dir() {
            return Err(PipelineError::SourceNotFound {
                path: self.translated_dir.clone(),
            });
        }
        list_numbered(&self.translated_dir, TRANSLATED_PREFIX)
    }

    /// Number of translated chunk files; zero when the directory is absent.
    pub fn translated_count(&self) -> Result<usize> {
        if !self.translated_dir.is_dir() {
            return Ok(0);
        }
        Ok(list_numbered(&self.translated_dir, TRANSLATED_PREFIX)?.len())
    }

    /// Delete every translated chunk file, returning how many were removed.
    pub fn clear_translated(&self) -> Result<usize> {
        if !self.translated_dir.is_dir() {
            return Ok(0);
        }

        let files = list_numbered(&self.translated_dir, TRANSLATED_PREFIX)?;
        for file in &files {
            fs::remove_file(&file.path).map_err(|e| PipelineError::persistence(&file.path, e))?;
        }
        Ok(files.len())
    }
}

/// Files in `dir` that start with `prefix` and carry a chunk number.
fn list_numbered(dir: &Path, prefix: &str) -> Result<Vec<ChunkFile>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::persistence(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::persistence(dir, e))?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !filename.starts_with(prefix) || !filename.ends_with(".txt") {
            continue;
        }

        let Some(index) = parse_chunk_index(&filename) else {
            log::debug!("Ignoring {} (no chunk number)", filename);
            continue;
        };

        let metadata = entry
            .metadata()
            .map_err(|e| PipelineError::persistence(entry.path(), e))?;
        if !metadata.is_file() {
            continue;
        }

        files.push(ChunkFile {
            index,
            filename,
            path: entry.path(),
            size_bytes: metadata.len(),
        });
    }

    files.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.filename.cmp(&b.filename)));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ChunkStore {
        ChunkStore::new(temp.path().join("chunks"), temp.path().join("translated"))
    }

    #[test]
    fn test_filenames() {
        assert_eq!(chunk_filename(1), "chunk_01.txt");
        assert_eq!(chunk_filename(12), "chunk_12.txt");
        assert_eq!(chunk_filename(123), "chunk_123.txt");
        assert_eq!(translated_filename("chunk_07.txt"), "translated_chunk_07.txt");
    }

    #[test]
    fn test_parse_chunk_index() {
        assert_eq!(parse_chunk_index("chunk_01.txt"), Some(1));
        assert_eq!(parse_chunk_index("translated_chunk_10.txt"), Some(10));
        assert_eq!(parse_chunk_index("chunk_abc.txt"), None);
        assert_eq!(parse_chunk_index("notes.txt"), None);
    }

    #[test]
    fn test_list_chunks_numeric_order() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        fs::create_dir_all(store.chunks_dir()).unwrap();
        for name in ["chunk_10.txt", "chunk_2.txt", "chunk_1.txt", "readme.txt", "chunk_x.txt"] {
            fs::write(store.chunks_dir().join(name), "text").unwrap();
        }

        let names: Vec<String> = store
            .list_chunks()
            .unwrap()
            .into_iter()
            .map(|c| c.filename)
            .collect();
        assert_eq!(names, vec!["chunk_1.txt", "chunk_2.txt", "chunk_10.txt"]);
    }

    #[test]
    fn test_list_chunks_missing_and_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(matches!(
            store.list_chunks(),
            Err(PipelineError::SourceNotFound { .. })
        ));

        fs::create_dir_all(store.chunks_dir()).unwrap();
        assert!(matches!(
            store.list_chunks(),
            Err(PipelineError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_write_chunks_removes_stale_files() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let first: Vec<Chunk> = (1..=3).map(|i| Chunk::new(i, format!("chunk {i}"))).collect();
        store.write_chunks(&first).unwrap();
        assert_eq!(store.list_chunks().unwrap().len(), 3);

        let second = vec![Chunk::new(1, "only one".to_string())];
        store.write_chunks(&second).unwrap();

        let listed = store.list_chunks().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.read_chunk(&listed[0]).unwrap(), "only one");
    }

    #[test]
    fn test_write_and_list_translated() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.write_translated("chunk_02.txt", "dua").unwrap();
        store.write_translated("chunk_01.txt", "satu").unwrap();

        let listed = store.list_translated().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].filename, "translated_chunk_01.txt");
        assert_eq!(listed[0].size_bytes, 4);
        assert_eq!(listed[1].index, 2);
    }

    #[test]
    fn test_list_translated_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            store(&temp).list_translated(),
            Err(PipelineError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_clear_translated() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert_eq!(store.clear_translated().unwrap(), 0);

        store.write_translated("chunk_01.txt", "a").unwrap();
        store.write_translated("chunk_02.txt", "b").unwrap();
        fs::write(store.translated_dir().join("keep.txt"), "x").unwrap();

        assert_eq!(store.clear_translated().unwrap(), 2);
        assert!(store.list_translated().unwrap().is_empty());
        assert!(store.translated_dir().join("keep.txt").exists());
    }

    #[test]
    fn test_translated_count() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert_eq!(store.translated_count().unwrap(), 0);

        store.write_translated("chunk_01.txt", "a").unwrap();
        store.write_translated("chunk_03.txt", "c").unwrap();
        fs::write(store.translated_dir().join("notes.txt"), "x").unwrap();
        assert_eq!(store.translated_count().unwrap(), 2);
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("out.txt");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
