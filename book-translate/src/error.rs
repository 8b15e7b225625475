//! Error kinds for the chunk pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the segment → translate → merge pipeline.
///
/// Per-chunk translation failures are normally captured in a `ProcessResult`
/// and never reach this type; everything else aborts the operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Directory not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("No chunk files found in {}", .path.display())]
    EmptyInput { path: PathBuf },

    #[error("Translation of {filename} failed: {message}")]
    Translation { filename: String, message: String },

    #[error("I/O failure on {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chunk validation failed (missing: {missing:?}, extra: {extra:?})")]
    Validation { missing: Vec<u32>, extra: Vec<u32> },

    #[error("Progress record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = PipelineError::SourceNotFound {
            path: PathBuf::from("translated_chunks"),
        };
        assert_eq!(err.to_string(), "Directory not found: translated_chunks");

        let err = PipelineError::Translation {
            filename: "chunk_02.txt".into(),
            message: "HTTP 500".into(),
        };
        assert!(err.to_string().contains("chunk_02.txt"));
        assert!(err.to_string().contains("HTTP 500"));

        let err = PipelineError::persistence(
            "out/chunk_01.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("out/chunk_01.txt"));
    }

    #[test]
    fn test_validation_message_lists_indices() {
        let err = PipelineError::Validation {
            missing: vec![4],
            extra: vec![],
        };
        assert_eq!(
            err.to_string(),
            "Chunk validation failed (missing: [4], extra: [])"
        );
    }
}
