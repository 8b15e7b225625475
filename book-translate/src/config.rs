//! book-translate configuration (`~/.config/cli-programs/book-translate.toml`).

use crate::error::PipelineError;
use crate::text::formatter::DEFAULT_LINE_WIDTH;
use crate::text::segmenter::{DEFAULT_MIN_PARAGRAPH_CHARS, DEFAULT_TARGET_TOKENS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Languages offered by `config languages`. Any other name is accepted too.
pub const SUPPORTED_LANGUAGES: &[&str] = &["Malay", "Indonesian", "Thai", "Vietnamese", "Tagalog"];

const DEFAULT_TARGET_LANGUAGE: &str = "Indonesian";
const DEFAULT_MAX_TOKENS: u32 = 18000;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateConfig {
    #[serde(default)]
    pub translation: TranslationSection,
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub processing: ProcessingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSection {
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// llm-client preset name. None uses the program default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// Output token ceiling per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Attempts per chunk when the provider is rate limited or overloaded
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingSection {
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,

    /// Paragraphs this short or shorter are dropped as noise
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chunks: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_true")]
    pub format_output: bool,

    #[serde(default = "default_line_width")]
    pub line_width: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_true")]
    pub chapter_breaks: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSection {
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: PathBuf,

    #[serde(default = "default_translated_dir")]
    pub translated_dir: PathBuf,

    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    /// Concurrent translation requests
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_target_language() -> String {
    DEFAULT_TARGET_LANGUAGE.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_target_tokens() -> usize {
    DEFAULT_TARGET_TOKENS
}

fn default_min_paragraph_chars() -> usize {
    DEFAULT_MIN_PARAGRAPH_CHARS
}

fn default_true() -> bool {
    true
}

fn default_line_width() -> usize {
    DEFAULT_LINE_WIDTH
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_chunks_dir() -> PathBuf {
    PathBuf::from("chunks")
}

fn default_translated_dir() -> PathBuf {
    PathBuf::from("translated_chunks")
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("translation_progress.json")
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for TranslationSection {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            preset: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            min_paragraph_chars: default_min_paragraph_chars(),
            max_chunks: None,
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format_output: true,
            line_width: default_line_width(),
            output_dir: default_output_dir(),
            chapter_breaks: true,
        }
    }
}

impl Default for ProcessingSection {
    fn default() -> Self {
        Self {
            chunks_dir: default_chunks_dir(),
            translated_dir: default_translated_dir(),
            progress_file: default_progress_file(),
            workers: default_workers(),
        }
    }
}

impl TranslateConfig {
    /// Get the config file path: ~/.config/cli-programs/book-translate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home
            .join(".config")
            .join("cli-programs")
            .join("book-translate.toml"))
    }

    /// Load from `path`, returning defaults if the file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TranslateConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Reject settings that would make any run meaningless.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::Configuration(msg.to_string()));

        if self.translation.target_language.trim().is_empty() {
            return invalid("translation.target_language must not be empty");
        }
        if self.translation.max_tokens == 0 {
            return invalid("translation.max_tokens must be positive");
        }
        if !(0.0..=2.0).contains(&self.translation.temperature) {
            return invalid("translation.temperature must be between 0.0 and 2.0");
        }
        if self.translation.max_attempts == 0 {
            return invalid("translation.max_attempts must be positive");
        }
        if self.chunking.target_tokens == 0 {
            return invalid("chunking.target_tokens must be positive");
        }
        if self.chunking.max_chunks == Some(0) {
            return invalid("chunking.max_chunks must be positive when set");
        }
        if self.output.line_width == 0 {
            return invalid("output.line_width must be positive");
        }
        if self.processing.workers == 0 {
            return invalid("processing.workers must be positive");
        }
        Ok(())
    }

    /// `<output_dir>/translated_book_<language>.txt`
    pub fn output_filename(&self) -> PathBuf {
        let language = self.translation.target_language.trim().to_lowercase();
        self.output
            .output_dir
            .join(format!("translated_book_{}.txt", language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TranslateConfig::default();
        assert_eq!(config.translation.target_language, "Indonesian");
        assert_eq!(config.translation.max_tokens, 18000);
        assert_eq!(config.translation.temperature, 0.1);
        assert_eq!(config.chunking.target_tokens, 6000);
        assert_eq!(config.processing.workers, 4);
        assert!(config.output.chapter_breaks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TranslateConfig = toml::from_str(
            r#"
            [translation]
            target_language = "Thai"

            [processing]
            workers = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.translation.target_language, "Thai");
        assert_eq!(config.translation.max_tokens, 18000);
        assert_eq!(config.translation.max_attempts, 3);
        assert_eq!(config.processing.workers, 8);
        assert_eq!(config.processing.chunks_dir, PathBuf::from("chunks"));
        assert_eq!(config.output.line_width, 80);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("book-translate.toml");

        let mut config = TranslateConfig::default();
        config.translation.target_language = "Malay".to_string();
        config.translation.preset = Some("sea-lion".to_string());
        config.chunking.max_chunks = Some(3);
        config.save_to(&path).unwrap();

        assert_eq!(TranslateConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = TranslateConfig::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config, TranslateConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        fs::write(&path, "[translation\nworkers = ").unwrap();
        assert!(TranslateConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TranslateConfig::default();
        config.processing.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));

        let mut config = TranslateConfig::default();
        config.translation.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = TranslateConfig::default();
        config.translation.target_language = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = TranslateConfig::default();
        config.chunking.target_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = TranslateConfig::default();
        config.translation.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_chunks() {
        let mut config = TranslateConfig::default();
        config.chunking.max_chunks = Some(0);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(msg)) if msg.contains("max_chunks")
        ));

        config.chunking.max_chunks = Some(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_filename() {
        let mut config = TranslateConfig::default();
        config.translation.target_language = "Vietnamese".to_string();
        assert_eq!(
            config.output_filename(),
            PathBuf::from("output/translated_book_vietnamese.txt")
        );
    }
}
