//! book-translate - Translate long books chunk by chunk with an LLM

mod config;
mod error;
mod merger;
mod processor;
mod session;
mod store;
mod text;
mod translator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{SUPPORTED_LANGUAGES, TranslateConfig};
use error::PipelineError;
use indicatif::{ProgressBar, ProgressStyle};
use merger::{ChunkMerger, MergeOptions, ValidationReport};
use processor::{BatchOutcome, BatchReport, ChunkProcessor, ProcessOptions};
use session::ProgressTracker;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use store::ChunkStore;
use text::segmenter::SegmentOptions;
use translator::{LlmTranslator, RetryPolicy};

/// Exit code for a batch where some chunks failed.
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "book-translate")]
#[command(about = "Translate long books chunk by chunk with an LLM", long_about = None)]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/cli-programs/book-translate.toml)
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_file: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a text file into numbered chunks
    Chunk {
        /// Plain-text book
        input: PathBuf,

        /// Token budget per chunk (default from config)
        #[arg(long)]
        target_tokens: Option<usize>,

        /// Drop the Project Gutenberg header and footer
        #[arg(long)]
        strip_gutenberg: bool,

        /// Discard translations and progress left from an earlier split
        #[arg(long)]
        fresh: bool,
    },
    /// Translate every chunk that has no translation yet
    Translate(TranslateArgs),
    /// Translate, validate and merge in one go
    Run {
        #[command(flatten)]
        translate: TranslateArgs,

        #[command(flatten)]
        merge: MergeArgs,
    },
    /// Merge translated chunks into the final book
    Merge(MergeArgs),
    /// Check translated chunks for gaps
    Validate,
    /// List translated chunks with sizes
    List,
    /// Show the progress of the current session
    Status,
    /// Delete translated chunks and the progress record
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct TranslateArgs {
    /// Concurrent translation requests
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only translate the first N chunks
    #[arg(long)]
    max_chunks: Option<usize>,

    /// Discard existing translations and progress first
    #[arg(long)]
    fresh: bool,

    /// LLM preset from llm.toml
    #[arg(short, long)]
    model: Option<String>,

    /// Target language (overrides config)
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(clap::Args, Debug)]
struct MergeArgs {
    /// Output file (default: <output_dir>/translated_book_<language>.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Merge even when chunks are missing
    #[arg(long)]
    force: bool,

    /// Do not insert CHAPTER banners between chunks
    #[arg(long)]
    no_chapter_breaks: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the default target language
    SetLanguage {
        /// Language name, e.g. Malay
        language: String,
    },
    /// List suggested target languages
    Languages,
    /// Write a config file with default values
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config_path = match &args.config_file {
        Some(path) => path.clone(),
        None => TranslateConfig::config_path()?,
    };

    if let Commands::Config { action } = &args.command {
        handle_config_command(action, &config_path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = TranslateConfig::load_from(&config_path).context("Failed to load configuration")?;

    match args.command {
        Commands::Chunk {
            input,
            target_tokens,
            strip_gutenberg,
            fresh,
        } => {
            if let Some(tokens) = target_tokens {
                config.chunking.target_tokens = tokens;
            }
            config.validate()?;
            chunk_book(&config, &input, strip_gutenberg, fresh)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Translate(translate) => {
            apply_translate_args(&mut config, &translate);
            config.validate()?;
            let report = translate_chunks(&config, &translate, &config.output_filename()).await?;
            Ok(batch_exit_code(report.outcome()))
        }
        Commands::Run { translate, merge } => {
            apply_translate_args(&mut config, &translate);
            config.validate()?;

            let output = merge.output.clone().unwrap_or_else(|| config.output_filename());
            let report = translate_chunks(&config, &translate, &output).await?;
            if report.outcome() == BatchOutcome::Failed {
                eprintln!("No chunks were translated; skipping merge.");
                return Ok(ExitCode::FAILURE);
            }

            if !merge_book(&config, &merge)? {
                return Ok(ExitCode::FAILURE);
            }
            Ok(batch_exit_code(report.outcome()))
        }
        Commands::Merge(merge) => {
            config.validate()?;
            let merged = merge_book(&config, &merge)?;
            Ok(if merged { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Validate => {
            let report = merger(&config).validate()?;
            print_validation(&report);
            Ok(if report.valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::List => {
            list_translated(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            show_status(&config);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear { yes } => clear_all(&config, yes),
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn apply_translate_args(config: &mut TranslateConfig, args: &TranslateArgs) {
    if let Some(language) = &args.language {
        config.translation.target_language = language.clone();
    }
    if let Some(workers) = args.workers {
        config.processing.workers = workers;
    }
    if args.max_chunks.is_some() {
        config.chunking.max_chunks = args.max_chunks;
    }
    if args.model.is_some() {
        config.translation.preset = args.model.clone();
    }
}

fn batch_exit_code(outcome: BatchOutcome) -> ExitCode {
    match outcome {
        BatchOutcome::Complete => ExitCode::SUCCESS,
        BatchOutcome::Partial => ExitCode::from(EXIT_PARTIAL),
        BatchOutcome::Failed => ExitCode::FAILURE,
    }
}

fn chunk_store(config: &TranslateConfig) -> ChunkStore {
    ChunkStore::new(&config.processing.chunks_dir, &config.processing.translated_dir)
}

fn merger(config: &TranslateConfig) -> ChunkMerger {
    ChunkMerger::new(chunk_store(config))
}

fn chunk_book(config: &TranslateConfig, input: &Path, strip_gutenberg: bool, fresh: bool) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut source = text::normalize_source(&raw);
    if strip_gutenberg {
        source = text::strip_gutenberg(&source);
    }

    let options = SegmentOptions {
        target_tokens: config.chunking.target_tokens,
        min_paragraph_chars: config.chunking.min_paragraph_chars,
    };
    let chunks = text::segment(&source, &options);
    if chunks.is_empty() {
        return Err(PipelineError::EmptyInput {
            path: input.to_path_buf(),
        }
        .into());
    }

    let store = chunk_store(config);
    discard_stale_translations(&store, &config.processing.progress_file, fresh)?;
    store.write_chunks(&chunks)?;

    eprintln!(
        "Split {} into {} chunks (target {} tokens):",
        input.display(),
        chunks.len(),
        options.target_tokens
    );
    let mut total_chars = 0;
    let mut total_tokens = 0;
    for chunk in &chunks {
        let chars = chunk.text.chars().count();
        let tokens = chunk.estimated_tokens();
        total_chars += chars;
        total_tokens += tokens;
        let marker = if tokens > options.target_tokens { " (oversize)" } else { "" };
        eprintln!(
            "  {}: {} chars, ~{} tokens{}",
            store::chunk_filename(chunk.index),
            chars,
            tokens,
            marker
        );
    }
    eprintln!(
        "Average: {} chars, ~{} tokens per chunk",
        total_chars / chunks.len(),
        total_tokens / chunks.len()
    );
    eprintln!("Chunks written to {}", store.chunks_dir().display());
    Ok(())
}

/// Translations left from an earlier split would be reused for chunks that
/// now hold different text, so they must be cleared before re-chunking.
fn discard_stale_translations(store: &ChunkStore, progress_file: &Path, fresh: bool) -> Result<()> {
    let existing = store.translated_count()?;
    if existing == 0 {
        return Ok(());
    }
    if !fresh {
        anyhow::bail!(
            "{} translated chunks from an earlier split exist in {}; pass --fresh to discard them",
            existing,
            store.translated_dir().display()
        );
    }

    store.clear_translated()?;
    ProgressTracker::load(progress_file).clear()?;
    eprintln!("Removed {} translated chunks from the previous split", existing);
    Ok(())
}

async fn translate_chunks(config: &TranslateConfig, args: &TranslateArgs, output: &Path) -> Result<BatchReport> {
    let store = chunk_store(config);
    let progress = Arc::new(ProgressTracker::load(&config.processing.progress_file));

    if args.fresh {
        let removed = store.clear_translated()?;
        progress.clear()?;
        eprintln!("Starting fresh: removed {} translated chunks", removed);
    } else if progress.is_session_active() {
        eprintln!("Found previous session: {}", progress.session_info());
    }

    let mut total = store.list_chunks()?.len();
    if let Some(limit) = config.chunking.max_chunks {
        total = total.min(limit);
    }

    let llm_config = llm_client::Config::load().context("Failed to load LLM configuration")?;
    let translator = LlmTranslator::from_config(&llm_config, config.translation.preset.as_deref())
        .context("Failed to initialize translator")?
        .with_retry(RetryPolicy {
            max_attempts: config.translation.max_attempts,
            ..RetryPolicy::default()
        });

    let language = &config.translation.target_language;
    eprintln!(
        "Translating {} chunks to {} via {} ({} workers)",
        total,
        language,
        translator.provider_name(),
        config.processing.workers
    );

    let options = ProcessOptions {
        target_language: language.clone(),
        format_output: config.output.format_output,
        line_width: config.output.line_width,
        max_tokens: config.translation.max_tokens,
        temperature: config.translation.temperature,
        workers: config.processing.workers,
        max_chunks: config.chunking.max_chunks,
        output_file: output.display().to_string(),
    };

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let processor = ChunkProcessor::new(Arc::new(translator), store, Arc::clone(&progress));
    let report = processor
        .process_all(&options, |result| {
            pb.inc(1);
            let status = match (result.success, result.skipped) {
                (true, true) => "skipped",
                (true, false) => "done",
                (false, _) => "failed",
            };
            pb.set_message(format!("{} {}", result.filename, status));
            log::debug!(
                "{} -> {}: {} -> {} bytes in {:.1}s",
                result.filename,
                result.translated_filename.as_deref().unwrap_or("-"),
                result.input_size,
                result.output_size,
                result.duration_seconds
            );
        })
        .await?;
    pb.finish_and_clear();

    print_batch_summary(&report);
    Ok(report)
}

fn print_batch_summary(report: &BatchReport) {
    eprintln!();
    eprintln!("Translation finished in {:.1} minutes", report.total_duration.as_secs_f64() / 60.0);
    eprintln!(
        "  Total: {}  Successful: {}  Failed: {}  Skipped: {}",
        report.results.len(),
        report.successful(),
        report.failed(),
        report.skipped()
    );

    let failures = report.failures();
    if !failures.is_empty() {
        eprintln!("Failed chunks (rerun to retry just these):");
        for (filename, error) in failures {
            eprintln!("  {}: {}", filename, error);
        }
    }
}

/// Validate then merge. Returns false when validation stopped the merge.
fn merge_book(config: &TranslateConfig, args: &MergeArgs) -> Result<bool> {
    let merger = merger(config);
    let report = merger.validate()?;
    match report.ensure_valid() {
        Ok(()) => {}
        Err(err @ PipelineError::Validation { .. }) => {
            print_validation(&report);
            if !args.force {
                eprintln!("{}", err);
                eprintln!("Not merging. Translate the missing chunks or pass --force to merge anyway.");
                return Ok(false);
            }
            eprintln!("Merging anyway (--force)");
        }
        Err(e) => return Err(e.into()),
    }

    let output = args.output.clone().unwrap_or_else(|| config.output_filename());
    let options = MergeOptions {
        chapter_breaks: config.output.chapter_breaks && !args.no_chapter_breaks,
    };
    let result = merger.merge(&output, options)?;

    eprintln!(
        "Merged {} chunks ({} characters, {:.1} MB) into {}",
        result.total_chunks,
        result.total_characters,
        result.total_bytes as f64 / 1024.0 / 1024.0,
        result.output_file.display()
    );
    Ok(true)
}

fn print_validation(report: &ValidationReport) {
    println!("Translated chunks: {}", report.total_chunks);
    if report.valid {
        println!("All chunks present");
    } else {
        println!("Missing chunks: {:?}", report.missing);
    }
    if !report.extra.is_empty() {
        println!("Unexpected chunks: {:?}", report.extra);
    }
}

fn list_translated(config: &TranslateConfig) -> Result<()> {
    let files = match merger(config).list() {
        Ok(files) => files,
        Err(PipelineError::SourceNotFound { path }) => {
            println!("No translated chunks directory at {}", path.display());
            return Ok(());
        }
        Err(PipelineError::EmptyInput { path }) => {
            println!("No translated chunk files in {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut total = 0;
    for file in &files {
        println!("{}: {} bytes", file.filename, file.size_bytes);
        total += file.size_bytes;
    }
    println!(
        "{} files, {} bytes ({:.1} MB)",
        files.len(),
        total,
        total as f64 / 1024.0 / 1024.0
    );
    Ok(())
}

fn show_status(config: &TranslateConfig) {
    let progress = ProgressTracker::load(&config.processing.progress_file);
    if !progress.is_session_active() {
        println!("No active translation session");
        return;
    }

    let stats = progress.stats();
    let record = progress.snapshot();
    println!("{}", progress.session_info());
    if !record.output_file.is_empty() {
        println!("Output: {}", record.output_file);
    }
    if let Some(updated) = record.last_update {
        println!("Last update: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "Completed: {}  Failed: {}  Remaining: {}",
        stats.completed_chunks, stats.failed_chunks, stats.remaining_chunks
    );

    if let Ok(chunks) = chunk_store(config).list_chunks() {
        let all: Vec<String> = chunks.into_iter().map(|c| c.filename).collect();
        let remaining = progress.remaining(&all);
        if !remaining.is_empty() && remaining.len() <= 20 {
            println!("Still to translate: {}", remaining.join(", "));
        }
    }

    let failed = progress.failed_chunks();
    if !failed.is_empty() {
        println!("Failed chunks:");
        for chunk in failed {
            println!("  {}: {}", chunk.filename, chunk.error);
        }
    }
}

fn clear_all(config: &TranslateConfig, yes: bool) -> Result<ExitCode> {
    if !yes {
        eprintln!(
            "This deletes every translated chunk in {} and {}. Re-run with --yes to confirm.",
            config.processing.translated_dir.display(),
            config.processing.progress_file.display()
        );
        return Ok(ExitCode::FAILURE);
    }

    let removed = chunk_store(config).clear_translated()?;
    ProgressTracker::load(&config.processing.progress_file).clear()?;
    eprintln!("Removed {} translated chunks and the progress record", removed);
    Ok(ExitCode::SUCCESS)
}

fn handle_config_command(action: &ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = TranslateConfig::load_from(path)?;
            println!("Configuration file: {}", path.display());
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
            println!("Output file: {}", config.output_filename().display());
        }
        ConfigAction::SetLanguage { language } => {
            let mut config = TranslateConfig::load_from(path)?;
            config.translation.target_language = language.trim().to_string();
            config.validate()?;
            config.save_to(path)?;
            println!("Target language set to: {}", config.translation.target_language);
            if !SUPPORTED_LANGUAGES.contains(&config.translation.target_language.as_str()) {
                println!("Note: {} is not in the suggested list", config.translation.target_language);
            }
        }
        ConfigAction::Languages => {
            let config = TranslateConfig::load_from(path)?;
            for language in SUPPORTED_LANGUAGES {
                let marker = if *language == config.translation.target_language { "*" } else { " " };
                println!("{} {}", marker, language);
            }
        }
        ConfigAction::Init => {
            if path.exists() {
                println!("Config already exists: {}", path.display());
            } else {
                TranslateConfig::default().save_to(path)?;
                println!("Wrote default config to {}", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rechunk_refuses_stale_translations() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::new(temp.path().join("chunks"), temp.path().join("translated"));
        let progress_file = temp.path().join("progress.json");

        discard_stale_translations(&store, &progress_file, false).unwrap();

        store.write_translated("chunk_01.txt", "lama").unwrap();
        let progress = ProgressTracker::load(&progress_file);
        progress.mark_completed("chunk_01.txt", 4, 0.1).unwrap();

        let err = discard_stale_translations(&store, &progress_file, false).unwrap_err();
        assert!(err.to_string().contains("--fresh"));
        assert_eq!(store.translated_count().unwrap(), 1);

        discard_stale_translations(&store, &progress_file, true).unwrap();
        assert_eq!(store.translated_count().unwrap(), 0);
        assert!(!progress_file.exists());
    }
}
