//! Translator adapter over the llm-client providers.

use async_trait::async_trait;
use llm_client::{Config, LlmError, LlmProvider, LlmRequest, get_provider};
use std::time::Duration;

/// Program name used to look up the default LLM preset.
pub const PROGRAM_NAME: &str = "book-translate";

/// Turns a piece of text into the target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}

/// How transient provider errors are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32, error: &LlmError) -> Duration {
        match error.retry_after() {
            Some(secs) => Duration::from_secs(secs),
            None => self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }
}

pub fn system_prompt(target_language: &str) -> String {
    format!(
        "You are a professional translator. \
         Translate EVERYTHING into {target_language}. \
         Preserve the original structure, formatting, and headings. \
         Do NOT add notes, comments, or English text. \
         Stop translating when you reach the end of the provided text."
    )
}

/// Translator backed by a single LLM provider, built once per process.
pub struct LlmTranslator {
    provider: Box<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl LlmTranslator {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Build from llm-client presets. `preset_name` falls back to the
    /// configured default for this program.
    pub fn from_config(config: &Config, preset_name: Option<&str>) -> Result<Self, LlmError> {
        let preset_name = preset_name.unwrap_or_else(|| config.get_default_for_program(PROGRAM_NAME));
        let preset = config.get_preset(preset_name)?;
        let provider = get_provider(preset, config.get_provider_config(&preset.provider))?;
        provider.is_available()?;

        log::info!(
            "Using LLM provider {} (preset {}, model {})",
            provider.name(),
            preset_name,
            preset.model
        );
        Ok(Self::new(provider))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = LlmRequest::new(text)
            .with_system_prompt(system_prompt(target_language))
            .with_max_tokens(max_output_tokens)
            .with_temperature(temperature);

        let mut attempt = 1;
        loop {
            match self.provider.complete(request.clone()).await {
                Ok(response) => {
                    if response.was_truncated() {
                        log::warn!(
                            "Translation hit the {} token limit and may be incomplete",
                            max_output_tokens
                        );
                    }
                    if let Some(usage) = &response.usage {
                        log::debug!(
                            "Tokens: {} in, {} out",
                            usage.input_tokens,
                            usage.output_tokens
                        );
                    }
                    if response.content.trim().is_empty() {
                        return Err(LlmError::EmptyResponse);
                    }
                    return Ok(response.content);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt, &e);
                    log::warn!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        e,
                        attempt,
                        self.retry.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
