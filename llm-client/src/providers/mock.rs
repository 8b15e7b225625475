//! Mock LLM provider for testing
//!
//! Simulates failures, retries, canned answers and an echo mode that returns
//! the prompt unchanged (an identity "translation").

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

enum Reply {
    Fixed(String),
    Echo,
}

/// A mock provider for exercising retry and failure handling
pub struct MockProvider {
    /// Number of times to fail before succeeding (0 = always succeed)
    fail_count: AtomicUsize,
    /// Current call count
    call_count: AtomicUsize,
    /// Error to return on failure (None = always succeed)
    fail_with: Mutex<Option<LlmError>>,
    /// What to answer on success
    reply: Reply,
    /// Last request seen, for assertions on prompt plumbing
    last_request: Mutex<Option<LlmRequest>>,
    name: &'static str,
}

impl MockProvider {
    fn build(fail_count: usize, fail_with: Option<LlmError>, reply: Reply) -> Self {
        Self {
            fail_count: AtomicUsize::new(fail_count),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(fail_with),
            reply,
            last_request: Mutex::new(None),
            name: "mock",
        }
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: LlmError, response: &str) -> Self {
        Self::build(n, Some(error), Reply::Fixed(response.to_string()))
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: LlmError) -> Self {
        Self::build(usize::MAX, Some(error), Reply::Fixed(String::new()))
    }

    /// Create a provider that always succeeds
    pub fn always_succeeds(response: &str) -> Self {
        Self::build(0, None, Reply::Fixed(response.to_string()))
    }

    /// Create a provider that answers with the prompt it was given
    pub fn echo() -> Self {
        Self::build(0, None, Reply::Echo)
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The most recent request received
    pub fn last_request(&self) -> Option<LlmRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Set a custom provider name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        let fail_count = self.fail_count.load(Ordering::SeqCst);

        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if call_num < fail_count {
            let error = self
                .fail_with
                .lock()
                .map_err(|_| LlmError::ConfigError("mock lock poisoned".into()))?;
            if let Some(err) = error.as_ref() {
                return Err(clone_error(err));
            }
        }

        let content = match &self.reply {
            Reply::Fixed(text) => text.clone(),
            Reply::Echo => request.prompt,
        };

        Ok(LlmResponse {
            content,
            model: "mock-model".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> Result<()> {
        Ok(())
    }
}

/// Clone an LlmError (needed because LlmError doesn't implement Clone)
fn clone_error(err: &LlmError) -> LlmError {
    match err {
        LlmError::ServerOverloaded { message } => LlmError::ServerOverloaded {
            message: message.clone(),
        },
        LlmError::MissingApiKey { provider, env_var } => LlmError::MissingApiKey {
            provider: provider.clone(),
            env_var: env_var.clone(),
        },
        LlmError::RateLimited { retry_after } => LlmError::RateLimited {
            retry_after: *retry_after,
        },
        LlmError::ApiError {
            message,
            status_code,
        } => LlmError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        LlmError::EmptyResponse => LlmError::EmptyResponse,
        LlmError::ProviderUnavailable(s) => LlmError::ProviderUnavailable(s.clone()),
        LlmError::ConfigError(s) => LlmError::ConfigError(s.clone()),
        LlmError::InvalidPreset(s) => LlmError::InvalidPreset(s.clone()),
        // Io and TOML errors can't be cloned; substitute a generic one
        LlmError::Io(_) => LlmError::ConfigError("IO error (mock)".to_string()),
        LlmError::TomlParse(_) => LlmError::ConfigError("TOML parse error (mock)".to_string()),
        LlmError::TomlSerialize(_) => {
            LlmError::ConfigError("TOML serialize error (mock)".to_string())
        }
    }
}
