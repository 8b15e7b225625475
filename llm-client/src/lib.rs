//! Shared LLM client library for the book-translate workspace
//!
//! Provides one completion interface over several hosted providers:
//! - SEA-LION (OpenAI-compatible, default)
//! - OpenRouter (multi-model access)
//! - Cerebras (fast Llama inference)
//! - Anthropic API (direct)

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;

pub use config::{Config, ModelPreset, ProviderConfig};
pub use error::{LlmError, Result};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};
pub use providers::{MockProvider, ProviderKind, get_provider};
