use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{LlmError, Result};

/// Default model served through the SEA-LION endpoint
pub const DEFAULT_SEA_LION_MODEL: &str = "aisingapore/Gemma-SEA-LION-v4-27B-IT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Preset used when neither a flag nor a per-program default picks one
    #[serde(default = "default_preset")]
    pub default_preset: String,

    /// Per-program default presets (program name -> preset name)
    #[serde(default)]
    pub defaults: HashMap<String, String>,

    /// Named model presets
    #[serde(default)]
    pub presets: HashMap<String, ModelPreset>,

    /// Provider-specific configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_preset() -> String {
    "sea-lion".to_string()
}

/// A named model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreset {
    /// Provider identifier (sea-lion, anthropic, openrouter, cerebras)
    pub provider: String,

    /// Model name/identifier for the provider
    pub model: String,
}

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL for OpenAI-compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, defaults when absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home =
            std::env::var("HOME").map_err(|_| LlmError::ConfigError("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/cli-programs/llm.toml"))
    }

    /// Get a preset by name
    pub fn get_preset(&self, name: &str) -> Result<&ModelPreset> {
        self.presets
            .get(name)
            .ok_or_else(|| LlmError::InvalidPreset(name.to_string()))
    }

    /// Get the default preset name for a specific program
    ///
    /// Falls back to `default_preset` if no program-specific default is set.
    pub fn get_default_for_program(&self, program: &str) -> &str {
        self.defaults
            .get(program)
            .map(String::as_str)
            .unwrap_or(&self.default_preset)
    }

    /// Get provider config by provider name
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut presets = HashMap::new();

        presets.insert(
            "sea-lion".to_string(),
            ModelPreset {
                provider: "sea-lion".to_string(),
                model: DEFAULT_SEA_LION_MODEL.to_string(),
            },
        );

        Self {
            default_preset: default_preset(),
            defaults: HashMap::new(),
            presets,
            providers: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_preset, "sea-lion");

        let preset = config.get_preset("sea-lion").unwrap();
        assert_eq!(preset.provider, "sea-lion");
        assert_eq!(preset.model, DEFAULT_SEA_LION_MODEL);
    }

    #[test]
    fn test_invalid_preset() {
        let config = Config::default();
        assert!(matches!(
            config.get_preset("nonexistent"),
            Err(LlmError::InvalidPreset(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn test_parse_presets_and_providers() {
        let toml_str = r#"
default_preset = "sonnet"

[defaults]
book-translate = "sea-lion"

[presets.sonnet]
provider = "anthropic"
model = "claude-sonnet-4-5"

[providers.sea-lion]
base_url = "http://localhost:8080/v1"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.get_default_for_program("book-translate"), "sea-lion");
        assert_eq!(config.get_default_for_program("other"), "sonnet");
        assert_eq!(config.get_preset("sonnet").unwrap().provider, "anthropic");
        assert_eq!(
            config
                .get_provider_config("sea-lion")
                .and_then(|p| p.base_url.as_deref()),
            Some("http://localhost:8080/v1")
        );
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/llm.toml")).unwrap();
        assert_eq!(config.default_preset, "sea-lion");
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path().unwrap();
        assert!(
            path.to_string_lossy()
                .contains(".config/cli-programs/llm.toml")
        );
    }
}
