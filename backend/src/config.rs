//! Runtime configuration values.
//!
//! Library code receives these explicitly; only the binary reads the
//! process environment (via [`AiConfig::from_env`]).

use std::env;
use std::path::PathBuf;

use crate::error::AiError;

/// Default model for mapping suggestions.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default response token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Default number of attempts per suggestion.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Anthropic Messages API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default template registry directory.
pub const DEFAULT_REGISTRY_DIR: &str = ".sheetjson/mappings";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Environment variable overriding the model.
pub const MODEL_VAR: &str = "SHEETJSON_AI_MODEL";

/// Settings of the suggestion client.
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub endpoint: String,
    pub max_retries: u32,
}

impl AiConfig {
    /// Config with an explicit API key and defaults for the rest
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Read `ANTHROPIC_API_KEY` and the optional `SHEETJSON_AI_MODEL`.
    pub fn from_env() -> Result<Self, AiError> {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AiError::MissingApiKey(format!("{} not set", API_KEY_VAR)))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = env::var(MODEL_VAR) {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }
}

// Keep the key out of debug output
impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Settings of the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub registry_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
        }
    }
}
