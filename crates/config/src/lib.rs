//! Configuration management for tether
//!
//! Loads provider and loop parameters from a JSON file, then lets the
//! environment override individual values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.moonshot.cn/v1".to_string()
}

fn default_model() -> String {
    "kimi-k2-turbo-preview".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

/// Control loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Reasoning turns before the session is forced to end
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Character cap applied to every conversation message
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// stdout cap used when the host's `hello` carries no limit
    #[serde(default = "default_stdout_limit")]
    pub default_stdout_limit: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_message_length: default_max_message_length(),
            default_stdout_limit: default_stdout_limit(),
        }
    }
}

fn default_max_steps() -> u32 {
    12
}

fn default_max_message_length() -> usize {
    6000
}

fn default_stdout_limit() -> usize {
    4096
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location, falling back to defaults when absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup. Blank values are ignored.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get("LLM_API_KEY").or_else(|| get("MOONSHOT_API_KEY")) {
            self.provider.api_key = key;
        }
        if let Some(base) = get("LLM_BASE_URL") {
            self.provider.api_base = base;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.provider.model = model;
        }
        if let Some(raw) = get("LLM_TEMPERATURE") {
            match raw.parse::<f32>() {
                Ok(t) => self.provider.temperature = t,
                Err(_) => warn!("ignoring unparseable LLM_TEMPERATURE={}", raw),
            }
        }
        if let Some(raw) = get("TETHER_MAX_STEPS") {
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => self.agent.max_steps = n,
                _ => warn!("ignoring invalid TETHER_MAX_STEPS={}", raw),
            }
        }
    }

    /// Whether a provider key is available
    pub fn has_api_key(&self) -> bool {
        !self.provider.api_key.is_empty()
    }
}
