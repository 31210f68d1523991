//! Assistant configuration: a JSON file plus environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Names a JSON config file to load. Unset means defaults.
pub const CONFIG_PATH_ENV_VAR: &str = "CHAT_ASSISTANT_CONFIG_PATH";
/// Overrides the endpoint from file or default.
pub const ENDPOINT_ENV_VAR: &str = "CHAT_ASSISTANT_ENDPOINT";
/// Overrides the API key from file.
pub const API_KEY_ENV_VAR: &str = "CHAT_ASSISTANT_API_KEY";
/// Overrides the model from file or default.
pub const MODEL_ENV_VAR: &str = "CHAT_ASSISTANT_MODEL";
/// Names an existing transcript to resume instead of starting a new one.
pub const SESSION_ENV_VAR: &str = "CHAT_ASSISTANT_SESSION";

pub const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful coding assistant working in the user's project directory. When you create or change a file, put its full contents in a fenced code block whose info string is the language, a colon, and the relative path, like ```rust:src/main.rs. One block per file; keep explanations outside the blocks.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the assistant needs to reach an endpoint and shape requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: None,
            temperature: None,
            timeout_secs: None,
            stream: default_stream(),
            system_prompt: None,
        }
    }
}

impl AssistantConfig {
    /// Load the file named by `CHAT_ASSISTANT_CONFIG_PATH` when set, then
    /// apply environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env_string_opt(CONFIG_PATH_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Some(endpoint) = env_string_opt(ENDPOINT_ENV_VAR) {
            self.endpoint = endpoint;
        }
        if let Some(api_key) = env_string_opt(API_KEY_ENV_VAR) {
            self.api_key = Some(api_key);
        }
        if let Some(model) = env_string_opt(MODEL_ENV_VAR) {
            self.model = model;
        }
    }

    /// The configured system prompt, falling back to the default when unset
    /// or blank.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        match self.system_prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ => DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_stream() -> bool {
    true
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
