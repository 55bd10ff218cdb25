//! Daemon configuration loaded from `config.toml`.
//!
//! Every field has a default so the daemon starts with no config file at
//! all; a missing or malformed file logs a warning and falls back to
//! defaults rather than refusing to start.

use crate::error::IsyError;
use crate::policy::TutorPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "ISY_CONFIG";
/// Environment variable overriding the LLM API key.
pub const API_KEY_ENV: &str = "ISY_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub policy: TutorPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; empty means "read from the environment".
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_preview_chars")]
    pub result_preview_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    120 // model calls can be slow under load
}

fn default_max_turns() -> u32 {
    10 // prevents runaway tool-call cycles
}

fn default_preview_chars() -> usize {
    crate::trace::RESULT_PREVIEW_CHARS
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            result_preview_chars: default_preview_chars(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load from `ISY_CONFIG` or `config.toml`, falling back to defaults
    /// with a warning when the file is missing or malformed.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            warn!("[*] Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        Self::load_from_path(&path).unwrap_or_else(|e| {
            warn!("[*] Failed to load {}: {}, using defaults", path.display(), e);
            Self::default()
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self, IsyError> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }
}

impl LlmConfig {
    /// Configured key, or the `ISY_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }
}
