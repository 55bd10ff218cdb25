//! Shared error type for fallible infrastructure operations.
//!
//! Domain failures never use this type: tool outcomes travel as plain
//! strings so the model can relay them conversationally.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IsyError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Data store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
