//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.
//!
//! Parsing itself never fails: problems found while building the span tree
//! are reported as [`crate::parser::Diagnostic`] values instead.

use thiserror::Error;

/// Errors that can occur while fetching class source
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Source for class {0} not found")]
    NotFound(String),

    #[error("Invalid class name: {0}")]
    InvalidClassName(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur while building a filter
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Unknown type filter: {0}")]
    UnknownType(String),
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty span tree")]
    EmptyTree,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),

    #[error("Config TOML parse error: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
