//! Unified error types for alertctl
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from alert lifecycle operations
    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    /// Malformed input fed to a command (sample files, stdin)
    #[error("Invalid input at line {line}: {message}")]
    InvalidInput { line: usize, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from configuration parsing and rule validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Failed to parse config file
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Alert rule rejected at registration
    #[error("Invalid alert rule '{rule_id}': {message}")]
    InvalidRule { rule_id: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl ConfigError {
    /// Shorthand for a rule validation failure
    pub fn invalid_rule(rule_id: &str, message: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule_id: rule_id.to_string(),
            message: message.into(),
        }
    }
}

/// Errors from alert registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    /// No alert registered under this id
    #[error("Alert not found: {0}")]
    NotFound(String),

    /// No rule registered under this id
    #[error("Alert rule not found: {0}")]
    RuleNotFound(String),
}

/// Errors raised while delivering a notification
///
/// These never leave the dispatcher; they are logged and counted.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Channel adapter reported a failure
    #[error("Channel '{channel}' failed: {message}")]
    Channel { channel: String, message: String },

    /// Channel adapter panicked during delivery
    #[error("Channel '{0}' panicked during delivery")]
    Panicked(String),

    /// Payload serialization error
    #[error("Payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),

    /// IO error while writing a notification
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
