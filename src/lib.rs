//! alertctl - rule-based metric alerting library
//!
//! This library provides windowed threshold rules over metric samples, an
//! alert lifecycle with escalation, suppression, cooldowns, rate limiting
//! and auto-resolution, and failure-isolated notification fan-out.
//!
//! # Modules
//!
//! - [`alerts`]: Alerting engine, rules and notification channels
//! - [`cli`]: Command-line interface definitions
//! - [`clock`]: Injectable time source
//! - [`commands`]: Command handlers
//! - [`error`]: Error types
//! - [`services`]: Background runtime threads

pub mod alerts;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod error;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
