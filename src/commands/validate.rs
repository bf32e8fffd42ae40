//! Validate command implementation
//!
//! Loads the configuration, validates every rule and registers them with a
//! throwaway engine so any rule the engine would reject fails here first.

use crate::alerts::{AlertConfig, AlertingEngine, LogTransport};
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, ValidationReport};
use crate::clock::SystemClock;
use crate::error::Result;
use std::sync::Arc;

/// Validate the alert configuration
pub fn run_validate(config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let (config, path) = AlertConfig::load_or_default(config_path)?;
    let report = validate(&config, &path.display().to_string())?;

    for warning in &report.warnings {
        log::warn!("{}", warning);
    }
    print_output(&report, format)?;

    Ok(())
}

fn validate(config: &AlertConfig, source: &str) -> Result<ValidationReport> {
    let warnings = config.validate()?;
    let engine = AlertingEngine::from_config(config, Arc::new(SystemClock), Arc::new(LogTransport))?;
    let status = engine.status();

    Ok(ValidationReport {
        source: source.to_string(),
        rules: status.total_rules,
        enabled_rules: status.enabled_rules,
        channels: engine.notifications().channel_names(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AlertConfig::default();
        let report = validate(&config, "defaults").unwrap();
        assert_eq!(report.rules, config.rules.len());
        assert!(report.enabled_rules < report.rules);
        assert!(report.warnings.is_empty());
        assert!(report.channels.contains(&"log".to_string()));
    }

    #[test]
    fn test_validate_rejects_bad_rule() {
        let mut config = AlertConfig::default();
        config.rules[0].conditions.clear();
        assert!(validate(&config, "broken").is_err());
    }
}
