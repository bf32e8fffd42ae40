//! Rules command implementation

use crate::alerts::AlertConfig;
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, RuleEntry, RuleList};
use crate::error::Result;

/// List configured alert rules
pub fn run_rules(config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let (config, path) = AlertConfig::load_or_default(config_path)?;
    let rules = config.to_alert_rules()?;

    let source = if path.exists() {
        path.display().to_string()
    } else {
        "built-in defaults".to_string()
    };

    let list = RuleList {
        source,
        rules: rules.iter().map(RuleEntry::from).collect(),
    };
    print_output(&list, format)?;

    Ok(())
}
