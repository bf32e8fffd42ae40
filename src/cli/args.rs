//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Rule-based metric alerting engine
///
/// Evaluate threshold rules over metric samples, escalate unacknowledged
/// alerts and fan notifications out to configured channels.
#[derive(Parser, Debug)]
#[command(name = "alertctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "ALERTCTL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured alert rules
    Rules,

    /// Load and validate the configuration
    Validate,

    /// Replay a timestamped sample file through the engine
    Replay(ReplayArgs),

    /// Run the engine, reading `<metric> <value>` lines from stdin
    Run,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the replay command
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Sample file, one `<unix_secs> <metric> <value>` per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Acknowledge every alert as this user right after it is created
    #[arg(long, value_name = "USER")]
    pub ack_as: Option<String>,

    /// Only show alerts that are still active at the end of the replay
    #[arg(long)]
    pub active_only: bool,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_rules() {
        let args = Cli::try_parse_from(["alertctl", "rules"]).unwrap();
        assert!(matches!(args.command, Commands::Rules));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let args = Cli::try_parse_from(["alertctl", "-v", "validate"]).unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_cli_parse_global_config_after_subcommand() {
        let args =
            Cli::try_parse_from(["alertctl", "rules", "--config", "/tmp/alerts.toml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("/tmp/alerts.toml"));
    }

    #[test]
    fn test_cli_parse_replay() {
        let args = Cli::try_parse_from([
            "alertctl",
            "--format",
            "json",
            "replay",
            "--input",
            "samples.txt",
            "--ack-as",
            "alice",
        ])
        .unwrap();

        assert!(matches!(args.format, OutputFormat::Json));
        if let Commands::Replay(replay) = args.command {
            assert_eq!(replay.input, PathBuf::from("samples.txt"));
            assert_eq!(replay.ack_as.as_deref(), Some("alice"));
            assert!(!replay.active_only);
        } else {
            panic!("Expected Replay command");
        }
    }

    #[test]
    fn test_cli_replay_requires_input() {
        assert!(Cli::try_parse_from(["alertctl", "replay"]).is_err());
    }

    #[test]
    fn test_cli_parse_completions() {
        let args = Cli::try_parse_from(["alertctl", "completions", "bash"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
