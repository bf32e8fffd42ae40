//! alertctl - rule-based metric alerting tool
//!
//! A command-line tool for validating alert rules, replaying recorded
//! metric samples and running the alerting engine on live input.

use alertctl::cli::args::{generate_completions, Cli, Commands};
use alertctl::commands::{run_live, run_replay, run_rules, run_validate};
use alertctl::error::{AppError, ConfigError};
use clap::Parser;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Set log level based on verbose flag
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Rules => run_rules(config, cli.format),

        Commands::Validate => run_validate(config, cli.format),

        Commands::Replay(args) => run_replay(args, config, cli.format),

        Commands::Run => run_live(config, cli.format),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Config(ConfigError::FileNotFound(_)) => {
            eprintln!();
            eprintln!("Hint: Omit --config to use the built-in default rules,");
            eprintln!("      or point ALERTCTL_CONFIG at an existing alerts.toml.");
        }
        AppError::Config(ConfigError::InvalidRule { .. }) => {
            eprintln!();
            eprintln!("Hint: Every rule needs at least one condition and one escalation level.");
        }
        AppError::InvalidInput { .. } => {
            eprintln!();
            eprintln!("Hint: Sample lines look like `1700000000 api.error_rate 6.5`.");
        }
        _ => {}
    }
}
