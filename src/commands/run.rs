//! Run command implementation
//!
//! Starts the engine runtime on the wall clock and streams samples from
//! stdin until EOF.

use super::input::parse_live;
use crate::alerts::{AlertConfig, AlertingEngine, LogTransport};
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, EngineSummary};
use crate::clock::SystemClock;
use crate::error::Result;
use crate::services::{EngineRuntime, RuntimeConfig};

use std::io::{self, BufRead};
use std::sync::Arc;

/// Run the alerting engine on stdin samples
pub fn run_live(config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let (config, _) = AlertConfig::load_or_default(config_path)?;
    let engine = Arc::new(AlertingEngine::from_config(
        &config,
        Arc::new(SystemClock),
        Arc::new(LogTransport),
    )?);

    let status = engine.status();
    log::info!(
        "Loaded {} alert rules ({} enabled)",
        status.total_rules,
        status.enabled_rules
    );

    let runtime = EngineRuntime::start(engine.clone(), RuntimeConfig::from(&config.settings))?;
    let recorded = ingest(&engine, io::stdin().lock())?;
    log::info!("Input closed after {} samples", recorded);

    // Final pass so trailing samples are evaluated before exit
    engine.evaluate_all();
    engine.run_due();
    runtime.stop();

    let summary = EngineSummary {
        status: engine.status(),
        stats: engine.stats(),
    };
    print_output(&summary, format)?;

    Ok(())
}

/// Record every well-formed line. Malformed lines are logged and skipped.
fn ingest<R: BufRead>(engine: &AlertingEngine, reader: R) -> Result<usize> {
    let mut recorded = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_live(idx + 1, &line) {
            Ok(Some(sample)) => {
                if engine.record_metric(&sample.metric, sample.value, sample.timestamp) {
                    recorded += 1;
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Skipping input: {}", e),
        }
    }
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::mock::RecordingTransport;
    use std::io::Cursor;

    #[test]
    fn test_ingest_skips_bad_lines() {
        let config = AlertConfig::default();
        let engine = AlertingEngine::from_config(
            &config,
            Arc::new(ManualClock::at_unix(1_700_000_000)),
            Arc::new(RecordingTransport::new()),
        )
        .unwrap();

        let input = "api.error_rate 12\n# comment\nnot-a-sample\napi.error_rate oops\ncpu 3\n";
        let recorded = ingest(&engine, Cursor::new(input)).unwrap();

        assert_eq!(recorded, 2);
        assert_eq!(engine.status().metrics_tracked, 2);
        assert_eq!(engine.evaluate_all().len(), 1);
    }
}
