//! Replay command implementation
//!
//! Feeds a timestamped sample file through an engine on a manual clock,
//! running the periodic sweeps and delayed tasks at the times they would
//! have fired live.

use super::input::{parse_timestamped, SampleLine};
use crate::alerts::{AlertConfig, AlertingEngine, LogTransport};
use crate::cli::args::{OutputFormat, ReplayArgs};
use crate::cli::output::{print_output, AlertList, EngineSummary, ReplayReport};
use crate::clock::{Clock, ManualClock};
use crate::error::Result;
use crate::services::RuntimeConfig;

use std::fs;
use std::sync::Arc;
use std::time::SystemTime;

/// Execute the replay command
pub fn run_replay(args: &ReplayArgs, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let (config, _) = AlertConfig::load_or_default(config_path)?;
    let contents = fs::read_to_string(&args.input)?;
    let samples = parse_samples(&contents)?;

    let start = samples
        .first()
        .and_then(|s| s.timestamp)
        .unwrap_or_else(SystemTime::now);
    let clock = Arc::new(ManualClock::new(start));
    let engine = AlertingEngine::from_config(&config, clock.clone(), Arc::new(LogTransport))?;

    let mut replayer = Replayer::new(&engine, &clock, RuntimeConfig::from(&config.settings));
    replayer.ack_as = args.ack_as.clone();
    replayer.feed(&samples);

    let alerts = if args.active_only {
        engine.active_alerts()
    } else {
        engine.all_alerts()
    };

    let report = ReplayReport {
        samples: samples.len(),
        alerts: AlertList::new(&alerts),
        summary: EngineSummary {
            status: engine.status(),
            stats: engine.stats(),
        },
    };
    print_output(&report, format)?;

    Ok(())
}

/// Parse a sample file, ordered by timestamp
fn parse_samples(contents: &str) -> Result<Vec<SampleLine>> {
    let mut samples = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if let Some(sample) = parse_timestamped(idx + 1, line)? {
            samples.push(sample);
        }
    }
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

/// Steps a manual clock through sweep and task deadlines
struct Replayer<'a> {
    engine: &'a AlertingEngine,
    clock: &'a ManualClock,
    intervals: RuntimeConfig,
    next_evaluation: SystemTime,
    next_auto_resolve: SystemTime,
    next_cleanup: SystemTime,
    ack_as: Option<String>,
}

impl<'a> Replayer<'a> {
    fn new(engine: &'a AlertingEngine, clock: &'a ManualClock, intervals: RuntimeConfig) -> Self {
        let start = clock.now();
        Self {
            engine,
            clock,
            next_evaluation: start + intervals.evaluation_interval,
            next_auto_resolve: start + intervals.auto_resolve_interval,
            next_cleanup: start + intervals.cleanup_interval,
            intervals,
            ack_as: None,
        }
    }

    /// Record every sample at its time, then run one more evaluation round
    fn feed(&mut self, samples: &[SampleLine]) {
        for sample in samples {
            let at = sample.timestamp.unwrap_or_else(|| self.clock.now());
            self.advance_to(at);
            self.engine.record_metric(&sample.metric, sample.value, Some(at));
        }
        let tail = self.clock.now() + self.intervals.evaluation_interval;
        self.advance_to(tail);
    }

    fn advance_to(&mut self, target: SystemTime) {
        loop {
            let mut next = self
                .next_evaluation
                .min(self.next_auto_resolve)
                .min(self.next_cleanup);
            if let Some(due) = self.engine.next_due() {
                next = next.min(due);
            }
            if next > target {
                break;
            }

            self.clock.set(next);
            self.engine.run_due();

            if self.next_evaluation <= next {
                for alert in self.engine.evaluate_all() {
                    if let Some(user) = &self.ack_as {
                        if let Err(e) = self.engine.acknowledge(&alert.id, user, None) {
                            log::warn!("Could not acknowledge {}: {}", alert.id, e);
                        }
                    }
                }
                self.next_evaluation += self.intervals.evaluation_interval;
            }
            if self.next_auto_resolve <= next {
                self.engine.auto_resolve();
                self.next_auto_resolve += self.intervals.auto_resolve_interval;
            }
            if self.next_cleanup <= next {
                self.engine.cleanup();
                self.next_cleanup += self.intervals.cleanup_interval;
            }
        }
        self.clock.set(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingTransport;

    const START: u64 = 1_700_000_000;

    fn error_rate_file(minutes: u64, value: f64) -> String {
        let mut contents = String::from("# unix_secs metric value\n");
        for m in 0..=minutes {
            contents.push_str(&format!("{} api.error_rate {}\n", START + m * 60, value));
        }
        contents
    }

    fn replay(contents: &str, ack_as: Option<&str>) -> AlertingEngine {
        let samples = parse_samples(contents).unwrap();
        let clock = Arc::new(ManualClock::at_unix(START));
        let config = AlertConfig::default();
        let engine = AlertingEngine::from_config(
            &config,
            clock.clone(),
            Arc::new(RecordingTransport::new()),
        )
        .unwrap();

        {
            let mut replayer =
                Replayer::new(&engine, &clock, RuntimeConfig::from(&config.settings));
            replayer.ack_as = ack_as.map(str::to_string);
            replayer.feed(&samples);
        }
        engine
    }

    #[test]
    fn test_parse_samples_sorts_by_time() {
        let samples = parse_samples("20 b 2\n# note\n\n10 a 1\n").unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].metric, "a");
    }

    #[test]
    fn test_replay_respects_cooldown_and_escalates() {
        let engine = replay(&error_rate_file(20, 10.0), None);

        // Fires at +30s, +10m30s and +20m30s under the 10 minute cooldown
        let alerts = engine.all_alerts();
        assert_eq!(alerts.len(), 3);

        // Only the oldest alert has been open past its 15 minute escalation delay
        let oldest = &alerts[2];
        assert_eq!(oldest.escalation_level, 1);
        assert_eq!(alerts[1].escalation_level, 0);
        assert_eq!(engine.stats().escalations, 1);
    }

    #[test]
    fn test_replay_acknowledged_alerts_do_not_escalate() {
        let engine = replay(&error_rate_file(20, 10.0), Some("alice"));

        let alerts = engine.all_alerts();
        assert_eq!(alerts.len(), 3);
        assert!(alerts.iter().all(|a| a.escalation_level == 0));
        assert!(alerts.iter().all(|a| a.is_acknowledged()));
    }

    #[test]
    fn test_replay_below_threshold_is_quiet() {
        let engine = replay(&error_rate_file(10, 1.0), None);
        assert!(engine.all_alerts().is_empty());
        assert!(engine.stats().evaluation_rounds > 0);
    }
}
