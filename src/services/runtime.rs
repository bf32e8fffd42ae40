//! Engine runtime
//!
//! Drives an [`AlertingEngine`] from background threads: a scheduler
//! thread selecting over periodic tickers (evaluation, auto-resolve,
//! cleanup, delayed tasks) and a dispatch router that hands each queued
//! notification to a per-channel worker, so a stalled sink only backs up
//! its own queue.

use crate::alerts::{Alert, AlertSettings, AlertingEngine, DispatchJob, NotificationManager};
use crate::error::Result;

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::slice;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Tick intervals for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interval between rule evaluation rounds
    pub evaluation_interval: Duration,
    /// Interval between auto-resolve sweeps
    pub auto_resolve_interval: Duration,
    /// Interval between cleanup sweeps
    pub cleanup_interval: Duration,
    /// Resolution of escalation and rate-decay timers
    pub scheduler_tick: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(30),
            auto_resolve_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(300),
            scheduler_tick: Duration::from_secs(1),
        }
    }
}

impl From<&AlertSettings> for RuntimeConfig {
    fn from(settings: &AlertSettings) -> Self {
        Self {
            evaluation_interval: Duration::from_secs(settings.evaluation_interval_secs.max(1)),
            auto_resolve_interval: Duration::from_secs(settings.auto_resolve_interval_secs.max(1)),
            cleanup_interval: Duration::from_secs(settings.cleanup_interval_secs.max(1)),
            scheduler_tick: Duration::from_millis(settings.scheduler_tick_millis.max(10)),
        }
    }
}

/// Running engine threads
pub struct EngineRuntime {
    engine: Arc<AlertingEngine>,
    shutdown: Option<Sender<()>>,
    scheduler: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl EngineRuntime {
    /// Spawn the scheduler and dispatch threads
    pub fn start(engine: Arc<AlertingEngine>, config: RuntimeConfig) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<DispatchJob>();
        let notifications = engine.notifications().clone();
        let dispatcher = thread::Builder::new()
            .name("alert-dispatch".to_string())
            .spawn(move || route_jobs(&notifications, &job_rx))?;
        engine.attach_dispatch_queue(job_tx);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let worker_engine = engine.clone();
        let scheduler = thread::Builder::new()
            .name("alert-scheduler".to_string())
            .spawn(move || scheduler_loop(&worker_engine, &config, &shutdown_rx));

        let scheduler = match scheduler {
            Ok(handle) => handle,
            Err(e) => {
                engine.detach_dispatch_queue();
                let _ = dispatcher.join();
                return Err(e.into());
            }
        };

        log::info!("Alerting runtime started");

        Ok(Self {
            engine,
            shutdown: Some(shutdown_tx),
            scheduler: Some(scheduler),
            dispatcher: Some(dispatcher),
        })
    }

    /// Engine driven by this runtime
    pub fn engine(&self) -> &Arc<AlertingEngine> {
        &self.engine
    }

    /// Stop the tickers and wait for queued notifications to drain
    pub fn stop(mut self) {
        self.shutdown_threads();
    }

    fn shutdown_threads(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                log::error!("Scheduler thread panicked");
            }
        }

        // Dropping the last sender ends the worker's receive loop
        self.engine.detach_dispatch_queue();
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                log::error!("Dispatch thread panicked");
            }
            log::info!("Alerting runtime stopped");
        }
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        self.shutdown_threads();
    }
}

fn scheduler_loop(engine: &AlertingEngine, config: &RuntimeConfig, shutdown: &Receiver<()>) {
    let evaluation = tick(config.evaluation_interval);
    let auto_resolve = tick(config.auto_resolve_interval);
    let cleanup = tick(config.cleanup_interval);
    let timers = tick(config.scheduler_tick);

    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(evaluation) -> _ => {
                run_guarded("evaluation", || {
                    let created = engine.evaluate_all();
                    if !created.is_empty() {
                        log::debug!("Evaluation created {} alert(s)", created.len());
                    }
                });
            }
            recv(auto_resolve) -> _ => {
                run_guarded("auto-resolve", || {
                    engine.auto_resolve();
                });
            }
            recv(cleanup) -> _ => {
                run_guarded("cleanup", || {
                    engine.cleanup();
                });
            }
            recv(timers) -> _ => {
                run_guarded("timers", || {
                    engine.run_due();
                });
            }
        }
    }
}

/// Split queued jobs across one worker thread per registered channel.
/// Returns once the job queue is closed and every worker has drained.
fn route_jobs(notifications: &Arc<NotificationManager>, jobs: &Receiver<DispatchJob>) {
    let mut lanes: HashMap<String, Sender<Arc<Alert>>> = HashMap::new();
    let mut workers = Vec::new();

    for name in notifications.channel_names() {
        let (lane_tx, lane_rx) = unbounded::<Arc<Alert>>();
        let manager = notifications.clone();
        let channel = name.clone();
        let spawned = thread::Builder::new()
            .name(format!("notify-{}", name))
            .spawn(move || {
                for alert in lane_rx.iter() {
                    manager.send(&alert, slice::from_ref(&channel));
                }
            });

        match spawned {
            Ok(handle) => {
                lanes.insert(name, lane_tx);
                workers.push(handle);
            }
            Err(e) => log::error!(
                "Failed to start worker for channel '{}', delivering inline: {}",
                name,
                e
            ),
        }
    }

    for job in jobs.iter() {
        let DispatchJob { alert, channels } = job;
        let alert = Arc::new(alert);
        for channel in channels {
            match lanes.get(&channel) {
                Some(lane) => {
                    if let Err(e) = lane.send(alert.clone()) {
                        notifications.send(&e.into_inner(), slice::from_ref(&channel));
                    }
                }
                // Unknown names are logged and skipped by the manager
                None => {
                    notifications.send(&alert, slice::from_ref(&channel));
                }
            }
        }
    }

    drop(lanes);
    for handle in workers {
        if handle.join().is_err() {
            log::error!("Channel worker panicked");
        }
    }
    log::debug!("Dispatch router drained, exiting");
}

/// Run one tick body, logging a panic instead of unwinding the loop.
/// Returns false if the body panicked.
pub fn run_guarded<F: FnOnce()>(task: &str, body: F) -> bool {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(()) => true,
        Err(_) => {
            log::error!("{} tick panicked; continuing", task);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{
        Aggregation, AlertCondition, AlertRule, AlertSeverity, AlertType, EngineConfig,
        NotificationManager, Operator,
    };
    use crate::clock::ManualClock;
    use crate::mock::{BlockingNotifier, PanickingNotifier, RecordingNotifier};
    use std::time::Instant;

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig {
            evaluation_interval: Duration::from_millis(10),
            auto_resolve_interval: Duration::from_millis(10),
            cleanup_interval: Duration::from_millis(10),
            scheduler_tick: Duration::from_millis(10),
        }
    }

    fn engine_with(notifiers: Vec<Box<dyn crate::alerts::Notifier>>) -> Arc<AlertingEngine> {
        let mut notifications = NotificationManager::new();
        for notifier in notifiers {
            notifications.add_notifier(notifier);
        }
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let engine = AlertingEngine::new(EngineConfig::default(), notifications, clock);
        engine
            .set_alert_rule(AlertRule::new(
                "cpu",
                "CPU High",
                AlertType::Performance,
                AlertSeverity::High,
                vec![AlertCondition::new(
                    "cpu",
                    Operator::Gt,
                    90.0,
                    Duration::from_secs(60),
                    Aggregation::Max,
                )],
                vec!["boom".to_string(), "log".to_string()],
            ))
            .unwrap();
        Arc::new(engine)
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_runtime_config_from_settings() {
        let config = RuntimeConfig::from(&AlertSettings::default());
        assert_eq!(config.evaluation_interval, Duration::from_secs(30));
        assert_eq!(config.auto_resolve_interval, Duration::from_secs(60));
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.scheduler_tick, Duration::from_secs(1));
    }

    #[test]
    fn test_runtime_evaluates_and_dispatches() {
        let log = RecordingNotifier::new("log");
        let engine = engine_with(vec![
            Box::new(PanickingNotifier::new("boom")),
            Box::new(log.clone()),
        ]);
        engine.record_metric("cpu", 99.0, None);

        let runtime = EngineRuntime::start(engine.clone(), fast_config()).unwrap();
        assert!(wait_for(|| log.count() == 1));
        runtime.stop();

        // Cooldown keeps it to one alert; the panicking sibling is isolated
        assert_eq!(engine.all_alerts().len(), 1);
        assert_eq!(engine.stats().notification_failures, 1);
    }

    #[test]
    fn test_stalled_channel_does_not_block_siblings() {
        let slow = BlockingNotifier::new("boom");
        let log = RecordingNotifier::new("log");
        let engine = engine_with(vec![Box::new(slow.clone()), Box::new(log.clone())]);
        engine.record_metric("cpu", 99.0, None);

        let runtime = EngineRuntime::start(engine.clone(), fast_config()).unwrap();
        // "boom" is listed first and never returns until released
        assert!(wait_for(|| slow.entered() == 1 && log.count() == 1));

        slow.release();
        runtime.stop();
        assert_eq!(engine.stats().notifications_delivered, 2);
    }

    #[test]
    fn test_stop_returns_to_inline_dispatch() {
        let log = RecordingNotifier::new("log");
        let engine = engine_with(vec![Box::new(log.clone())]);

        let runtime = EngineRuntime::start(engine.clone(), fast_config()).unwrap();
        runtime.stop();
        assert!(engine.detach_dispatch_queue().is_none());

        engine.record_metric("cpu", 99.0, None);
        assert_eq!(engine.evaluate_all().len(), 1);
        assert_eq!(log.count(), 1);
    }

    #[test]
    fn test_run_guarded_contains_panics() {
        assert!(run_guarded("ok", || {}));
        assert!(!run_guarded("bad", || panic!("tick failure")));
    }
}
