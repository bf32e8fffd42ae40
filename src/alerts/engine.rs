//! Alerting engine
//!
//! Owns the rule registry, metric buffer, alert store, rate limiter and
//! delayed-task scheduler behind one lock, and drives the alert lifecycle:
//! evaluation, triggering, escalation, auto-resolution and cleanup.
//!
//! Every method reads time from the injected [`Clock`], so the periodic
//! work can be driven by the runtime threads or stepped by hand in tests.

use super::buffer::{MetricBuffer, EVALUATION_HORIZON};
use super::config::{AlertConfig, AutoResolveTimeouts};
use super::evaluator::{ConditionEvaluator, Observation};
use super::notifier::{DispatchJob, NotificationManager, Transport};
use super::rate_limiter::{RateLimiter, RateLimits};
use super::scheduler::{ScheduledTask, Scheduler};
use super::store::{AlertFilter, AlertStore};
use super::types::{Alert, AlertRule, AlertSeverity, AlertType, EscalationRule};
use crate::clock::{elapsed_between, unix_millis, Clock};
use crate::error::{AlertError, ConfigError, Result};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// Actor recorded on system-initiated resolutions
pub const SYSTEM_ACTOR: &str = "system";

/// Engine tuning derived from the `[settings]`, `[rate_limits]` and
/// `[auto_resolve]` configuration sections
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enabled: bool,
    /// Samples older than this are ignored by evaluation
    pub metric_horizon: Duration,
    /// Samples older than this are evicted by cleanup
    pub metric_retention: Duration,
    /// Resolved alerts older than this are deleted by cleanup
    pub resolved_retention: Duration,
    pub rate_limits: RateLimits,
    pub auto_resolve: AutoResolveTimeouts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metric_horizon: EVALUATION_HORIZON,
            metric_retention: Duration::from_secs(2 * 60 * 60),
            resolved_retention: Duration::from_secs(24 * 60 * 60),
            rate_limits: RateLimits::default(),
            auto_resolve: AutoResolveTimeouts::default(),
        }
    }
}

impl From<&AlertConfig> for EngineConfig {
    fn from(config: &AlertConfig) -> Self {
        let settings = &config.settings;
        Self {
            enabled: settings.enabled,
            metric_horizon: Duration::from_secs(settings.metric_horizon_minutes * 60),
            metric_retention: Duration::from_secs(settings.metric_retention_minutes * 60),
            resolved_retention: Duration::from_secs(settings.resolved_retention_hours * 60 * 60),
            rate_limits: config.rate_limits,
            auto_resolve: config.auto_resolve,
        }
    }
}

/// What happened when a rule was evaluated
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// The engine is switched off
    EngineDisabled,
    /// The rule is switched off
    RuleDisabled,
    /// The rule fired too recently
    CoolingDown,
    /// A suppression guard holds
    Suppressed { reason: String },
    /// At least one condition does not hold (or has no data)
    NotTriggered,
    /// Conditions hold but the hourly cap is reached
    RateLimited,
    /// A new alert was created
    Triggered(Alert),
}

/// Point-in-time engine summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub enabled: bool,
    pub active_alerts: usize,
    pub total_rules: usize,
    pub enabled_rules: usize,
    pub metrics_tracked: usize,
    pub pending_tasks: usize,
}

/// Activity and drop counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub evaluation_rounds: u64,
    pub rules_evaluated: u64,
    pub alerts_created: u64,
    pub cooled_down: u64,
    pub suppressed: u64,
    pub rate_limited: u64,
    pub escalations: u64,
    pub auto_resolved: u64,
    pub samples_rejected: u64,
    pub samples_evicted: u64,
    pub alerts_purged: u64,
    pub notifications_delivered: u64,
    pub notification_failures: u64,
}

/// Result of one cleanup sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub samples_evicted: usize,
    pub alerts_purged: usize,
}

struct EngineState {
    enabled: bool,
    rules: BTreeMap<String, AlertRule>,
    last_alert: HashMap<String, SystemTime>,
    buffer: MetricBuffer,
    store: AlertStore,
    limiter: RateLimiter,
    scheduler: Scheduler<ScheduledTask>,
    stats: EngineStats,
    next_seq: u64,
}

impl EngineState {
    fn evaluate(
        &mut self,
        rule: &AlertRule,
        now: SystemTime,
        jobs: &mut Vec<DispatchJob>,
    ) -> RuleOutcome {
        if !rule.enabled {
            return RuleOutcome::RuleDisabled;
        }
        self.stats.rules_evaluated += 1;

        if let Some(last) = self.last_alert.get(&rule.id) {
            if elapsed_between(now, *last) < rule.effective_cooldown() {
                self.stats.cooled_down += 1;
                return RuleOutcome::CoolingDown;
            }
        }

        let evaluator = ConditionEvaluator::new(&self.buffer, now);

        if let Some(suppression) = rule
            .suppression_rules
            .iter()
            .find(|s| evaluator.all_hold(&s.conditions))
        {
            log::info!("Rule {} suppressed: {}", rule.id, suppression.reason);
            self.stats.suppressed += 1;
            return RuleOutcome::Suppressed {
                reason: suppression.reason.clone(),
            };
        }

        match evaluator.observe_all(&rule.conditions) {
            Some(observations) => self.trigger(rule, &observations, now, jobs),
            None => RuleOutcome::NotTriggered,
        }
    }

    fn trigger(
        &mut self,
        rule: &AlertRule,
        observations: &[Observation<'_>],
        now: SystemTime,
        jobs: &mut Vec<DispatchJob>,
    ) -> RuleOutcome {
        if self.limiter.is_limited(rule.alert_type, rule.severity) {
            log::warn!(
                "Rate limit reached for {} {} alerts, dropping alert from rule {}",
                rule.severity,
                rule.alert_type,
                rule.id
            );
            self.stats.rate_limited += 1;
            return RuleOutcome::RateLimited;
        }

        let mut context = BTreeMap::new();
        context.insert("rule_name".to_string(), serde_json::json!(rule.name));
        for observation in observations {
            if let Some(value) = observation.value {
                context.insert(
                    observation.condition.metric.clone(),
                    serde_json::json!(value),
                );
            }
        }

        let message = observations
            .iter()
            .map(|o| match o.value {
                Some(v) => format!("{} (observed {:.2})", o.condition, v),
                None => o.condition.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ");

        self.next_seq += 1;
        let alert = Alert {
            id: format!("{}-{}-{}", rule.id, unix_millis(now), self.next_seq),
            rule_id: rule.id.clone(),
            alert_type: rule.alert_type,
            severity: rule.severity,
            title: rule.name.clone(),
            message,
            created_at: now,
            resolved: false,
            resolved_at: None,
            context,
            actions: rule.actions.clone(),
            escalation_level: 0,
            acknowledgments: Vec::new(),
        };

        log::warn!(
            "[{}] {} ({}): {}",
            alert.severity,
            alert.title,
            alert.id,
            alert.message
        );

        self.store.create(alert.clone());
        self.last_alert.insert(rule.id.clone(), now);
        self.limiter
            .increment(rule.alert_type, rule.severity, now, &mut self.scheduler);
        self.stats.alerts_created += 1;

        let plan: Arc<[EscalationRule]> = Arc::from(rule.escalation_rules.as_slice());
        if let Some(initial) = plan.first() {
            jobs.push(DispatchJob {
                alert: alert.clone(),
                channels: initial.channels.clone(),
            });
        }
        self.schedule_escalation(&alert.id, 1, plan, now);

        RuleOutcome::Triggered(alert)
    }

    fn schedule_escalation(
        &mut self,
        alert_id: &str,
        level: usize,
        plan: Arc<[EscalationRule]>,
        from: SystemTime,
    ) {
        let Some(step) = plan.get(level) else {
            return;
        };
        let fire_at = from + step.delay;
        log::debug!(
            "Escalation of {} to level {} scheduled in {:?}",
            alert_id,
            level,
            step.delay
        );
        self.scheduler.schedule(
            fire_at,
            ScheduledTask::Escalate {
                alert_id: alert_id.to_string(),
                level,
                plan,
            },
        );
    }

    fn escalate(
        &mut self,
        alert_id: &str,
        level: usize,
        plan: Arc<[EscalationRule]>,
        now: SystemTime,
        jobs: &mut Vec<DispatchJob>,
    ) {
        let Some(step) = plan.get(level) else {
            return;
        };
        let Some(alert) = self.store.get_mut(alert_id) else {
            log::debug!("Escalation target {} no longer exists", alert_id);
            return;
        };
        if !alert.is_active() || alert.is_acknowledged() {
            log::debug!("Skipping escalation of handled alert {}", alert_id);
            return;
        }

        alert.escalate(level, step.severity);
        log::warn!(
            "Escalated alert {} to level {} ({})",
            alert_id,
            step.level,
            step.severity
        );
        jobs.push(DispatchJob {
            alert: alert.clone(),
            channels: step.channels.clone(),
        });
        self.stats.escalations += 1;

        self.schedule_escalation(alert_id, level + 1, plan, now);
    }

    fn cancel_escalations(&mut self, alert_id: &str) {
        let cancelled = self
            .scheduler
            .cancel_where(|task| task.alert_id() == Some(alert_id));
        if cancelled > 0 {
            log::debug!("Cancelled {} pending escalation(s) for {}", cancelled, alert_id);
        }
    }
}

/// Rule-based alerting engine
pub struct AlertingEngine {
    config: EngineConfig,
    state: Mutex<EngineState>,
    notifications: Arc<NotificationManager>,
    clock: Arc<dyn Clock>,
    dispatch_queue: Mutex<Option<Sender<DispatchJob>>>,
}

impl AlertingEngine {
    /// Create an engine with no rules
    pub fn new(
        config: EngineConfig,
        notifications: NotificationManager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = EngineState {
            enabled: config.enabled,
            rules: BTreeMap::new(),
            last_alert: HashMap::new(),
            buffer: MetricBuffer::new(config.metric_horizon),
            store: AlertStore::new(),
            limiter: RateLimiter::new(config.rate_limits),
            scheduler: Scheduler::new(),
            stats: EngineStats::default(),
            next_seq: 0,
        };

        Self {
            config,
            state: Mutex::new(state),
            notifications: Arc::new(notifications),
            clock,
            dispatch_queue: Mutex::new(None),
        }
    }

    /// Build an engine from a configuration file, registering its rules
    pub fn from_config(
        config: &AlertConfig,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let engine = Self::new(
            EngineConfig::from(config),
            config.build_notifiers(transport),
            clock,
        );
        for rule in config.to_alert_rules()? {
            engine.set_alert_rule(rule)?;
        }
        Ok(engine)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn notifications(&self) -> &Arc<NotificationManager> {
        &self.notifications
    }

    /// Route future dispatches through a worker queue instead of inline
    pub fn attach_dispatch_queue(&self, sender: Sender<DispatchJob>) {
        *self
            .dispatch_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    /// Return to inline dispatch, handing back the previous queue
    pub fn detach_dispatch_queue(&self) -> Option<Sender<DispatchJob>> {
        self.dispatch_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // Must be called with the state lock released
    fn deliver(&self, jobs: Vec<DispatchJob>) {
        if jobs.is_empty() {
            return;
        }
        let queue = self
            .dispatch_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for job in jobs {
            match &queue {
                Some(sender) => {
                    if let Err(e) = sender.send(job) {
                        log::warn!("Dispatch queue closed, delivering inline");
                        self.notifications.dispatch(&e.into_inner());
                    }
                }
                None => {
                    self.notifications.dispatch(&job);
                }
            }
        }
    }

    /// Record a metric sample; `None` stamps it with the current time.
    /// Returns false when the value was rejected.
    pub fn record_metric(&self, name: &str, value: f64, timestamp: Option<SystemTime>) -> bool {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.now());
        let mut state = self.lock();
        let accepted = state.buffer.record(name, value, timestamp);
        if !accepted {
            state.stats.samples_rejected += 1;
        }
        accepted
    }

    /// Validate and insert or replace a rule
    pub fn set_alert_rule(&self, rule: AlertRule) -> std::result::Result<(), ConfigError> {
        rule.validate()?;
        log::info!("Registered alert rule {} ({})", rule.id, rule.name);
        self.lock().rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    /// Remove a rule and its cooldown record. Pending escalations of
    /// alerts it created keep running on their captured ladder.
    pub fn remove_alert_rule(&self, id: &str) -> bool {
        let mut state = self.lock();
        state.last_alert.remove(id);
        let removed = state.rules.remove(id).is_some();
        if removed {
            log::info!("Removed alert rule {}", id);
        }
        removed
    }

    /// Registered rules, ordered by id
    pub fn rules(&self) -> Vec<AlertRule> {
        self.lock().rules.values().cloned().collect()
    }

    /// Evaluate every rule once. Returns the alerts created.
    pub fn evaluate_all(&self) -> Vec<Alert> {
        let now = self.clock.now();
        let mut jobs = Vec::new();
        let mut created = Vec::new();

        {
            let mut state = self.lock();
            if !state.enabled {
                log::debug!("Alerting disabled, skipping evaluation");
                return created;
            }
            state.stats.evaluation_rounds += 1;

            let rules: Vec<AlertRule> = state.rules.values().cloned().collect();
            for rule in &rules {
                if let RuleOutcome::Triggered(alert) = state.evaluate(rule, now, &mut jobs) {
                    created.push(alert);
                }
            }
        }

        self.deliver(jobs);
        created
    }

    /// Evaluate one rule on demand
    pub fn evaluate_rule(&self, id: &str) -> std::result::Result<RuleOutcome, AlertError> {
        let now = self.clock.now();
        let mut jobs = Vec::new();

        let outcome = {
            let mut state = self.lock();
            let rule = state
                .rules
                .get(id)
                .cloned()
                .ok_or_else(|| AlertError::RuleNotFound(id.to_string()))?;
            if !state.enabled {
                return Ok(RuleOutcome::EngineDisabled);
            }
            state.evaluate(&rule, now, &mut jobs)
        };

        self.deliver(jobs);
        Ok(outcome)
    }

    /// Fire due escalations and rate-limit decays. Returns tasks processed.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now();
        let mut jobs = Vec::new();

        let processed = {
            let mut state = self.lock();
            let due = state.scheduler.drain_due(now);
            let processed = due.len();
            for task in due {
                match task {
                    ScheduledTask::Escalate {
                        alert_id,
                        level,
                        plan,
                    } => state.escalate(&alert_id, level, plan, now, &mut jobs),
                    ScheduledTask::RateDecay {
                        alert_type,
                        severity,
                    } => state.limiter.decay(alert_type, severity),
                }
            }
            processed
        };

        self.deliver(jobs);
        processed
    }

    /// When the next escalation or rate decay falls due
    pub fn next_due(&self) -> Option<SystemTime> {
        self.lock().scheduler.next_due()
    }

    /// Acknowledge an alert, halting its escalation.
    /// `Ok(false)` when the alert is already resolved.
    pub fn acknowledge(
        &self,
        id: &str,
        user_id: &str,
        comment: Option<String>,
    ) -> std::result::Result<bool, AlertError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let acknowledged = state.store.acknowledge(id, user_id, comment, now)?;
        if acknowledged {
            log::info!("Alert {} acknowledged by {}", id, user_id);
            state.cancel_escalations(id);
        }
        Ok(acknowledged)
    }

    /// Resolve an alert. `Ok(false)` when it already was.
    pub fn resolve(
        &self,
        id: &str,
        user_id: &str,
        comment: Option<String>,
    ) -> std::result::Result<bool, AlertError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let resolved = state.store.resolve(id, user_id, comment, now)?;
        if resolved {
            log::info!("Alert {} resolved by {}", id, user_id);
            state.cancel_escalations(id);
        }
        Ok(resolved)
    }

    /// Resolve alerts older than their type's timeout. Returns the count.
    pub fn auto_resolve(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        if !state.enabled {
            return 0;
        }

        let mut resolved = 0;
        for id in state.store.active_ids() {
            let Some(alert) = state.store.get(&id) else {
                continue;
            };
            let Some(timeout) = self.config.auto_resolve.timeout(alert.alert_type) else {
                continue;
            };
            if elapsed_between(now, alert.created_at) <= timeout {
                continue;
            }

            let reason = format!(
                "Auto-resolved after {} minutes without resolution",
                timeout.as_secs() / 60
            );
            if let Ok(true) = state.store.resolve(&id, SYSTEM_ACTOR, Some(reason), now) {
                log::info!("Auto-resolved alert {}", id);
                state.cancel_escalations(&id);
                state.stats.auto_resolved += 1;
                resolved += 1;
            }
        }
        resolved
    }

    /// Evict old samples and purge old resolved alerts
    pub fn cleanup(&self) -> CleanupReport {
        let now = self.clock.now();
        let sample_cutoff = now
            .checked_sub(self.config.metric_retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let alert_cutoff = now
            .checked_sub(self.config.resolved_retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut state = self.lock();
        let report = CleanupReport {
            samples_evicted: state.buffer.evict_older_than(sample_cutoff),
            alerts_purged: state.store.purge_resolved_before(alert_cutoff),
        };
        state.stats.samples_evicted += report.samples_evicted as u64;
        state.stats.alerts_purged += report.alerts_purged as u64;

        if report.samples_evicted > 0 || report.alerts_purged > 0 {
            log::debug!(
                "Cleanup evicted {} samples and purged {} alerts",
                report.samples_evicted,
                report.alerts_purged
            );
        }
        report
    }

    /// Unresolved alerts, newest first
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.lock().store.list(AlertFilter::Active)
    }

    /// Every alert still held, newest first
    pub fn all_alerts(&self) -> Vec<Alert> {
        self.lock().store.list(AlertFilter::All)
    }

    pub fn alert(&self, id: &str) -> Option<Alert> {
        self.lock().store.get(id).cloned()
    }

    /// Switch evaluation and auto-resolution on or off
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        if state.enabled != enabled {
            log::info!("Alerting {}", if enabled { "enabled" } else { "disabled" });
        }
        state.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.lock();
        EngineStatus {
            enabled: state.enabled,
            active_alerts: state.store.active_count(),
            total_rules: state.rules.len(),
            enabled_rules: state.rules.values().filter(|r| r.enabled).count(),
            metrics_tracked: state.buffer.metrics_tracked(),
            pending_tasks: state.scheduler.pending(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let mut stats = self.lock().stats.clone();
        stats.notifications_delivered = self.notifications.delivered_count();
        stats.notification_failures = self.notifications.failure_count();
        stats
    }

    /// Current hourly count for a (type, severity) pair
    pub fn rate_count(&self, alert_type: AlertType, severity: AlertSeverity) -> u32 {
        self.lock().limiter.count(alert_type, severity)
    }
}
