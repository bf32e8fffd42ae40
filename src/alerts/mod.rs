//! Alerting engine and notification system
//!
//! Provides windowed threshold rules over metric samples, the alert
//! lifecycle (trigger, escalate, acknowledge, resolve, auto-resolve) and
//! fan-out to named notification channels.

mod buffer;
mod config;
mod engine;
mod evaluator;
mod notifier;
mod rate_limiter;
mod scheduler;
mod store;
mod types;

pub use buffer::{MetricBuffer, MetricSample, EVALUATION_HORIZON};
pub use config::{
    AlertConfig, AlertRuleConfig, AlertSettings, AutoResolveTimeouts, ChannelConfig, ChannelKind,
    ConditionConfig, EscalationConfig, SuppressionConfig,
};
pub use engine::{
    AlertingEngine, CleanupReport, EngineConfig, EngineStats, EngineStatus, RuleOutcome,
    SYSTEM_ACTOR,
};
pub use evaluator::{ConditionEvaluator, Observation};
pub use notifier::{
    ChatNotifier, DispatchJob, DispatchReport, EmailNotifier, LogNotifier, LogTransport,
    NotificationManager, Notifier, NullNotifier, TerminalNotifier, Transport, WebhookNotifier,
};
pub use rate_limiter::{RateLimiter, RateLimits, DECAY_AFTER};
pub use scheduler::{ScheduledTask, Scheduler, TaskId};
pub use store::{AlertFilter, AlertStore};
pub use types::{
    Acknowledgment, Aggregation, Alert, AlertCondition, AlertRule, AlertSeverity, AlertType,
    EscalationRule, Operator, SuppressionRule,
};
