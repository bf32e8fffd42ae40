//! Alert system domain types
//!
//! Defines validated types for the alerting system including rules, conditions,
//! escalation/suppression policies and the alert record with its lifecycle.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational, no action needed
    Info,
    /// Minor degradation
    Low,
    /// Attention recommended
    Medium,
    /// Action required soon
    High,
    /// Immediate action required
    Critical,
}

impl AlertSeverity {
    /// All severities, lowest first
    pub const ALL: [AlertSeverity; 5] = [
        Self::Info,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
    ];

    /// Cooldown applied when a rule does not configure its own
    pub fn default_cooldown(self) -> Duration {
        let minutes = match self {
            Self::Critical => 5,
            Self::High => 10,
            Self::Medium => 15,
            Self::Low => 30,
            Self::Info => 60,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Category of an alert; drives rate limiting and auto-resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Latency and throughput regressions
    Performance,
    /// Error rates and failures
    Error,
    /// Health checks and uptime
    Availability,
    /// Security incidents
    Security,
    /// Real-user experience (web vitals)
    UserExperience,
    /// Business KPIs
    Business,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Performance => write!(f, "performance"),
            Self::Error => write!(f, "error"),
            Self::Availability => write!(f, "availability"),
            Self::Security => write!(f, "security"),
            Self::UserExperience => write!(f, "user_experience"),
            Self::Business => write!(f, "business"),
        }
    }
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl Operator {
    /// Compare an observed value against a threshold
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        const EPSILON: f64 = 1e-6;

        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Eq => (value - threshold).abs() < EPSILON,
            Self::Ne => (value - threshold).abs() >= EPSILON,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        f.write_str(symbol)
    }
}

/// Window aggregation applied before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Avg,
    Max,
    Min,
    Sum,
    Count,
}

impl Aggregation {
    /// Aggregate a set of values; `None` when there are none
    pub fn apply<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return None;
        }

        Some(match self {
            Self::Avg => sum / count as f64,
            Self::Max => max,
            Self::Min => min,
            Self::Sum => sum,
            Self::Count => count as f64,
        })
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Sum => write!(f, "sum"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// One metric threshold comparison over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    /// Metric name
    pub metric: String,
    /// Comparison operator
    pub operator: Operator,
    /// Threshold value
    pub threshold: f64,
    /// Observation window
    pub duration: Duration,
    /// Window aggregation
    pub aggregation: Aggregation,
}

impl AlertCondition {
    /// Create a new condition
    pub fn new(
        metric: impl Into<String>,
        operator: Operator,
        threshold: f64,
        duration: Duration,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            metric: metric.into(),
            operator,
            threshold,
            duration,
            aggregation,
        }
    }

    /// Compare an aggregated value against this condition
    pub fn holds_for(&self, value: f64) -> bool {
        self.operator.compare(value, self.threshold)
    }

    fn validate(&self, rule_id: &str) -> Result<(), ConfigError> {
        if self.metric.trim().is_empty() {
            return Err(ConfigError::invalid_rule(rule_id, "condition has an empty metric name"));
        }
        if !self.threshold.is_finite() {
            return Err(ConfigError::invalid_rule(
                rule_id,
                format!("threshold for '{}' is not a finite number", self.metric),
            ));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::invalid_rule(
                rule_id,
                format!("window for '{}' must be longer than zero", self.metric),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) over {}m {} {}",
            self.aggregation,
            self.metric,
            self.duration.as_secs() / 60,
            self.operator,
            self.threshold
        )
    }
}

/// One step of an escalation ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Ladder position; level 0 is the initial notification
    pub level: u32,
    /// Delay after the previous level before this level fires
    pub delay: Duration,
    /// Channel names notified at this level
    pub channels: Vec<String>,
    /// Severity the alert takes at this level
    pub severity: AlertSeverity,
}

impl EscalationRule {
    /// Create a new escalation step
    pub fn new(level: u32, delay: Duration, channels: Vec<String>, severity: AlertSeverity) -> Self {
        Self {
            level,
            delay,
            channels,
            severity,
        }
    }
}

/// Guard that mutes a rule while its own conditions hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionRule {
    /// Conditions (AND) that activate the suppression
    pub conditions: Vec<AlertCondition>,
    /// Expected length of the suppressed period, informational
    pub duration: Duration,
    /// Why alerts are muted
    pub reason: String,
}

/// Alert rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique rule identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Alert category
    pub alert_type: AlertType,
    /// Whether rule is enabled
    pub enabled: bool,
    /// Firing conditions, AND-combined
    pub conditions: Vec<AlertCondition>,
    /// Initial alert severity
    pub severity: AlertSeverity,
    /// Minimum gap between alerts from this rule; severity default when unset
    pub cooldown: Option<Duration>,
    /// Escalation ladder ordered by level
    pub escalation_rules: Vec<EscalationRule>,
    /// Suppression guards
    pub suppression_rules: Vec<SuppressionRule>,
    /// Remediation hints copied onto alerts
    pub actions: Vec<String>,
}

impl AlertRule {
    /// Create a new alert rule notifying `channels` at level 0
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        conditions: Vec<AlertCondition>,
        channels: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            alert_type,
            enabled: true,
            conditions,
            severity,
            cooldown: None,
            escalation_rules: vec![EscalationRule::new(0, Duration::ZERO, channels, severity)],
            suppression_rules: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Set cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Append an escalation step
    pub fn with_escalation(mut self, step: EscalationRule) -> Self {
        self.escalation_rules.push(step);
        self
    }

    /// Append a suppression guard
    pub fn with_suppression(mut self, suppression: SuppressionRule) -> Self {
        self.suppression_rules.push(suppression);
        self
    }

    /// Set remediation actions
    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions = actions;
        self
    }

    /// Disable the rule
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Cooldown in effect for this rule
    pub fn effective_cooldown(&self) -> Duration {
        self.cooldown
            .unwrap_or_else(|| self.severity.default_cooldown())
    }

    /// Reject malformed rules before they reach the engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid_rule(&self.id, "rule id must not be empty"));
        }
        if self.conditions.is_empty() {
            return Err(ConfigError::invalid_rule(&self.id, "rule has no conditions"));
        }
        for condition in &self.conditions {
            condition.validate(&self.id)?;
        }
        if self.escalation_rules.is_empty() {
            return Err(ConfigError::invalid_rule(&self.id, "rule has no escalation levels"));
        }
        for pair in self.escalation_rules.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(ConfigError::invalid_rule(
                    &self.id,
                    format!(
                        "escalation levels must be strictly increasing ({} then {})",
                        pair[0].level, pair[1].level
                    ),
                ));
            }
        }
        for suppression in &self.suppression_rules {
            if suppression.conditions.is_empty() {
                return Err(ConfigError::invalid_rule(
                    &self.id,
                    format!("suppression '{}' has no conditions", suppression.reason),
                ));
            }
            for condition in &suppression.conditions {
                condition.validate(&self.id)?;
            }
        }
        Ok(())
    }
}

/// A user (or the system) acting on an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub user_id: String,
    pub timestamp: SystemTime,
    pub comment: Option<String>,
}

/// Alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert ID
    pub id: String,
    /// Rule that created this alert
    pub rule_id: String,
    /// Alert category
    pub alert_type: AlertType,
    /// Current severity; changes only through escalation
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub created_at: SystemTime,
    pub resolved: bool,
    pub resolved_at: Option<SystemTime>,
    /// Observed values and rule metadata at trigger time
    pub context: BTreeMap<String, serde_json::Value>,
    /// Remediation hints
    pub actions: Vec<String>,
    /// Index into the rule's escalation ladder
    pub escalation_level: usize,
    pub acknowledgments: Vec<Acknowledgment>,
}

impl Alert {
    /// Whether the alert is still open
    pub fn is_active(&self) -> bool {
        !self.resolved
    }

    /// Whether anyone has acknowledged the alert
    pub fn is_acknowledged(&self) -> bool {
        !self.acknowledgments.is_empty()
    }

    /// Record an acknowledgment. Returns false on a resolved alert.
    pub fn acknowledge(&mut self, user_id: &str, comment: Option<String>, now: SystemTime) -> bool {
        if self.resolved {
            return false;
        }
        self.acknowledgments.push(Acknowledgment {
            user_id: user_id.to_string(),
            timestamp: now,
            comment,
        });
        true
    }

    /// Mark alert as resolved. Returns false if it already was.
    pub fn resolve(&mut self, user_id: &str, comment: Option<String>, now: SystemTime) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.resolved_at = Some(now);
        self.acknowledgments.push(Acknowledgment {
            user_id: user_id.to_string(),
            timestamp: now,
            comment,
        });
        true
    }

    /// Move to an escalation level, taking that level's severity
    pub fn escalate(&mut self, level: usize, severity: AlertSeverity) {
        self.escalation_level = level;
        self.severity = severity;
    }
}
