//! Alert configuration
//!
//! Provides TOML-based configuration for engine settings, rate limits,
//! auto-resolve timeouts, notification channels and alert rules.

use super::notifier::{
    ChatNotifier, EmailNotifier, LogNotifier, NotificationManager, Notifier, NullNotifier,
    TerminalNotifier, Transport, WebhookNotifier,
};
use super::rate_limiter::RateLimits;
use super::types::{
    Aggregation, AlertCondition, AlertRule, AlertSeverity, AlertType, EscalationRule, Operator,
    SuppressionRule,
};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

/// Alert configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Global engine settings
    #[serde(default)]
    pub settings: AlertSettings,
    /// Hourly alert caps per severity
    #[serde(default)]
    pub rate_limits: RateLimits,
    /// Auto-resolve timeouts per alert type
    #[serde(default)]
    pub auto_resolve: AutoResolveTimeouts,
    /// Notification channels
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Alert rules
    #[serde(default)]
    pub rules: Vec<AlertRuleConfig>,
}

impl AlertConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents).map_err(|e| ConfigError::ParseError(format!("{}", e)))?)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::from)?;

        fs::write(path.as_ref(), contents)?;

        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("alertctl").join("alerts.toml")
        } else {
            PathBuf::from("alerts.toml")
        }
    }

    /// Load `path`, or the default location, falling back to baked-in defaults
    pub fn load_or_default(path: Option<&str>) -> Result<(Self, PathBuf)> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);
        if path.exists() {
            log::info!("Loading alert configuration from {}", path.display());
            Ok((Self::load(&path)?, path))
        } else {
            log::info!("No configuration at {}, using defaults", path.display());
            Ok((Self::default(), path))
        }
    }

    /// Create default configuration
    pub fn default_rules() -> Self {
        Self {
            settings: AlertSettings::default(),
            rate_limits: RateLimits::default(),
            auto_resolve: AutoResolveTimeouts::default(),
            channels: vec![
                ChannelConfig::new("log", ChannelKind::Log),
                ChannelConfig::new(
                    "webhook",
                    ChannelKind::Webhook {
                        url: "http://localhost:9093/api/alerts".to_string(),
                    },
                ),
                ChannelConfig::new(
                    "email",
                    ChannelKind::Email {
                        recipients: vec!["oncall@example.com".to_string()],
                    },
                ),
                ChannelConfig::new(
                    "chat",
                    ChannelKind::Chat {
                        room: "#alerts".to_string(),
                    },
                ),
            ],
            rules: vec![
                // API error rate
                AlertRuleConfig {
                    id: "high-error-rate".to_string(),
                    name: "High API Error Rate".to_string(),
                    alert_type: AlertType::Error,
                    severity: AlertSeverity::Critical,
                    enabled: true,
                    cooldown_minutes: Some(10),
                    conditions: vec![ConditionConfig::new(
                        "api.error_rate",
                        Operator::Gt,
                        5.0,
                        3,
                        Aggregation::Avg,
                    )],
                    escalation: vec![
                        EscalationConfig::new(0, 0, &["log", "webhook"], AlertSeverity::Critical),
                        EscalationConfig::new(1, 15, &["email", "chat"], AlertSeverity::Critical),
                    ],
                    suppression: Vec::new(),
                    actions: vec![
                        "Check recent deployments".to_string(),
                        "Inspect API error logs".to_string(),
                    ],
                },
                // API latency
                AlertRuleConfig {
                    id: "slow-api-response".to_string(),
                    name: "Slow API Response Time".to_string(),
                    alert_type: AlertType::Performance,
                    severity: AlertSeverity::High,
                    enabled: true,
                    cooldown_minutes: Some(15),
                    conditions: vec![ConditionConfig::new(
                        "api.response_time",
                        Operator::Gt,
                        2000.0,
                        5,
                        Aggregation::Avg,
                    )],
                    escalation: vec![
                        EscalationConfig::new(0, 0, &["log"], AlertSeverity::High),
                        EscalationConfig::new(1, 30, &["chat"], AlertSeverity::Critical),
                    ],
                    suppression: Vec::new(),
                    actions: vec!["Review slow endpoints".to_string()],
                },
                // Database latency
                AlertRuleConfig {
                    id: "slow-database-queries".to_string(),
                    name: "Slow Database Queries".to_string(),
                    alert_type: AlertType::Performance,
                    severity: AlertSeverity::Medium,
                    enabled: true,
                    cooldown_minutes: None,
                    conditions: vec![ConditionConfig::new(
                        "db.query_duration",
                        Operator::Gt,
                        1000.0,
                        5,
                        Aggregation::Avg,
                    )],
                    escalation: vec![EscalationConfig::new(0, 0, &["log"], AlertSeverity::Medium)],
                    suppression: Vec::new(),
                    actions: vec!["Check query plans and indexes".to_string()],
                },
                // Real-user largest contentful paint, muted during deploys
                AlertRuleConfig {
                    id: "poor-core-web-vitals".to_string(),
                    name: "Poor Core Web Vitals".to_string(),
                    alert_type: AlertType::UserExperience,
                    severity: AlertSeverity::Medium,
                    enabled: true,
                    cooldown_minutes: Some(30),
                    conditions: vec![ConditionConfig::new(
                        "web_vitals.lcp",
                        Operator::Gt,
                        4000.0,
                        10,
                        Aggregation::Avg,
                    )],
                    escalation: vec![EscalationConfig::new(0, 0, &["log"], AlertSeverity::Medium)],
                    suppression: vec![SuppressionConfig {
                        reason: "Deployment in progress".to_string(),
                        duration_minutes: 30,
                        conditions: vec![ConditionConfig::new(
                            "deployment.in_progress",
                            Operator::Eq,
                            1.0,
                            5,
                            Aggregation::Avg,
                        )],
                    }],
                    actions: vec!["Audit page weight and render-blocking assets".to_string()],
                },
                // Health checks
                AlertRuleConfig {
                    id: "health-check-failure".to_string(),
                    name: "Health Check Failures".to_string(),
                    alert_type: AlertType::Availability,
                    severity: AlertSeverity::Critical,
                    enabled: true,
                    cooldown_minutes: Some(5),
                    conditions: vec![ConditionConfig::new(
                        "health.check_failures",
                        Operator::Gte,
                        3.0,
                        5,
                        Aggregation::Sum,
                    )],
                    escalation: vec![
                        EscalationConfig::new(0, 0, &["log", "webhook"], AlertSeverity::Critical),
                        EscalationConfig::new(1, 10, &["email"], AlertSeverity::Critical),
                    ],
                    suppression: Vec::new(),
                    actions: vec!["Check upstream dependencies".to_string()],
                },
                // Security; never auto-resolved
                AlertRuleConfig {
                    id: "security-incident".to_string(),
                    name: "Suspicious Login Activity".to_string(),
                    alert_type: AlertType::Security,
                    severity: AlertSeverity::High,
                    enabled: true,
                    cooldown_minutes: Some(30),
                    conditions: vec![ConditionConfig::new(
                        "security.failed_logins",
                        Operator::Gt,
                        20.0,
                        5,
                        Aggregation::Sum,
                    )],
                    escalation: vec![
                        EscalationConfig::new(0, 0, &["log", "email"], AlertSeverity::High),
                        EscalationConfig::new(1, 15, &["chat", "webhook"], AlertSeverity::Critical),
                    ],
                    suppression: Vec::new(),
                    actions: vec!["Review authentication logs".to_string()],
                },
                // Business KPI, opt-in
                AlertRuleConfig {
                    id: "low-signup-rate".to_string(),
                    name: "Low Signup Rate".to_string(),
                    alert_type: AlertType::Business,
                    severity: AlertSeverity::Low,
                    enabled: false,
                    cooldown_minutes: None,
                    conditions: vec![ConditionConfig::new(
                        "business.signups",
                        Operator::Lt,
                        1.0,
                        60,
                        Aggregation::Sum,
                    )],
                    escalation: vec![EscalationConfig::new(0, 0, &["log"], AlertSeverity::Low)],
                    suppression: Vec::new(),
                    actions: Vec::new(),
                },
            ],
        }
    }

    /// Convert to alert rules (disabled rules included, flagged disabled)
    pub fn to_alert_rules(&self) -> Result<Vec<AlertRule>> {
        self.rules.iter().map(|r| r.to_alert_rule()).collect()
    }

    /// Validate the whole file. Returns non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "rules.id".to_string(),
                    message: format!("duplicate rule id '{}'", rule.id),
                }
                .into());
            }
        }

        let mut channel_names = HashSet::new();
        for channel in &self.channels {
            if !channel_names.insert(channel.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "channels.name".to_string(),
                    message: format!("duplicate channel name '{}'", channel.name),
                }
                .into());
            }
        }

        for rule in self.to_alert_rules()? {
            for step in &rule.escalation_rules {
                for channel in &step.channels {
                    if !channel_names.contains(channel.as_str()) {
                        warnings.push(format!(
                            "rule '{}' level {} references unknown channel '{}'",
                            rule.id, step.level, channel
                        ));
                    }
                }
            }
        }

        if self.settings.evaluation_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "settings.evaluation_interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(warnings)
    }

    /// Build the notifiers declared in `[[channels]]`
    pub fn build_notifiers(&self, transport: Arc<dyn Transport>) -> NotificationManager {
        let mut manager = NotificationManager::new();
        for channel in &self.channels {
            manager.add_notifier(channel.build(transport.clone()));
        }
        manager
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self::default_rules()
    }
}

/// Global alert settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Whether alerting is enabled globally
    pub enabled: bool,
    /// Rule evaluation interval in seconds
    pub evaluation_interval_secs: u64,
    /// Auto-resolve sweep interval in seconds
    pub auto_resolve_interval_secs: u64,
    /// Cleanup sweep interval in seconds
    pub cleanup_interval_secs: u64,
    /// Resolution of the delayed-task scheduler in milliseconds
    pub scheduler_tick_millis: u64,
    /// Samples older than this are ignored by evaluation
    pub metric_horizon_minutes: u64,
    /// Samples older than this are evicted by cleanup
    pub metric_retention_minutes: u64,
    /// Resolved alerts older than this are deleted by cleanup
    pub resolved_retention_hours: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            evaluation_interval_secs: 30,
            auto_resolve_interval_secs: 60,
            cleanup_interval_secs: 300,
            scheduler_tick_millis: 1000,
            metric_horizon_minutes: 60,
            metric_retention_minutes: 120,
            resolved_retention_hours: 24,
        }
    }
}

/// Auto-resolve timeouts in minutes; 0 means never
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoResolveTimeouts {
    pub performance: u64,
    pub error: u64,
    pub availability: u64,
    pub security: u64,
    pub user_experience: u64,
    pub business: u64,
}

impl AutoResolveTimeouts {
    /// Timeout for a type, `None` when the type never auto-resolves
    pub fn timeout(&self, alert_type: AlertType) -> Option<Duration> {
        let mins = match alert_type {
            AlertType::Performance => self.performance,
            AlertType::Error => self.error,
            AlertType::Availability => self.availability,
            AlertType::Security => self.security,
            AlertType::UserExperience => self.user_experience,
            AlertType::Business => self.business,
        };
        (mins > 0).then(|| minutes(mins))
    }
}

impl Default for AutoResolveTimeouts {
    fn default() -> Self {
        Self {
            performance: 30,
            error: 60,
            availability: 15,
            security: 0,
            user_experience: 120,
            business: 240,
        }
    }
}

/// Notification channel declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Name referenced by escalation levels
    pub name: String,
    #[serde(flatten)]
    pub kind: ChannelKind,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    fn build(&self, transport: Arc<dyn Transport>) -> Box<dyn Notifier> {
        match &self.kind {
            ChannelKind::Log => Box::new(LogNotifier::new(&self.name)),
            ChannelKind::Terminal => Box::new(TerminalNotifier::new().with_name(&self.name)),
            ChannelKind::Webhook { url } => {
                Box::new(WebhookNotifier::new(&self.name, url, transport))
            }
            ChannelKind::Email { recipients } => {
                Box::new(EmailNotifier::new(&self.name, recipients.clone(), transport))
            }
            ChannelKind::Chat { room } => Box::new(ChatNotifier::new(&self.name, room, transport)),
            ChannelKind::Null => Box::new(NullNotifier::new(&self.name)),
        }
    }
}

/// Channel adapter kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelKind {
    Log,
    /// Colored console output on stderr
    Terminal,
    Webhook { url: String },
    Email { recipients: Vec<String> },
    Chat { room: String },
    Null,
}

/// Alert rule configuration (TOML-friendly format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    /// Rule identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Alert category
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Initial severity
    pub severity: AlertSeverity,
    /// Whether rule is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cooldown in minutes; severity default when absent
    #[serde(default)]
    pub cooldown_minutes: Option<u64>,
    /// Firing conditions, AND-combined
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,
    /// Escalation ladder
    #[serde(default)]
    pub escalation: Vec<EscalationConfig>,
    /// Suppression guards
    #[serde(default)]
    pub suppression: Vec<SuppressionConfig>,
    /// Remediation hints
    #[serde(default)]
    pub actions: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl AlertRuleConfig {
    /// Convert to a validated AlertRule
    pub fn to_alert_rule(&self) -> Result<AlertRule> {
        let mut escalation: Vec<EscalationRule> =
            self.escalation.iter().map(|e| e.to_escalation_rule()).collect();
        escalation.sort_by_key(|e| e.level);

        let rule = AlertRule {
            id: self.id.clone(),
            name: self.name.clone(),
            alert_type: self.alert_type,
            enabled: self.enabled,
            conditions: self.conditions.iter().map(|c| c.to_condition()).collect(),
            severity: self.severity,
            cooldown: self.cooldown_minutes.map(minutes),
            escalation_rules: escalation,
            suppression_rules: self
                .suppression
                .iter()
                .map(|s| s.to_suppression_rule())
                .collect(),
            actions: self.actions.clone(),
        };

        rule.validate()?;
        Ok(rule)
    }
}

/// Condition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    /// Observation window in minutes
    pub window_minutes: u64,
    pub aggregation: Aggregation,
}

impl ConditionConfig {
    pub fn new(
        metric: &str,
        operator: Operator,
        threshold: f64,
        window_minutes: u64,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            metric: metric.to_string(),
            operator,
            threshold,
            window_minutes,
            aggregation,
        }
    }

    fn to_condition(&self) -> AlertCondition {
        AlertCondition::new(
            self.metric.clone(),
            self.operator,
            self.threshold,
            minutes(self.window_minutes),
            self.aggregation,
        )
    }
}

/// Escalation level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    pub level: u32,
    #[serde(default)]
    pub delay_minutes: u64,
    pub channels: Vec<String>,
    pub severity: AlertSeverity,
}

impl EscalationConfig {
    pub fn new(level: u32, delay_minutes: u64, channels: &[&str], severity: AlertSeverity) -> Self {
        Self {
            level,
            delay_minutes,
            channels: channels.iter().map(|c| c.to_string()).collect(),
            severity,
        }
    }

    fn to_escalation_rule(&self) -> EscalationRule {
        EscalationRule::new(
            self.level,
            minutes(self.delay_minutes),
            self.channels.clone(),
            self.severity,
        )
    }
}

/// Suppression guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionConfig {
    pub reason: String,
    #[serde(default)]
    pub duration_minutes: u64,
    pub conditions: Vec<ConditionConfig>,
}

impl SuppressionConfig {
    fn to_suppression_rule(&self) -> SuppressionRule {
        SuppressionRule {
            conditions: self.conditions.iter().map(|c| c.to_condition()).collect(),
            duration: minutes(self.duration_minutes),
            reason: self.reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::mock::RecordingTransport;

    const MINIMAL: &str = r#"
[settings]
evaluation_interval_secs = 10

[rate_limits]
info = 1

[[channels]]
name = "ops"
kind = "webhook"
url = "https://hooks.example/ops"

[[rules]]
id = "cpu-hot"
name = "CPU Hot"
type = "performance"
severity = "high"
cooldown_minutes = 5

[[rules.conditions]]
metric = "host.cpu"
operator = "gte"
threshold = 90.0
window_minutes = 2
aggregation = "max"

[[rules.escalation]]
level = 0
channels = ["ops"]
severity = "high"
"#;

    #[test]
    fn test_default_config() {
        let config = AlertConfig::default();
        assert!(config.settings.enabled);
        assert_eq!(config.settings.evaluation_interval_secs, 30);
        assert_eq!(config.settings.auto_resolve_interval_secs, 60);
        assert_eq!(config.settings.cleanup_interval_secs, 300);
        assert!(!config.rules.is_empty());
    }

    #[test]
    fn test_default_rules_validate() {
        let config = AlertConfig::default();
        let warnings = config.validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
        let rules = config.to_alert_rules().unwrap();
        assert_eq!(rules.len(), config.rules.len());
        assert!(rules.iter().any(|r| !r.enabled));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = AlertConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.settings.evaluation_interval_secs, 10);
        // Unset fields keep their defaults
        assert_eq!(config.settings.cleanup_interval_secs, 300);
        assert_eq!(config.rate_limits.info, 1);
        assert_eq!(config.rate_limits.critical, 10);
        assert_eq!(
            config.channels[0].kind,
            ChannelKind::Webhook {
                url: "https://hooks.example/ops".to_string()
            }
        );

        let rules = config.to_alert_rules().unwrap();
        assert_eq!(rules[0].id, "cpu-hot");
        assert_eq!(rules[0].alert_type, AlertType::Performance);
        assert_eq!(rules[0].cooldown, Some(Duration::from_secs(300)));
        assert_eq!(rules[0].conditions[0].duration, Duration::from_secs(120));
        assert_eq!(rules[0].conditions[0].aggregation, Aggregation::Max);
    }

    #[test]
    fn test_rule_without_escalation_is_rejected() {
        let mut config = AlertConfig::parse(MINIMAL).unwrap();
        config.rules[0].escalation.clear();
        assert!(matches!(
            config.to_alert_rules(),
            Err(AppError::Config(ConfigError::InvalidRule { .. }))
        ));
    }

    #[test]
    fn test_duplicate_rule_ids_rejected() {
        let mut config = AlertConfig::parse(MINIMAL).unwrap();
        config.rules.push(config.rules[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_channel_is_a_warning() {
        let mut config = AlertConfig::parse(MINIMAL).unwrap();
        config.rules[0].escalation[0].channels.push("pager".to_string());
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("pager"));
    }

    #[test]
    fn test_terminal_channel_uses_configured_name() {
        let mut config = AlertConfig::parse(MINIMAL).unwrap();
        config
            .channels
            .push(ChannelConfig::new("console", ChannelKind::Terminal));
        config.rules[0].escalation[0].channels = vec!["console".to_string()];
        assert!(config.validate().unwrap().is_empty());

        let manager = config.build_notifiers(Arc::new(RecordingTransport::new()));
        assert!(manager.has_channel("console"));
        assert!(!manager.has_channel("terminal"));
    }

    #[test]
    fn test_auto_resolve_timeouts() {
        let timeouts = AutoResolveTimeouts::default();
        assert_eq!(timeouts.timeout(AlertType::Security), None);
        assert_eq!(
            timeouts.timeout(AlertType::Performance),
            Some(Duration::from_secs(30 * 60))
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.toml");

        let config = AlertConfig::default();
        config.save(&path).unwrap();
        let loaded = AlertConfig::load(&path).unwrap();

        assert_eq!(loaded.rules.len(), config.rules.len());
        assert_eq!(loaded.channels.len(), config.channels.len());
        assert_eq!(loaded.rules[3].suppression.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AlertConfig::load("/nonexistent/path/alerts.toml");
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_build_notifiers() {
        let config = AlertConfig::default();
        let manager = config.build_notifiers(Arc::new(RecordingTransport::new()));
        assert_eq!(
            manager.channel_names(),
            vec!["chat", "email", "log", "webhook"]
        );
    }
}
