//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::alerts::{Alert, AlertRule, EngineStats, EngineStatus};
use crate::cli::args::OutputFormat;
use crate::clock::unix_millis;
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

/// Rule entry for display
#[derive(Debug, Clone, Serialize)]
pub struct RuleEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: String,
    pub enabled: bool,
    pub conditions: Vec<String>,
    pub cooldown_minutes: u64,
    pub escalation_levels: usize,
    pub suppressions: Vec<String>,
}

impl From<&AlertRule> for RuleEntry {
    fn from(rule: &AlertRule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            alert_type: rule.alert_type.to_string(),
            severity: rule.severity.to_string(),
            enabled: rule.enabled,
            conditions: rule.conditions.iter().map(|c| c.to_string()).collect(),
            cooldown_minutes: rule.effective_cooldown().as_secs() / 60,
            escalation_levels: rule.escalation_rules.len(),
            suppressions: rule
                .suppression_rules
                .iter()
                .map(|s| s.reason.clone())
                .collect(),
        }
    }
}

impl TableDisplay for RuleEntry {
    fn to_table(&self) -> String {
        let status = if self.enabled { "✓" } else { "✗" };
        let mut output = format!(
            "{} [{}] {} ({}, {})\n",
            status, self.severity, self.name, self.id, self.alert_type
        );
        for condition in &self.conditions {
            output.push_str(&format!("   When: {}\n", condition));
        }
        output.push_str(&format!(
            "   Cooldown: {}m, escalation levels: {}\n",
            self.cooldown_minutes, self.escalation_levels
        ));
        for reason in &self.suppressions {
            output.push_str(&format!("   Suppressed while: {}\n", reason));
        }
        output
    }

    fn to_compact(&self) -> String {
        format!("{}:{}", self.id, if self.enabled { "on" } else { "off" })
    }
}

/// Rule list for display
#[derive(Debug, Clone, Serialize)]
pub struct RuleList {
    pub source: String,
    pub rules: Vec<RuleEntry>,
}

impl TableDisplay for RuleList {
    fn to_table(&self) -> String {
        let mut output = format!("Alert Rules ({})\n", self.source);
        output.push_str(&format!("{:-<80}\n", ""));
        for rule in &self.rules {
            output.push_str(&rule.to_table());
            output.push('\n');
        }
        output.push_str(&format!("{:-<80}\n", ""));
        output.push_str(&format!(
            "Total rules: {} ({} enabled)",
            self.rules.len(),
            self.rules.iter().filter(|r| r.enabled).count()
        ));
        output
    }

    fn to_compact(&self) -> String {
        self.rules
            .iter()
            .map(|r| r.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Alert entry for display
#[derive(Debug, Clone, Serialize)]
pub struct AlertEntry {
    pub id: String,
    pub rule_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    pub created_at_ms: u128,
    pub resolved_at_ms: Option<u128>,
    pub status: String,
    pub escalation_level: usize,
    pub acknowledged_by: Vec<String>,
}

impl From<&Alert> for AlertEntry {
    fn from(alert: &Alert) -> Self {
        let status = if alert.resolved {
            "resolved"
        } else if alert.is_acknowledged() {
            "acknowledged"
        } else {
            "active"
        };

        Self {
            id: alert.id.clone(),
            rule_id: alert.rule_id.clone(),
            alert_type: alert.alert_type.to_string(),
            severity: alert.severity.to_string(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            created_at_ms: unix_millis(alert.created_at),
            resolved_at_ms: alert.resolved_at.map(unix_millis),
            status: status.to_string(),
            escalation_level: alert.escalation_level,
            acknowledged_by: alert
                .acknowledgments
                .iter()
                .map(|a| a.user_id.clone())
                .collect(),
        }
    }
}

impl TableDisplay for AlertEntry {
    fn to_table(&self) -> String {
        let mut output = format!(
            "[{}] {} - {} ({})\n",
            self.severity, self.title, self.status, self.id
        );
        output.push_str(&format!("   {}\n", self.message));
        output.push_str(&format!(
            "   Level: {}, created: {}ms",
            self.escalation_level, self.created_at_ms
        ));
        if let Some(resolved) = self.resolved_at_ms {
            output.push_str(&format!(", resolved: {}ms", resolved));
        }
        if !self.acknowledged_by.is_empty() {
            output.push_str(&format!(", by: {}", self.acknowledged_by.join(", ")));
        }
        output
    }

    fn to_compact(&self) -> String {
        format!("{}:{}:{}", self.id, self.severity, self.status)
    }
}

/// Alert list for display
#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
    pub alerts: Vec<AlertEntry>,
}

impl AlertList {
    pub fn new(alerts: &[Alert]) -> Self {
        Self {
            alerts: alerts.iter().map(AlertEntry::from).collect(),
        }
    }
}

impl TableDisplay for AlertList {
    fn to_table(&self) -> String {
        if self.alerts.is_empty() {
            return "No alerts".to_string();
        }
        self.alerts
            .iter()
            .map(|a| a.to_table())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn to_compact(&self) -> String {
        self.alerts
            .iter()
            .map(|a| a.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Engine status and counters
#[derive(Debug, Clone, Serialize)]
pub struct EngineSummary {
    pub status: EngineStatus,
    pub stats: EngineStats,
}

impl TableDisplay for EngineSummary {
    fn to_table(&self) -> String {
        let s = &self.status;
        let c = &self.stats;
        format!(
            "Engine: {} | rules: {} ({} enabled) | active alerts: {} | metrics: {}\n\
             Created: {} | escalations: {} | auto-resolved: {}\n\
             Dropped: {} cooled down, {} suppressed, {} rate limited\n\
             Notifications: {} delivered, {} failed",
            if s.enabled { "enabled" } else { "disabled" },
            s.total_rules,
            s.enabled_rules,
            s.active_alerts,
            s.metrics_tracked,
            c.alerts_created,
            c.escalations,
            c.auto_resolved,
            c.cooled_down,
            c.suppressed,
            c.rate_limited,
            c.notifications_delivered,
            c.notification_failures,
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "active={} created={} dropped={}",
            self.status.active_alerts,
            self.stats.alerts_created,
            self.stats.cooled_down + self.stats.suppressed + self.stats.rate_limited
        )
    }
}

/// Result of a replay run
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub samples: usize,
    pub alerts: AlertList,
    pub summary: EngineSummary,
}

impl TableDisplay for ReplayReport {
    fn to_table(&self) -> String {
        format!(
            "Replayed {} samples\n\n{}\n\n{}",
            self.samples,
            self.alerts.to_table(),
            self.summary.to_table()
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "samples={} {} [{}]",
            self.samples,
            self.summary.to_compact(),
            self.alerts.to_compact()
        )
    }
}

/// Result of configuration validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub rules: usize,
    pub enabled_rules: usize,
    pub channels: Vec<String>,
    pub warnings: Vec<String>,
}

impl TableDisplay for ValidationReport {
    fn to_table(&self) -> String {
        let mut output = format!("✓ Configuration is valid ({})\n", self.source);
        output.push_str(&format!(
            "✓ {} rules ({} enabled)\n",
            self.rules, self.enabled_rules
        ));
        output.push_str(&format!("✓ Channels: {}", self.channels.join(", ")));
        for warning in &self.warnings {
            output.push_str(&format!("\n! {}", warning));
        }
        output
    }

    fn to_compact(&self) -> String {
        format!(
            "valid rules={} warnings={}",
            self.rules,
            self.warnings.len()
        )
    }
}
