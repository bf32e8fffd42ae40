//! Alert notification system
//!
//! Provides notification channels for alerts: terminal, structured log,
//! webhook, email, chat and a null sink. Concrete transports (HTTP, SMTP,
//! chat APIs) belong to the host and plug in through [`Transport`].

use super::types::{Alert, AlertSeverity};
use crate::clock::unix_millis;
use crate::error::DispatchError;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Notification channel trait
pub trait Notifier: Send + Sync {
    /// Send a notification for an alert
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError>;

    /// Channel name for identification
    fn name(&self) -> &str;
}

/// Delivery of a rendered payload to an external system
pub trait Transport: Send + Sync {
    /// Deliver `payload` for `channel` to `target` (URL, address, room)
    fn send(&self, channel: &str, target: &str, payload: &str) -> Result<(), DispatchError>;
}

/// Transport that writes payloads to the log instead of the network
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn send(&self, channel: &str, target: &str, payload: &str) -> Result<(), DispatchError> {
        log::info!("[{}] -> {}: {}", channel, target, payload);
        Ok(())
    }
}

/// Terminal/console notifier
///
/// Outputs alerts to stdout/stderr with colored formatting
pub struct TerminalNotifier {
    /// Channel name, `terminal` unless configured otherwise
    name: String,
    /// Use stderr instead of stdout
    use_stderr: bool,
    /// Use colors (ANSI escape codes)
    use_colors: bool,
}

impl TerminalNotifier {
    /// Create a new terminal notifier
    pub fn new() -> Self {
        Self {
            name: "terminal".to_string(),
            use_stderr: true,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier that uses stdout
    pub fn stdout() -> Self {
        Self {
            name: "terminal".to_string(),
            use_stderr: false,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier without colors
    pub fn no_color() -> Self {
        Self {
            name: "terminal".to_string(),
            use_stderr: true,
            use_colors: false,
        }
    }

    /// Register under a different channel name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn supports_color() -> bool {
        std::env::var("TERM")
            .map(|term| term != "dumb")
            .unwrap_or(false)
    }

    fn format_alert(&self, alert: &Alert) -> String {
        let secs = unix_millis(alert.created_at) / 1000;
        let timestamp = format!(
            "{:02}:{:02}:{:02}",
            (secs / 3600) % 24,
            (secs % 3600) / 60,
            secs % 60
        );

        format!(
            "[{}] {} {} (level {}): {}",
            timestamp,
            self.format_severity(alert.severity),
            alert.title,
            alert.escalation_level,
            alert.message
        )
    }

    fn format_severity(&self, severity: AlertSeverity) -> String {
        if !self.use_colors {
            return format!("{}", severity);
        }

        let color_code = match severity {
            AlertSeverity::Info => "\x1b[36m",          // Cyan
            AlertSeverity::Low => "\x1b[32m",           // Green
            AlertSeverity::Medium => "\x1b[33m",        // Yellow
            AlertSeverity::High => "\x1b[31m",          // Red
            AlertSeverity::Critical => "\x1b[35m\x1b[1m", // Bold Magenta
        };

        format!("{}{}\x1b[0m", color_code, severity)
    }
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError> {
        let message = self.format_alert(alert);

        if self.use_stderr {
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            writeln!(handle, "{}", message)?;
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", message)?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Structured log sink
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn level(severity: AlertSeverity) -> log::Level {
        match severity {
            AlertSeverity::Critical | AlertSeverity::High => log::Level::Error,
            AlertSeverity::Medium => log::Level::Warn,
            AlertSeverity::Low | AlertSeverity::Info => log::Level::Info,
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError> {
        log::log!(
            target: "alertctl::alert",
            Self::level(alert.severity),
            "alert_id={} rule_id={} type={} severity={} level={} title=\"{}\" message=\"{}\"",
            alert.id,
            alert.rule_id,
            alert.alert_type,
            alert.severity,
            alert.escalation_level,
            alert.title,
            alert.message
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Webhook adapter posting a JSON document
pub struct WebhookNotifier {
    name: String,
    url: String,
    transport: Arc<dyn Transport>,
}

impl WebhookNotifier {
    pub fn new(name: impl Into<String>, url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport,
        }
    }

    /// JSON body sent to the webhook
    pub fn payload(alert: &Alert) -> Result<String, DispatchError> {
        let body = json!({
            "id": alert.id,
            "rule_id": alert.rule_id,
            "type": alert.alert_type,
            "severity": alert.severity,
            "title": alert.title,
            "message": alert.message,
            "created_at_ms": unix_millis(alert.created_at) as u64,
            "escalation_level": alert.escalation_level,
            "context": alert.context,
            "actions": alert.actions,
        });
        Ok(serde_json::to_string(&body)?)
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError> {
        let payload = Self::payload(alert)?;
        self.transport.send(&self.name, &self.url, &payload)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Email adapter rendering a subject and plain-text body
pub struct EmailNotifier {
    name: String,
    recipients: Vec<String>,
    transport: Arc<dyn Transport>,
}

impl EmailNotifier {
    pub fn new(name: impl Into<String>, recipients: Vec<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            recipients,
            transport,
        }
    }

    /// Subject line and body
    pub fn render(alert: &Alert) -> (String, String) {
        let subject = format!("[{}] {}", alert.severity, alert.title);
        let mut body = format!(
            "{}\n\nAlert: {}\nRule: {}\nType: {}\nEscalation level: {}\n",
            alert.message, alert.id, alert.rule_id, alert.alert_type, alert.escalation_level
        );
        if !alert.actions.is_empty() {
            body.push_str("\nSuggested actions:\n");
            for action in &alert.actions {
                body.push_str(&format!("  - {}\n", action));
            }
        }
        (subject, body)
    }
}

impl Notifier for EmailNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError> {
        let (subject, body) = Self::render(alert);
        let payload = format!("Subject: {}\n\n{}", subject, body);
        let mut first_error = None;
        for recipient in &self.recipients {
            if let Err(e) = self.transport.send(&self.name, recipient, &payload) {
                log::warn!("Email to {} failed: {}", recipient, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Chat adapter rendering a short markdown message
pub struct ChatNotifier {
    name: String,
    room: String,
    transport: Arc<dyn Transport>,
}

impl ChatNotifier {
    pub fn new(name: impl Into<String>, room: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            room: room.into(),
            transport,
        }
    }

    pub fn render(alert: &Alert) -> String {
        let icon = match alert.severity {
            AlertSeverity::Critical => ":rotating_light:",
            AlertSeverity::High => ":red_circle:",
            AlertSeverity::Medium => ":large_orange_diamond:",
            AlertSeverity::Low | AlertSeverity::Info => ":information_source:",
        };
        format!(
            "{} *{}* `{}`\n{}\n_alert {} / rule {}_",
            icon, alert.title, alert.severity, alert.message, alert.id, alert.rule_id
        )
    }
}

impl Notifier for ChatNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError> {
        self.transport.send(&self.name, &self.room, &Self::render(alert))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sink that drops everything
pub struct NullNotifier {
    name: String,
}

impl NullNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Notifier for NullNotifier {
    fn notify(&self, _alert: &Alert) -> Result<(), DispatchError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

/// A queued fan-out
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub alert: Alert,
    pub channels: Vec<String>,
}

/// Notification manager
///
/// Routes alerts to registered notifiers by channel name. Deliveries are
/// never retried and never propagate failures to the caller.
pub struct NotificationManager {
    notifiers: HashMap<String, Box<dyn Notifier>>,
    delivered: AtomicU64,
    failures: AtomicU64,
}

impl NotificationManager {
    /// Create a new notification manager
    pub fn new() -> Self {
        Self {
            notifiers: HashMap::new(),
            delivered: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Add a notifier, replacing any notifier with the same name
    pub fn add_notifier(&mut self, notifier: Box<dyn Notifier>) {
        let name = notifier.name().to_string();
        if self.notifiers.insert(name.clone(), notifier).is_some() {
            log::warn!("Replacing notifier already registered as '{}'", name);
        }
    }

    /// Deliver an alert to each named channel
    pub fn send(&self, alert: &Alert, channels: &[String]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in channels {
            let Some(notifier) = self.notifiers.get(channel) else {
                log::warn!("Unknown notification channel '{}', skipping", channel);
                report.skipped.push(channel.clone());
                continue;
            };

            let outcome = catch_unwind(AssertUnwindSafe(|| notifier.notify(alert)))
                .unwrap_or_else(|_| Err(DispatchError::Panicked(channel.clone())));

            match outcome {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    report.delivered.push(channel.clone());
                }
                Err(e) => {
                    log::error!("Failed to notify via {} for alert {}: {}", channel, alert.id, e);
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    report.failed.push(channel.clone());
                }
            }
        }

        report
    }

    /// Deliver a queued job
    pub fn dispatch(&self, job: &DispatchJob) -> DispatchReport {
        self.send(&job.alert, &job.channels)
    }

    /// Whether a channel name is registered
    pub fn has_channel(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }

    /// Registered channel names, sorted
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.notifiers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get number of registered notifiers
    pub fn notifier_count(&self) -> usize {
        self.notifiers.len()
    }

    /// Successful deliveries so far
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Failed deliveries so far
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        let mut manager = Self::new();
        manager.add_notifier(Box::new(LogNotifier::new("log")));
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::AlertType;
    use crate::mock::{FailingNotifier, PanickingNotifier, RecordingNotifier, RecordingTransport};
    use std::collections::BTreeMap;
    use std::time::SystemTime;

    fn alert() -> Alert {
        Alert {
            id: "high-error-rate-1".to_string(),
            rule_id: "high-error-rate".to_string(),
            alert_type: AlertType::Error,
            severity: AlertSeverity::Critical,
            title: "High Error Rate".to_string(),
            message: "avg(api.error_rate) over 3m > 5 (observed 7.00)".to_string(),
            created_at: SystemTime::UNIX_EPOCH,
            resolved: false,
            resolved_at: None,
            context: BTreeMap::new(),
            actions: vec!["Check recent deploys".to_string()],
            escalation_level: 0,
            acknowledgments: Vec::new(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_terminal_notifier_creation() {
        let notifier = TerminalNotifier::new();
        assert_eq!(notifier.name(), "terminal");
        assert!(notifier.use_stderr);
        assert!(!TerminalNotifier::stdout().use_stderr);
        assert!(!TerminalNotifier::no_color().use_colors);
        assert_eq!(TerminalNotifier::stdout().with_name("console").name(), "console");
    }

    #[test]
    fn test_format_severity() {
        let notifier = TerminalNotifier::no_color();
        assert_eq!(notifier.format_severity(AlertSeverity::Info), "INFO");
        assert_eq!(notifier.format_severity(AlertSeverity::Medium), "MEDIUM");
        assert_eq!(notifier.format_severity(AlertSeverity::Critical), "CRITICAL");
    }

    #[test]
    fn test_notification_manager_default() {
        let manager = NotificationManager::default();
        assert_eq!(manager.notifier_count(), 1);
        assert!(manager.has_channel("log"));
    }

    #[test]
    fn test_failing_channel_does_not_block_siblings() {
        let recorder = RecordingNotifier::new("chat");
        let mut manager = NotificationManager::new();
        manager.add_notifier(Box::new(FailingNotifier::new("webhook")));
        manager.add_notifier(Box::new(PanickingNotifier::new("email")));
        manager.add_notifier(Box::new(recorder.clone()));

        let report = manager.send(&alert(), &names(&["webhook", "email", "chat"]));

        assert_eq!(report.delivered, names(&["chat"]));
        assert_eq!(report.failed, names(&["webhook", "email"]));
        assert_eq!(recorder.count(), 1);
        assert_eq!(manager.failure_count(), 2);
        assert_eq!(manager.delivered_count(), 1);
    }

    #[test]
    fn test_unknown_channel_is_skipped() {
        let recorder = RecordingNotifier::new("log");
        let mut manager = NotificationManager::new();
        manager.add_notifier(Box::new(recorder.clone()));

        let report = manager.send(&alert(), &names(&["pager", "log"]));
        assert_eq!(report.skipped, names(&["pager"]));
        assert_eq!(report.delivered, names(&["log"]));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_webhook_payload_is_json() {
        let transport = RecordingTransport::new();
        let notifier = WebhookNotifier::new("webhook", "https://hooks.example/alerts", Arc::new(transport.clone()));
        notifier.notify(&alert()).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "https://hooks.example/alerts");
        let body: serde_json::Value = serde_json::from_str(&sent[0].2).unwrap();
        assert_eq!(body["severity"], "critical");
        assert_eq!(body["type"], "error");
        assert_eq!(body["escalation_level"], 0);
    }

    #[test]
    fn test_email_sends_to_each_recipient() {
        let transport = RecordingTransport::new();
        let notifier = EmailNotifier::new(
            "email",
            vec!["ops@example.com".to_string(), "oncall@example.com".to_string()],
            Arc::new(transport.clone()),
        );
        notifier.notify(&alert()).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].2.starts_with("Subject: [CRITICAL] High Error Rate"));
        assert!(sent[0].2.contains("Check recent deploys"));
    }

    #[test]
    fn test_email_failure_does_not_skip_later_recipients() {
        let transport = RecordingTransport::rejecting("ops@example.com");
        let notifier = EmailNotifier::new(
            "email",
            vec![
                "ops@example.com".to_string(),
                "oncall@example.com".to_string(),
                "lead@example.com".to_string(),
            ],
            Arc::new(transport.clone()),
        );

        assert!(notifier.notify(&alert()).is_err());
        let targets: Vec<String> = transport.sent().into_iter().map(|(_, to, _)| to).collect();
        assert_eq!(targets, names(&["oncall@example.com", "lead@example.com"]));
    }

    #[test]
    fn test_chat_render() {
        let text = ChatNotifier::render(&alert());
        assert!(text.contains("*High Error Rate*"));
        assert!(text.contains(":rotating_light:"));
    }

    #[test]
    fn test_null_notifier_accepts_everything() {
        let notifier = NullNotifier::new("null");
        assert!(notifier.notify(&alert()).is_ok());
    }
}
