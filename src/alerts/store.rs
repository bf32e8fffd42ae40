//! In-memory alert registry

use super::types::Alert;
use crate::error::AlertError;
use std::collections::HashMap;
use std::time::SystemTime;

/// Which alerts a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFilter {
    /// Unresolved only
    Active,
    /// Everything still held
    All,
}

/// Alert records keyed by id
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: HashMap<String, Alert>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new alert
    pub fn create(&mut self, alert: Alert) {
        log::debug!("Registering alert {} from rule {}", alert.id, alert.rule_id);
        self.alerts.insert(alert.id.clone(), alert);
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Alert> {
        self.alerts.get_mut(id)
    }

    /// Alerts matching `filter`, newest first
    pub fn list(&self, filter: AlertFilter) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .values()
            .filter(|a| filter == AlertFilter::All || a.is_active())
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        alerts
    }

    /// Append an acknowledgment. `Ok(false)` when the alert is already resolved.
    pub fn acknowledge(
        &mut self,
        id: &str,
        user_id: &str,
        comment: Option<String>,
        now: SystemTime,
    ) -> Result<bool, AlertError> {
        let alert = self
            .alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        Ok(alert.acknowledge(user_id, comment, now))
    }

    /// Resolve an alert. `Ok(false)` when it already was.
    pub fn resolve(
        &mut self,
        id: &str,
        user_id: &str,
        comment: Option<String>,
        now: SystemTime,
    ) -> Result<bool, AlertError> {
        let alert = self
            .alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        Ok(alert.resolve(user_id, comment, now))
    }

    /// Ids of unresolved alerts
    pub fn active_ids(&self) -> Vec<String> {
        self.alerts
            .values()
            .filter(|a| a.is_active())
            .map(|a| a.id.clone())
            .collect()
    }

    /// Delete resolved alerts whose resolution predates `cutoff`
    pub fn purge_resolved_before(&mut self, cutoff: SystemTime) -> usize {
        let before = self.alerts.len();
        self.alerts
            .retain(|_, a| !matches!(a.resolved_at, Some(at) if a.resolved && at < cutoff));
        before - self.alerts.len()
    }

    pub fn active_count(&self) -> usize {
        self.alerts.values().filter(|a| a.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::{AlertSeverity, AlertType};
    use std::collections::BTreeMap;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn alert(id: &str, created: u64) -> Alert {
        Alert {
            id: id.to_string(),
            rule_id: "rule".to_string(),
            alert_type: AlertType::Performance,
            severity: AlertSeverity::Medium,
            title: "Slow".to_string(),
            message: "slow".to_string(),
            created_at: at(created),
            resolved: false,
            resolved_at: None,
            context: BTreeMap::new(),
            actions: Vec::new(),
            escalation_level: 0,
            acknowledgments: Vec::new(),
        }
    }

    #[test]
    fn test_list_filters_and_orders() {
        let mut store = AlertStore::new();
        store.create(alert("a", 10));
        store.create(alert("b", 20));
        store.create(alert("c", 30));
        store.resolve("b", "alice", None, at(40)).unwrap();

        let active: Vec<String> = store.list(AlertFilter::Active).into_iter().map(|a| a.id).collect();
        assert_eq!(active, vec!["c", "a"]);
        assert_eq!(store.list(AlertFilter::All).len(), 3);
        assert_eq!(store.active_count(), 2);
    }

    #[test]
    fn test_resolve_twice_keeps_first_timestamp() {
        let mut store = AlertStore::new();
        store.create(alert("a", 10));

        assert_eq!(store.resolve("a", "alice", Some("done".to_string()), at(20)), Ok(true));
        assert_eq!(store.resolve("a", "bob", None, at(30)), Ok(false));

        let a = store.get("a").unwrap();
        assert_eq!(a.resolved_at, Some(at(20)));
        assert_eq!(a.acknowledgments.len(), 1);
        assert_eq!(a.acknowledgments[0].comment.as_deref(), Some("done"));
    }

    #[test]
    fn test_acknowledge_after_resolve_is_noop() {
        let mut store = AlertStore::new();
        store.create(alert("a", 10));
        store.resolve("a", "alice", None, at(20)).unwrap();
        assert_eq!(store.acknowledge("a", "bob", None, at(30)), Ok(false));
        assert_eq!(store.get("a").unwrap().acknowledgments.len(), 1);
    }

    #[test]
    fn test_unknown_alert() {
        let mut store = AlertStore::new();
        assert_eq!(
            store.acknowledge("missing", "alice", None, at(0)),
            Err(AlertError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_purge_only_old_resolved() {
        let mut store = AlertStore::new();
        store.create(alert("old", 0));
        store.create(alert("recent", 0));
        store.create(alert("open", 0));
        store.resolve("old", "system", None, at(100)).unwrap();
        store.resolve("recent", "system", None, at(5_000)).unwrap();

        assert_eq!(store.purge_resolved_before(at(1_000)), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("recent").is_some());
        assert!(store.get("open").is_some());
    }
}
