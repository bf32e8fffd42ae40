//! One-shot delayed task queue
//!
//! A min-heap of `(fire_at, task_id)` with the task payloads kept beside it
//! so pending tasks can be cancelled. Cancelled ids are skipped when the
//! heap is drained.

use super::types::{AlertSeverity, AlertType, EscalationRule};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

/// Identifier of a scheduled task
pub type TaskId = u64;

/// Work the engine defers
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledTask {
    /// Move an alert to `level` of its escalation ladder
    Escalate {
        alert_id: String,
        level: usize,
        /// Ladder captured when the alert was created
        plan: Arc<[EscalationRule]>,
    },
    /// Undo one rate-limit increment
    RateDecay {
        alert_type: AlertType,
        severity: AlertSeverity,
    },
}

impl ScheduledTask {
    /// Alert this task belongs to, if any
    pub fn alert_id(&self) -> Option<&str> {
        match self {
            Self::Escalate { alert_id, .. } => Some(alert_id),
            Self::RateDecay { .. } => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    fire_at: SystemTime,
    id: TaskId,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior; ties fire in schedule order
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Cancellable delayed task queue
#[derive(Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<HeapEntry>,
    tasks: HashMap<TaskId, T>,
    next_id: TaskId,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            tasks: HashMap::new(),
            next_id: 1,
        }
    }

    /// Queue `task` to fire at `fire_at`
    pub fn schedule(&mut self, fire_at: SystemTime, task: T) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(HeapEntry { fire_at, id });
        self.tasks.insert(id, task);
        id
    }

    /// Cancel one task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Cancel every pending task matching `predicate`
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| !predicate(task));
        before - self.tasks.len()
    }

    /// Remove and return every task due at or before `now`, in firing order
    pub fn drain_due(&mut self, now: SystemTime) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.fire_at > now {
                break;
            }
            let id = entry.id;
            self.heap.pop();
            if let Some(task) = self.tasks.remove(&id) {
                due.push(task);
            }
        }
        due
    }

    /// Fire time of the earliest live task
    pub fn next_due(&mut self) -> Option<SystemTime> {
        while let Some(entry) = self.heap.peek() {
            if self.tasks.contains_key(&entry.id) {
                return Some(entry.fire_at);
            }
            // Lazily discard cancelled entries
            self.heap.pop();
        }
        None
    }

    /// Number of live tasks
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_drain_due_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(30), "c");
        scheduler.schedule(at(10), "a");
        scheduler.schedule(at(20), "b");
        scheduler.schedule(at(99), "later");

        assert_eq!(scheduler.drain_due(at(30)), vec!["a", "b", "c"]);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_due(), Some(at(99)));
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(at(10), 1);
        scheduler.schedule(at(10), 2);
        scheduler.schedule(at(10), 3);
        assert_eq!(scheduler.drain_due(at(10)), vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_skips_task() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(at(10), "a");
        scheduler.schedule(at(20), "b");

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert_eq!(scheduler.next_due(), Some(at(20)));
        assert_eq!(scheduler.drain_due(at(100)), vec!["b"]);
    }

    #[test]
    fn test_cancel_where_by_alert() {
        let plan: Arc<[EscalationRule]> = Arc::from(Vec::new());
        let mut scheduler = Scheduler::new();
        scheduler.schedule(
            at(10),
            ScheduledTask::Escalate {
                alert_id: "a1".to_string(),
                level: 1,
                plan: plan.clone(),
            },
        );
        scheduler.schedule(
            at(10),
            ScheduledTask::RateDecay {
                alert_type: AlertType::Error,
                severity: AlertSeverity::Info,
            },
        );

        let cancelled = scheduler.cancel_where(|t| t.alert_id() == Some("a1"));
        assert_eq!(cancelled, 1);
        let due = scheduler.drain_due(at(10));
        assert_eq!(due.len(), 1);
        assert!(matches!(due[0], ScheduledTask::RateDecay { .. }));
    }
}
