//! Mock implementations for testing
//!
//! Provides notifier and transport doubles that record, fail or panic, so
//! dispatch and engine behavior can be asserted without real sinks.

use crate::alerts::{Alert, Notifier, Transport};
use crate::error::DispatchError;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Notifier that records every alert it receives
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    name: String,
    received: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of received alerts, in delivery order
    pub fn received(&self) -> Vec<Alert> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of deliveries
    pub fn count(&self) -> usize {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: &Alert) -> Result<(), DispatchError> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Notifier that always reports an error
#[derive(Debug, Clone)]
pub struct FailingNotifier {
    name: String,
}

impl FailingNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Notifier for FailingNotifier {
    fn notify(&self, _alert: &Alert) -> Result<(), DispatchError> {
        Err(DispatchError::Channel {
            channel: self.name.clone(),
            message: "simulated outage".to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Notifier that panics on delivery
#[derive(Debug, Clone)]
pub struct PanickingNotifier {
    name: String,
}

impl PanickingNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Notifier for PanickingNotifier {
    fn notify(&self, _alert: &Alert) -> Result<(), DispatchError> {
        panic!("notifier '{}' blew up", self.name);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Notifier whose deliveries block until [`BlockingNotifier::release`]
#[derive(Debug, Clone)]
pub struct BlockingNotifier {
    name: String,
    gate: Arc<(Mutex<bool>, Condvar)>,
    entered: Arc<AtomicUsize>,
}

impl BlockingNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gate: Arc::new((Mutex::new(false), Condvar::new())),
            entered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Unblock current and future deliveries
    pub fn release(&self) {
        let (open, signal) = &*self.gate;
        *open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }

    /// Deliveries that have started
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

impl Notifier for BlockingNotifier {
    fn notify(&self, _alert: &Alert) -> Result<(), DispatchError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let (open, signal) = &*self.gate;
        let mut released = open.lock().unwrap_or_else(PoisonError::into_inner);
        while !*released {
            released = signal.wait(released).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Transport that records `(channel, target, payload)` triples
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
    rejected_target: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send addressed to `target`; others are recorded
    pub fn rejecting(target: impl Into<String>) -> Self {
        Self {
            rejected_target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, channel: &str, target: &str, payload: &str) -> Result<(), DispatchError> {
        if self.rejected_target.as_deref() == Some(target) {
            return Err(DispatchError::Channel {
                channel: channel.to_string(),
                message: format!("{} unreachable", target),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel.to_string(), target.to_string(), payload.to_string()));
        Ok(())
    }
}
