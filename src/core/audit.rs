//! Audit sink implementations.
//!
//! The attempt table records one event per lifecycle step when a sink is
//! attached.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::now_ms;

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingAuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Application being staged.
    pub app_guid: String,
    /// Staging attempt identifier.
    pub task_id: String,
    /// Backend label.
    pub backend: String,
    /// Action taken (dispatch, succeeded, failed, timed_out, abandoned, discard).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: StagingAuditEvent);
}

/// In-memory audit sink for testing and dev.
///
/// Clones share the same buffer, so a test can keep one handle and give the
/// other to the attempt table.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<StagingAuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<StagingAuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events with the given action.
    #[must_use]
    pub fn events_with_action(&self, action: &str) -> Vec<StagingAuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: StagingAuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    event_id: impl Into<String>,
    app_guid: impl Into<String>,
    task_id: impl Into<String>,
    backend: impl Into<String>,
    action: impl Into<String>,
    detail: Option<String>,
) -> StagingAuditEvent {
    StagingAuditEvent {
        event_id: event_id.into(),
        app_guid: app_guid.into(),
        task_id: task_id.into(),
        backend: backend.into(),
        action: action.into(),
        created_at_ms: now_ms(),
        detail,
    }
}
