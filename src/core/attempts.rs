//! Pending-attempt table.
//!
//! Tracks one staging attempt per application from dispatch to a terminal
//! state. Completions and timeout timers both resolve through
//! [`AttemptTable::resolve`], which applies the transition and cancels the
//! timer under a single lock. Whichever arrives first wins; the loser is
//! discarded.
//!
//! Only in-flight attempts stay in the table. A resolved attempt moves to a
//! bounded history that answers duplicate and late completions until it is
//! evicted.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::core::application::AppGuid;
use crate::core::audit::{build_audit_event, AuditSink};
use crate::core::backend::Backend;
use crate::core::error::DispatchError;
use crate::core::outcome::StagingTaskId;
use crate::core::spawn::Spawn;
use crate::util::clock::now_ms;

/// Resolved attempts remembered by default.
pub const DEFAULT_RESOLVED_HISTORY: usize = 1024;

/// Lifecycle state of a staging attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// Request published, waiting for a completion.
    Dispatched,
    /// Backend reported a successful build.
    Succeeded,
    /// Backend reported a failure or sent an undecodable completion.
    Failed,
    /// No completion arrived in time.
    TimedOut,
}

impl AttemptState {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Dispatched)
    }
}

/// Terminal states an attempt can be resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// See [`AttemptState::Succeeded`].
    Succeeded,
    /// See [`AttemptState::Failed`].
    Failed,
    /// See [`AttemptState::TimedOut`].
    TimedOut,
}

impl From<Terminal> for AttemptState {
    fn from(t: Terminal) -> Self {
        match t {
            Terminal::Succeeded => Self::Succeeded,
            Terminal::Failed => Self::Failed,
            Terminal::TimedOut => Self::TimedOut,
        }
    }
}

/// Why a resolution was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No attempt is known for the application.
    UnknownAttempt,
    /// The message belongs to an older attempt.
    StaleTask {
        /// Attempt currently tracked for the app.
        outstanding: StagingTaskId,
    },
    /// The attempt was dispatched to a different backend.
    BackendMismatch {
        /// Backend the attempt was dispatched to.
        expected: Backend,
    },
    /// The attempt already reached a terminal state.
    AlreadyResolved(AttemptState),
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAttempt => f.write_str("no outstanding attempt"),
            Self::StaleTask { outstanding } => write!(f, "stale task, outstanding is {outstanding}"),
            Self::BackendMismatch { expected } => write!(f, "attempt belongs to {expected}"),
            Self::AlreadyResolved(state) => write!(f, "already resolved as {state:?}"),
        }
    }
}

/// Result of [`AttemptTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The transition happened; the caller owns downstream delivery.
    Applied,
    /// Nothing changed.
    Discarded(DiscardReason),
}

/// Read-only view of a tracked attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptSnapshot {
    /// Attempt identifier.
    pub task_id: StagingTaskId,
    /// Backend the request went to.
    pub backend: Backend,
    /// Current state.
    pub state: AttemptState,
    /// Dispatch time (ms since epoch).
    pub dispatched_at_ms: u128,
    /// Timeout deadline (ms since epoch).
    pub deadline_ms: u128,
}

struct Attempt {
    task_id: StagingTaskId,
    backend: Backend,
    dispatched_at_ms: u128,
    deadline_ms: u128,
    cancel_timer: Option<oneshot::Sender<()>>,
}

impl Attempt {
    fn cancel_timer(&mut self) {
        if let Some(cancel) = self.cancel_timer.take() {
            // The timer may already have fired and dropped its receiver.
            let _ = cancel.send(());
        }
    }
}

struct ResolvedAttempt {
    app_guid: AppGuid,
    task_id: StagingTaskId,
    backend: Backend,
    state: AttemptState,
    dispatched_at_ms: u128,
    deadline_ms: u128,
}

#[derive(Default)]
struct Attempts {
    in_flight: HashMap<AppGuid, Attempt>,
    resolved: VecDeque<ResolvedAttempt>,
}

impl Attempts {
    fn last_resolved(&self, app_guid: &str) -> Option<&ResolvedAttempt> {
        self.resolved.iter().rev().find(|r| r.app_guid == app_guid)
    }
}

/// Outstanding staging attempts keyed by application.
pub struct AttemptTable {
    attempts: Mutex<Attempts>,
    resolved_capacity: usize,
    spawner: Arc<dyn Spawn>,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl AttemptTable {
    /// Create an empty table that arms timers through `spawner`.
    pub fn new(spawner: Arc<dyn Spawn>) -> Self {
        Self {
            attempts: Mutex::new(Attempts::default()),
            resolved_capacity: DEFAULT_RESOLVED_HISTORY,
            spawner,
            audit: None,
        }
    }

    /// Remember at most `capacity` resolved attempts.
    #[must_use]
    pub const fn with_resolved_history(mut self, capacity: usize) -> Self {
        self.resolved_capacity = capacity;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Register a dispatched attempt and arm its timeout.
    ///
    /// `on_timeout` runs once if the attempt is still tracked when `timeout`
    /// elapses; it is expected to call [`resolve`](Self::resolve) with
    /// [`Terminal::TimedOut`]. Fails if the app already has an unresolved
    /// attempt.
    pub fn begin<F>(
        &self,
        app_guid: &str,
        task_id: StagingTaskId,
        backend: Backend,
        timeout: Duration,
        on_timeout: F,
    ) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let now = now_ms();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        {
            let mut attempts = self.attempts.lock();
            if let Some(existing) = attempts.in_flight.get(app_guid) {
                tracing::warn!(
                    "refusing to stage app {}: task {} still in flight on {}",
                    app_guid,
                    existing.task_id,
                    existing.backend
                );
                return Err(DispatchError::AttemptInFlight(app_guid.to_string()));
            }
            attempts.resolved.retain(|r| r.app_guid != app_guid);
            attempts.in_flight.insert(
                app_guid.to_string(),
                Attempt {
                    task_id,
                    backend,
                    dispatched_at_ms: now,
                    deadline_ms: now + timeout.as_millis(),
                    cancel_timer: Some(cancel_tx),
                },
            );
        }
        self.record(app_guid, task_id, backend, "dispatch", None);

        let guid = app_guid.to_string();
        self.spawner.spawn(Box::pin(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    tracing::debug!("staging timer fired for app {} task {}", guid, task_id);
                    on_timeout();
                }
                _ = cancel_rx => {
                    tracing::debug!("staging timer cancelled for app {} task {}", guid, task_id);
                }
            }
        }));
        Ok(())
    }

    /// Forget an attempt whose request was never published.
    pub fn abandon(&self, app_guid: &str, task_id: StagingTaskId) {
        let removed = {
            let mut attempts = self.attempts.lock();
            match attempts.in_flight.get(app_guid) {
                Some(a) if a.task_id == task_id => attempts.in_flight.remove(app_guid),
                _ => None,
            }
        };
        if let Some(mut attempt) = removed {
            attempt.cancel_timer();
            self.record(app_guid, task_id, attempt.backend, "abandoned", None);
        }
    }

    /// Move an attempt to a terminal state.
    ///
    /// Only the first resolution of a dispatched attempt is applied. Messages
    /// for unknown, stale, foreign or already-resolved attempts are discarded.
    /// An applied resolution removes the attempt from the in-flight table.
    pub fn resolve(
        &self,
        app_guid: &str,
        task_id: StagingTaskId,
        backend: Backend,
        terminal: Terminal,
    ) -> Resolution {
        let target = AttemptState::from(terminal);
        let resolution = {
            let mut guard = self.attempts.lock();
            let attempts = &mut *guard;
            match attempts.in_flight.get(app_guid) {
                Some(a) if a.task_id != task_id => Resolution::Discarded(DiscardReason::StaleTask {
                    outstanding: a.task_id,
                }),
                Some(a) if a.backend != backend => {
                    Resolution::Discarded(DiscardReason::BackendMismatch { expected: a.backend })
                }
                Some(_) => {
                    if let Some(mut attempt) = attempts.in_flight.remove(app_guid) {
                        attempt.cancel_timer();
                        self.push_resolved(attempts, app_guid, attempt, target);
                    }
                    Resolution::Applied
                }
                None => match attempts.last_resolved(app_guid) {
                    Some(r) if r.task_id == task_id && r.backend != backend => {
                        Resolution::Discarded(DiscardReason::BackendMismatch { expected: r.backend })
                    }
                    Some(r) if r.task_id == task_id => {
                        Resolution::Discarded(DiscardReason::AlreadyResolved(r.state))
                    }
                    _ => Resolution::Discarded(DiscardReason::UnknownAttempt),
                },
            }
        };

        match resolution {
            Resolution::Applied => {
                let action = match target {
                    AttemptState::Succeeded => "succeeded",
                    AttemptState::TimedOut => "timed_out",
                    _ => "failed",
                };
                self.record(app_guid, task_id, backend, action, None);
            }
            Resolution::Discarded(reason) => {
                self.record(app_guid, task_id, backend, "discard", Some(reason.to_string()));
            }
        }
        resolution
    }

    /// Current state of the app's latest known attempt.
    #[must_use]
    pub fn state(&self, app_guid: &str) -> Option<AttemptState> {
        self.snapshot(app_guid).map(|s| s.state)
    }

    /// Snapshot of the app's latest known attempt, in flight or recently
    /// resolved.
    #[must_use]
    pub fn snapshot(&self, app_guid: &str) -> Option<AttemptSnapshot> {
        let attempts = self.attempts.lock();
        if let Some(a) = attempts.in_flight.get(app_guid) {
            return Some(AttemptSnapshot {
                task_id: a.task_id,
                backend: a.backend,
                state: AttemptState::Dispatched,
                dispatched_at_ms: a.dispatched_at_ms,
                deadline_ms: a.deadline_ms,
            });
        }
        attempts.last_resolved(app_guid).map(|r| AttemptSnapshot {
            task_id: r.task_id,
            backend: r.backend,
            state: r.state,
            dispatched_at_ms: r.dispatched_at_ms,
            deadline_ms: r.deadline_ms,
        })
    }

    /// Task id of the app's in-flight attempt on `backend`, if any.
    #[must_use]
    pub fn outstanding_task(&self, app_guid: &str, backend: Backend) -> Option<StagingTaskId> {
        self.attempts
            .lock()
            .in_flight
            .get(app_guid)
            .filter(|a| a.backend == backend)
            .map(|a| a.task_id)
    }

    /// Number of attempts still waiting for a completion.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.attempts.lock().in_flight.len()
    }

    /// Number of resolved attempts still remembered.
    #[must_use]
    pub fn resolved_len(&self) -> usize {
        self.attempts.lock().resolved.len()
    }

    fn push_resolved(
        &self,
        attempts: &mut Attempts,
        app_guid: &str,
        attempt: Attempt,
        state: AttemptState,
    ) {
        if self.resolved_capacity == 0 {
            return;
        }
        if attempts.resolved.len() >= self.resolved_capacity {
            attempts.resolved.pop_front();
        }
        attempts.resolved.push_back(ResolvedAttempt {
            app_guid: app_guid.to_string(),
            task_id: attempt.task_id,
            backend: attempt.backend,
            state,
            dispatched_at_ms: attempt.dispatched_at_ms,
            deadline_ms: attempt.deadline_ms,
        });
    }

    /// Record an event that has no tracked attempt to hang off, such as an
    /// uncorrelatable completion.
    pub fn record_discard(&self, backend: Backend, detail: String) {
        self.record("unknown", StagingTaskId::nil(), backend, "discard", Some(detail));
    }

    fn record(
        &self,
        app_guid: &str,
        task_id: StagingTaskId,
        backend: Backend,
        action: &str,
        detail: Option<String>,
    ) {
        if let Some(audit) = self.audit.as_ref() {
            let mut sink = audit.lock();
            sink.record(build_audit_event(
                format!("{}-{}-{}", task_id, action, now_ms()),
                app_guid,
                task_id.to_string(),
                backend.label(),
                action,
                detail,
            ));
        }
    }
}
