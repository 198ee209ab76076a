//! In-memory runner sink.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::{FailureKind, Runners, StagingFailure, StagingOutcome, StagingResult};
use crate::util::clock::now_ms;

/// Outcome record container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    /// Delivered outcome.
    pub outcome: StagingOutcome,
    /// Delivery time (ms since epoch).
    pub created_at_ms: u128,
}

#[derive(Default)]
struct Delivered {
    by_app: HashMap<String, Vec<OutcomeRecord>>,
    total: usize,
}

/// Records every outcome instead of starting runners, for development and
/// testing. Clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryRunners {
    delivered: Arc<Mutex<Delivered>>,
    notify: Arc<Notify>,
}

impl InMemoryRunners {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes delivered for `app_guid`, optionally since a timestamp.
    #[must_use]
    pub fn fetch(&self, app_guid: &str, since_ms: Option<u128>, limit: usize) -> Vec<OutcomeRecord> {
        self.delivered
            .lock()
            .by_app
            .get(app_guid)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| since_ms.is_none_or(|s| r.created_at_ms >= s))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of outcomes delivered across all apps.
    #[must_use]
    pub fn total(&self) -> usize {
        self.delivered.lock().total
    }

    /// Results handed to runner start.
    #[must_use]
    pub fn started(&self) -> Vec<StagingResult> {
        self.outcomes()
            .into_iter()
            .filter_map(|o| match o {
                StagingOutcome::Succeeded(r) => Some(r),
                StagingOutcome::Failed(_) => None,
            })
            .collect()
    }

    /// Failures reported, optionally restricted to one kind.
    #[must_use]
    pub fn failures(&self, kind: Option<FailureKind>) -> Vec<StagingFailure> {
        self.outcomes()
            .into_iter()
            .filter_map(|o| match o {
                StagingOutcome::Failed(f) if kind.is_none_or(|k| k == f.kind) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` outcomes were delivered or `timeout` passes.
    /// Returns whether the count was reached.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.total() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.total() >= count;
            }
        }
    }

    fn outcomes(&self) -> Vec<StagingOutcome> {
        let delivered = self.delivered.lock();
        let mut records: Vec<&OutcomeRecord> = delivered.by_app.values().flatten().collect();
        records.sort_by_key(|r| r.created_at_ms);
        records.into_iter().map(|r| r.outcome.clone()).collect()
    }

    fn deliver(&self, outcome: StagingOutcome) {
        {
            let mut delivered = self.delivered.lock();
            let (app_guid, _) = outcome.correlation();
            let key = app_guid.to_string();
            delivered.by_app.entry(key).or_default().push(OutcomeRecord {
                outcome,
                created_at_ms: now_ms(),
            });
            delivered.total += 1;
        }
        self.notify.notify_waiters();
    }
}

impl Runners for InMemoryRunners {
    fn start_runner(&self, result: StagingResult) {
        self.deliver(StagingOutcome::Succeeded(result));
    }

    fn report_failure(&self, failure: StagingFailure) {
        self.deliver(StagingOutcome::Failed(failure));
    }
}
