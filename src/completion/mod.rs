//! Completion handling.
//!
//! Each backend flavor has a handler subscribed to its completion topic. A
//! handler decodes the reply, resolves the attempt in the [`AttemptTable`],
//! and, only if that resolution was applied, hands the outcome to
//! [`Runners`].

pub mod docker;
pub mod legacy;
pub mod traditional;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{
    AttemptTable, Backend, BusError, FailureKind, MessageBus, Resolution, Runners, Spawn,
    StagingFailure, StagingOutcome, StagingTaskId,
};

pub use docker::{DockerCompletionHandler, DockerStagingResponse};
pub use legacy::{LegacyCompletionHandler, LegacyStagingResponse};
pub use traditional::{TraditionalCompletionHandler, TraditionalStagingResponse};

/// Error reported by a backend inside a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    /// Machine-readable error identifier.
    pub id: String,
    /// Human-readable message.
    pub message: String,
}

/// Receives completions for one backend flavor.
pub trait CompletionHandler: Send + Sync {
    /// Backend whose replies this handler interprets.
    fn backend(&self) -> Backend;

    /// Topic this handler listens on.
    fn completion_topic(&self) -> &'static str {
        self.backend().completion_topic()
    }

    /// Handle one inbound completion payload.
    fn staging_complete(&self, payload: &[u8]) -> Option<Resolution>;

    /// Handle an attempt whose timeout elapsed.
    fn staging_timed_out(&self, app_guid: &str, task_id: StagingTaskId) -> Resolution;
}

/// Correlation fields every completion carries. `task_id` is read loosely so
/// a garbled one still leaves the app identifiable.
#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    app_id: String,
    #[serde(default)]
    task_id: Option<serde_json::Value>,
}

/// A completion decoded as far as it could be.
#[derive(Debug)]
pub enum Decoded<T> {
    /// Fully decoded message.
    Message(T),
    /// Correlatable but otherwise undecodable.
    Malformed(StagingFailure),
}

/// Resolution path shared by every handler.
pub struct CompletionRouter {
    backend: Backend,
    attempts: Arc<AttemptTable>,
    runners: Arc<dyn Runners>,
}

impl CompletionRouter {
    /// Router for `backend` completions.
    pub fn new(backend: Backend, attempts: Arc<AttemptTable>, runners: Arc<dyn Runners>) -> Self {
        Self {
            backend,
            attempts,
            runners,
        }
    }

    /// Backend this router resolves attempts for.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Decode `payload`.
    ///
    /// Returns `None` when the app id cannot be read, or when the task id is
    /// unreadable and the app has no attempt in flight on this backend. A
    /// message that identifies the app but not the task is charged to the
    /// app's in-flight attempt as malformed.
    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Option<Decoded<T>> {
        let envelope: CompletionEnvelope = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(
                    "dropping uncorrelatable {} completion on {}: {}",
                    self.backend,
                    self.backend.completion_topic(),
                    e
                );
                self.attempts
                    .record_discard(self.backend, format!("undecodable completion: {e}"));
                return None;
            }
        };

        let task_id = envelope
            .task_id
            .and_then(|v| serde_json::from_value::<StagingTaskId>(v).ok());
        let Some(task_id) = task_id else {
            return self.malformed_task_id(envelope.app_id);
        };

        match serde_json::from_slice::<T>(payload) {
            Ok(message) => Some(Decoded::Message(message)),
            Err(e) => {
                tracing::error!(
                    "malformed {} completion for app {} task {}: {}",
                    self.backend,
                    envelope.app_id,
                    task_id,
                    e
                );
                Some(Decoded::Malformed(StagingFailure {
                    app_guid: envelope.app_id,
                    task_id,
                    backend: self.backend,
                    kind: FailureKind::MalformedCompletion,
                    error_id: None,
                    message: format!("malformed completion: {e}"),
                }))
            }
        }
    }

    fn malformed_task_id<T>(&self, app_guid: String) -> Option<Decoded<T>> {
        let Some(task_id) = self.attempts.outstanding_task(&app_guid, self.backend) else {
            tracing::error!(
                "dropping {} completion for app {} without a usable task id: no attempt in flight",
                self.backend,
                app_guid
            );
            self.attempts.record_discard(
                self.backend,
                format!("completion for app {app_guid} without a usable task id"),
            );
            return None;
        };
        tracing::error!(
            "malformed {} completion for app {}: missing or invalid task id, charging task {}",
            self.backend,
            app_guid,
            task_id
        );
        Some(Decoded::Malformed(StagingFailure {
            app_guid,
            task_id,
            backend: self.backend,
            kind: FailureKind::MalformedCompletion,
            error_id: None,
            message: "malformed completion: missing or invalid task_id".to_string(),
        }))
    }

    /// Resolve the attempt and, if this call won, deliver the outcome.
    pub fn finish(&self, outcome: StagingOutcome) -> Resolution {
        let (app_guid, task_id) = outcome.correlation();
        let app_guid = app_guid.to_string();
        let resolution = self
            .attempts
            .resolve(&app_guid, task_id, self.backend, outcome.terminal());

        match resolution {
            Resolution::Applied => match outcome {
                StagingOutcome::Succeeded(result) => {
                    tracing::info!("app {} staged on {} (task {})", app_guid, self.backend, task_id);
                    self.runners.start_runner(result);
                }
                StagingOutcome::Failed(failure) => {
                    tracing::warn!(
                        "app {} failed to stage on {} (task {}, {:?}): {}",
                        app_guid,
                        self.backend,
                        task_id,
                        failure.kind,
                        failure.message
                    );
                    self.runners.report_failure(failure);
                }
            },
            Resolution::Discarded(reason) => {
                tracing::warn!(
                    "discarding {} completion for app {} task {}: {}",
                    self.backend,
                    app_guid,
                    task_id,
                    reason
                );
            }
        }
        resolution
    }

    /// Resolve an attempt as timed out.
    pub fn time_out(&self, app_guid: &str, task_id: StagingTaskId) -> Resolution {
        self.finish(StagingOutcome::Failed(StagingFailure {
            app_guid: app_guid.to_string(),
            task_id,
            backend: self.backend,
            kind: FailureKind::TimedOut,
            error_id: None,
            message: "staging did not complete before the deadline".to_string(),
        }))
    }

    /// Shared handling for a raw payload: decode, map, resolve.
    pub fn complete<T, F>(&self, payload: &[u8], into_outcome: F) -> Option<Resolution>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> StagingOutcome,
    {
        let outcome = match self.decode::<T>(payload)? {
            Decoded::Message(message) => into_outcome(message),
            Decoded::Malformed(failure) => StagingOutcome::Failed(failure),
        };
        Some(self.finish(outcome))
    }
}

/// Subscribe `handler` to its completion topic and feed it every payload.
///
/// The subscription exists when this returns, so requests published
/// afterwards cannot have their completions missed.
pub fn listen(
    bus: &dyn MessageBus,
    handler: Arc<dyn CompletionHandler>,
    spawner: &dyn Spawn,
) -> Result<(), BusError> {
    let mut subscription = bus.subscribe(handler.completion_topic())?;
    tracing::info!(
        "{} completion handler listening on {}",
        handler.backend(),
        subscription.topic()
    );
    spawner.spawn(Box::pin(async move {
        while let Some(payload) = subscription.next().await {
            handler.staging_complete(&payload);
        }
        tracing::debug!("{} completion subscription closed", handler.backend());
    }));
    Ok(())
}
