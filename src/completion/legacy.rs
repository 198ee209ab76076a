//! Legacy pool completion handler.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::completion::{CompletionHandler, CompletionRouter};
use crate::core::{
    AttemptTable, Backend, FailureKind, Resolution, Runners, StagingFailure, StagingOutcome,
    StagingResult, StagingTaskId,
};

/// Completion published on `dea.staging.finished`.
///
/// Legacy stagers report errors as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStagingResponse {
    /// Application identity.
    pub app_id: String,
    /// Attempt identity.
    pub task_id: StagingTaskId,
    /// Stager that ran the build.
    #[serde(default)]
    pub stager_id: Option<String>,
    /// Key of the buildpack that built the app.
    #[serde(default)]
    pub buildpack_key: Option<String>,
    /// Name the buildpack reported during detection.
    #[serde(default)]
    pub detected_buildpack: Option<String>,
    /// Detected start command.
    #[serde(default)]
    pub detected_start_command: Option<String>,
    /// Set when the build failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl LegacyStagingResponse {
    /// Map the response onto a domain outcome.
    #[must_use]
    pub fn into_outcome(self) -> StagingOutcome {
        if let Some(message) = self.error {
            return StagingOutcome::Failed(StagingFailure {
                app_guid: self.app_id,
                task_id: self.task_id,
                backend: Backend::LegacyPool,
                kind: FailureKind::BackendReported,
                error_id: None,
                message,
            });
        }
        StagingOutcome::Succeeded(StagingResult {
            app_guid: self.app_id,
            task_id: self.task_id,
            backend: Backend::LegacyPool,
            detected_buildpack: self.detected_buildpack,
            buildpack_key: self.buildpack_key,
            execution_metadata: String::new(),
            detected_start_command: self.detected_start_command,
        })
    }
}

/// Handles legacy pool completions.
pub struct LegacyCompletionHandler {
    router: CompletionRouter,
}

impl LegacyCompletionHandler {
    /// Create a handler resolving against `attempts`.
    pub fn new(attempts: Arc<AttemptTable>, runners: Arc<dyn Runners>) -> Self {
        Self {
            router: CompletionRouter::new(Backend::LegacyPool, attempts, runners),
        }
    }
}

impl CompletionHandler for LegacyCompletionHandler {
    fn backend(&self) -> Backend {
        self.router.backend()
    }

    fn staging_complete(&self, payload: &[u8]) -> Option<Resolution> {
        self.router.complete(payload, LegacyStagingResponse::into_outcome)
    }

    fn staging_timed_out(&self, app_guid: &str, task_id: StagingTaskId) -> Resolution {
        self.router.time_out(app_guid, task_id)
    }
}
