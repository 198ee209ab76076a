//! Buildpack-flavor completion handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::completion::{BackendError, CompletionHandler, CompletionRouter};
use crate::core::{
    AttemptTable, Backend, FailureKind, Resolution, Runners, StagingFailure, StagingOutcome,
    StagingResult, StagingTaskId,
};

/// Completion published on `diego.staging.finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraditionalStagingResponse {
    /// Application identity.
    pub app_id: String,
    /// Attempt identity.
    pub task_id: StagingTaskId,
    /// Key of the buildpack that built the app.
    #[serde(default)]
    pub buildpack_key: Option<String>,
    /// Name the buildpack reported during detection.
    #[serde(default)]
    pub detected_buildpack: Option<String>,
    /// Metadata for the runner.
    #[serde(default)]
    pub execution_metadata: String,
    /// Detected start commands by process type.
    #[serde(default)]
    pub detected_start_command: BTreeMap<String, String>,
    /// Set when the build failed.
    #[serde(default)]
    pub error: Option<BackendError>,
}

impl TraditionalStagingResponse {
    /// Map the response onto a domain outcome.
    #[must_use]
    pub fn into_outcome(self) -> StagingOutcome {
        if let Some(error) = self.error {
            return StagingOutcome::Failed(StagingFailure {
                app_guid: self.app_id,
                task_id: self.task_id,
                backend: Backend::ModernBuildpack,
                kind: FailureKind::BackendReported,
                error_id: Some(error.id),
                message: error.message,
            });
        }
        let mut start_commands = self.detected_start_command;
        StagingOutcome::Succeeded(StagingResult {
            app_guid: self.app_id,
            task_id: self.task_id,
            backend: Backend::ModernBuildpack,
            detected_buildpack: self.detected_buildpack,
            buildpack_key: self.buildpack_key,
            execution_metadata: self.execution_metadata,
            detected_start_command: start_commands.remove("web"),
        })
    }
}

/// Handles buildpack-flavor completions.
pub struct TraditionalCompletionHandler {
    router: CompletionRouter,
}

impl TraditionalCompletionHandler {
    /// Create a handler resolving against `attempts`.
    pub fn new(attempts: Arc<AttemptTable>, runners: Arc<dyn Runners>) -> Self {
        Self {
            router: CompletionRouter::new(Backend::ModernBuildpack, attempts, runners),
        }
    }
}

impl CompletionHandler for TraditionalCompletionHandler {
    fn backend(&self) -> Backend {
        self.router.backend()
    }

    fn staging_complete(&self, payload: &[u8]) -> Option<Resolution> {
        self.router
            .complete(payload, TraditionalStagingResponse::into_outcome)
    }

    fn staging_timed_out(&self, app_guid: &str, task_id: StagingTaskId) -> Resolution {
        self.router.time_out(app_guid, task_id)
    }
}
