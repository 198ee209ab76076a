//! Image-flavor completion handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::completion::{BackendError, CompletionHandler, CompletionRouter};
use crate::core::{
    AttemptTable, Backend, FailureKind, Resolution, Runners, StagingFailure, StagingOutcome,
    StagingResult, StagingTaskId,
};

/// Completion published on `diego.docker.staging.finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerStagingResponse {
    /// Application identity.
    pub app_id: String,
    /// Attempt identity.
    pub task_id: StagingTaskId,
    /// Metadata for the runner, usually the image config.
    #[serde(default)]
    pub execution_metadata: String,
    /// Detected start commands by process type.
    #[serde(default)]
    pub detected_start_command: BTreeMap<String, String>,
    /// Set when the build failed.
    #[serde(default)]
    pub error: Option<BackendError>,
}

impl DockerStagingResponse {
    /// Map the response onto a domain outcome.
    #[must_use]
    pub fn into_outcome(self) -> StagingOutcome {
        match self.error {
            Some(error) => StagingOutcome::Failed(StagingFailure {
                app_guid: self.app_id,
                task_id: self.task_id,
                backend: Backend::ModernImage,
                kind: FailureKind::BackendReported,
                error_id: Some(error.id),
                message: error.message,
            }),
            None => {
                let mut start_commands = self.detected_start_command;
                StagingOutcome::Succeeded(StagingResult {
                    app_guid: self.app_id,
                    task_id: self.task_id,
                    backend: Backend::ModernImage,
                    detected_buildpack: None,
                    buildpack_key: None,
                    execution_metadata: self.execution_metadata,
                    detected_start_command: start_commands.remove("web"),
                })
            }
        }
    }
}

/// Handles image-flavor completions.
pub struct DockerCompletionHandler {
    router: CompletionRouter,
}

impl DockerCompletionHandler {
    /// Create a handler resolving against `attempts`.
    pub fn new(attempts: Arc<AttemptTable>, runners: Arc<dyn Runners>) -> Self {
        Self {
            router: CompletionRouter::new(Backend::ModernImage, attempts, runners),
        }
    }
}

impl CompletionHandler for DockerCompletionHandler {
    fn backend(&self) -> Backend {
        self.router.backend()
    }

    fn staging_complete(&self, payload: &[u8]) -> Option<Resolution> {
        self.router.complete(payload, DockerStagingResponse::into_outcome)
    }

    fn staging_timed_out(&self, app_guid: &str, task_id: StagingTaskId) -> Resolution {
        self.router.time_out(app_guid, task_id)
    }
}
