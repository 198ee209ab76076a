//! Staging outcomes and the downstream sinks that receive them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::application::AppGuid;
use crate::core::attempts::Terminal;
use crate::core::backend::Backend;

/// Identifier of a single staging attempt.
pub type StagingTaskId = Uuid;

/// A successful build, ready for runner start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingResult {
    /// Staged application.
    pub app_guid: AppGuid,
    /// Attempt that produced the build.
    pub task_id: StagingTaskId,
    /// Backend that performed the build.
    pub backend: Backend,
    /// Buildpack the backend detected, if any.
    pub detected_buildpack: Option<String>,
    /// Blobstore key of the buildpack used, if any.
    pub buildpack_key: Option<String>,
    /// Opaque metadata the runner needs.
    pub execution_metadata: String,
    /// Start command the backend detected.
    pub detected_start_command: Option<String>,
}

/// Why a staging attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend reported a build error.
    BackendReported,
    /// The completion message could not be decoded.
    MalformedCompletion,
    /// No completion arrived within the timeout.
    TimedOut,
}

/// A failed staging attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingFailure {
    /// Application that failed to stage.
    pub app_guid: AppGuid,
    /// Failed attempt.
    pub task_id: StagingTaskId,
    /// Backend that was asked to stage.
    pub backend: Backend,
    /// Failure classification.
    pub kind: FailureKind,
    /// Backend error identifier, when the backend supplied one.
    pub error_id: Option<String>,
    /// Human-readable reason.
    pub message: String,
}

/// Terminal result of a staging attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StagingOutcome {
    /// The build succeeded.
    Succeeded(StagingResult),
    /// The build failed or never answered.
    Failed(StagingFailure),
}

impl StagingOutcome {
    /// Application and attempt this outcome belongs to.
    #[must_use]
    pub fn correlation(&self) -> (&str, StagingTaskId) {
        match self {
            Self::Succeeded(r) => (&r.app_guid, r.task_id),
            Self::Failed(f) => (&f.app_guid, f.task_id),
        }
    }

    /// Terminal attempt state this outcome moves to.
    #[must_use]
    pub const fn terminal(&self) -> Terminal {
        match self {
            Self::Succeeded(_) => Terminal::Succeeded,
            Self::Failed(StagingFailure {
                kind: FailureKind::TimedOut,
                ..
            }) => Terminal::TimedOut,
            Self::Failed(_) => Terminal::Failed,
        }
    }
}

/// Downstream runner logic invoked once per resolved attempt.
pub trait Runners: Send + Sync {
    /// Start the staged application.
    fn start_runner(&self, result: StagingResult);
    /// Record that staging failed or timed out.
    fn report_failure(&self, failure: StagingFailure);
}
