//! Error types for staging validation and dispatch.

use thiserror::Error;

use crate::core::application::AppGuid;

/// Detail message attached to [`StagingValidationError::AppPackageInvalid`]
/// when the package hash is missing.
pub const EMPTY_PACKAGE_HASH: &str = "the app package hash is empty";

/// Reasons an application is not eligible to stage.
///
/// Raised before anything is sent to a backend. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagingValidationError {
    /// The app references a container image but image staging is disabled.
    #[error("docker staging is disabled")]
    DockerDisabled,
    /// The app package reference is missing or unusable.
    #[error("app package invalid: {0}")]
    AppPackageInvalid(String),
    /// The app uses a custom buildpack but its scope forbids them.
    #[error("custom buildpacks are disabled")]
    CustomBuildpacksDisabled,
    /// No platform buildpacks are registered and none was supplied.
    #[error("no buildpacks found")]
    NoBuildpacksFound,
}

impl StagingValidationError {
    /// Stable error-detail name, as surfaced to API clients.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DockerDisabled => "DockerDisabled",
            Self::AppPackageInvalid(_) => "AppPackageInvalid",
            Self::CustomBuildpacksDisabled => "CustomBuildpacksDisabled",
            Self::NoBuildpacksFound => "NoBuildpacksFound",
        }
    }
}

/// Failures reported by a message bus implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus has been shut down.
    #[error("message bus closed")]
    Closed,
    /// The bus refused the message.
    #[error("publish to `{topic}` rejected: {reason}")]
    Rejected {
        /// Destination topic.
        topic: String,
        /// Transport-specific reason.
        reason: String,
    },
}

/// Errors returned synchronously from [`Stager::stage`](crate::dispatch::Stager::stage).
///
/// Every variant means the staging attempt never started; the caller may retry.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The staging request could not be published.
    #[error("failed to publish staging request: {0}")]
    Publish(#[from] BusError),
    /// The staging request could not be encoded.
    #[error("failed to encode staging request: {0}")]
    Encode(#[from] serde_json::Error),
    /// No legacy stager can host the build.
    #[error("no stager available for stack `{stack}` with {memory_mb} MB")]
    NoStagerAvailable {
        /// Requested stack.
        stack: String,
        /// Requested staging memory.
        memory_mb: u32,
    },
    /// Another attempt for the same app has not resolved yet.
    #[error("staging already in flight for app {0}")]
    AttemptInFlight(AppGuid),
}

/// Umbrella error for callers that validate and dispatch in one step.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Pre-flight validation failed.
    #[error(transparent)]
    Validation(#[from] StagingValidationError),
    /// The request could not be dispatched.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
