//! Wire protocols for the modern fabric.
//!
//! A protocol is a pure translation from an [`Application`] to the request the
//! target flavor expects. The shared fields come from [`CommonProtocol`]; each
//! flavor adds its build-source fields.

pub mod common;
pub mod docker;
pub mod traditional;

use serde::Serialize;

use crate::core::{Application, Backend, StagingTaskId};

pub use common::{CommonProtocol, CommonStagingFields, EnvironmentVariable, StagingLimits};
pub use docker::{DockerProtocol, DockerStagingRequest};
pub use traditional::{buildpack_entries, BuildpackEntry, TraditionalProtocol, TraditionalStagingRequest};

/// A staging request ready to be encoded onto the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StagingRequest {
    /// Buildpack flavor.
    Traditional(TraditionalStagingRequest),
    /// Image flavor.
    Docker(DockerStagingRequest),
}

impl StagingRequest {
    /// Fields shared by every flavor.
    #[must_use]
    pub const fn common(&self) -> &CommonStagingFields {
        match self {
            Self::Traditional(r) => &r.common,
            Self::Docker(r) => &r.common,
        }
    }
}

/// Translates an application into a flavor-specific staging request.
pub trait StagingProtocol: Send + Sync {
    /// Backend this protocol speaks to.
    fn backend(&self) -> Backend;

    /// Topic requests are published on.
    fn start_topic(&self) -> &'static str;

    /// Topic the backend answers on.
    fn completion_topic(&self) -> &'static str {
        self.backend().completion_topic()
    }

    /// Build the request for one attempt.
    fn stage_request(&self, app: &Application, task_id: StagingTaskId) -> StagingRequest;
}
