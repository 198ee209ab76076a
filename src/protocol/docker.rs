//! Image-flavor protocol.

use serde::{Deserialize, Serialize};

use crate::core::{topics, Application, Backend, StagingTaskId};
use crate::protocol::common::{CommonProtocol, CommonStagingFields};
use crate::protocol::{StagingProtocol, StagingRequest};

/// Image-flavor staging request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerStagingRequest {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonStagingFields,
    /// Image to stage from.
    pub docker_image_url: String,
}

/// Protocol for container-image staging on the modern fabric.
#[derive(Debug, Clone, Copy)]
pub struct DockerProtocol {
    common: CommonProtocol,
}

impl DockerProtocol {
    /// Compose the protocol over the shared fields.
    #[must_use]
    pub const fn new(common: CommonProtocol) -> Self {
        Self { common }
    }

    /// Typed request for `app`.
    #[must_use]
    pub fn request(&self, app: &Application, task_id: StagingTaskId) -> DockerStagingRequest {
        DockerStagingRequest {
            common: self.common.common_fields(app, task_id),
            docker_image_url: app.image().unwrap_or_default().to_string(),
        }
    }
}

impl StagingProtocol for DockerProtocol {
    fn backend(&self) -> Backend {
        Backend::ModernImage
    }

    fn start_topic(&self) -> &'static str {
        topics::DIEGO_DOCKER_STAGING_START
    }

    fn stage_request(&self, app: &Application, task_id: StagingTaskId) -> StagingRequest {
        StagingRequest::Docker(self.request(app, task_id))
    }
}
