//! Fields shared by both modern-fabric flavors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::StagingConfig;
use crate::core::{Application, StagingTaskId};

/// Resource floors and timeout fixed when a dispatcher is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingLimits {
    /// Minimum staging memory in MB.
    pub minimum_memory_mb: u32,
    /// Minimum staging disk in MB.
    pub minimum_disk_mb: u32,
    /// Minimum file descriptor limit.
    pub minimum_file_descriptors: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl StagingLimits {
    /// Copy the relevant values out of a configuration snapshot.
    #[must_use]
    pub const fn from_config(config: &StagingConfig) -> Self {
        Self {
            minimum_memory_mb: config.minimum_staging_memory_mb,
            minimum_disk_mb: config.minimum_staging_disk_mb,
            minimum_file_descriptors: config.minimum_staging_file_descriptor_limit,
            timeout: config.staging_timeout(),
        }
    }
}

/// One environment variable in a staging request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// Identity, limits and environment common to every staging request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonStagingFields {
    /// Application identity.
    pub app_id: String,
    /// Attempt identity, echoed back in the completion.
    pub task_id: StagingTaskId,
    /// Staging memory in MB.
    pub memory_mb: u32,
    /// Staging disk in MB.
    pub disk_mb: u32,
    /// File descriptor limit.
    pub file_descriptors: u32,
    /// Environment, sorted by name.
    pub environment: Vec<EnvironmentVariable>,
    /// Stack to build on.
    pub stack: String,
    /// Backend-side timeout in seconds.
    pub timeout: u64,
}

/// Builds [`CommonStagingFields`].
#[derive(Debug, Clone, Copy)]
pub struct CommonProtocol {
    limits: StagingLimits,
}

impl CommonProtocol {
    /// Create a common protocol with fixed limits.
    #[must_use]
    pub const fn new(limits: StagingLimits) -> Self {
        Self { limits }
    }

    /// Limits this protocol applies.
    #[must_use]
    pub const fn limits(&self) -> StagingLimits {
        self.limits
    }

    /// Shared request fields for `app`. Each limit is the larger of the app's
    /// own value and the configured floor.
    #[must_use]
    pub fn common_fields(&self, app: &Application, task_id: StagingTaskId) -> CommonStagingFields {
        CommonStagingFields {
            app_id: app.guid.clone(),
            task_id,
            memory_mb: app.memory_mb.max(self.limits.minimum_memory_mb),
            disk_mb: app.disk_quota_mb.max(self.limits.minimum_disk_mb),
            file_descriptors: app.file_descriptors.max(self.limits.minimum_file_descriptors),
            environment: app
                .environment
                .iter()
                .map(|(name, value)| EnvironmentVariable {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            stack: app.stack.clone(),
            timeout: self.limits.timeout.as_secs(),
        }
    }
}
