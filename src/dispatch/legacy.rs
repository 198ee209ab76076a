//! Legacy pool backend.
//!
//! Builds are placed on a stager picked from a pool of advertised stagers and
//! addressed to that stager's own topic. Replies come back on
//! `dea.staging.finished` and resolve through the same attempt table as the
//! modern fabric.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::completion::CompletionHandler;
use crate::core::{
    topics, Application, AttemptTable, Backend, BlobstoreUrlGenerator, Buildpack,
    BuildpackCatalog, DispatchError, MessageBus, StagingTaskId,
};
use crate::dispatch::stager::StagingTicket;
use crate::protocol::{buildpack_entries, BuildpackEntry, CommonProtocol, EnvironmentVariable};

/// What a stager must offer to host a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagerRequirements {
    /// Stack the build runs on.
    pub stack: String,
    /// Staging memory in MB.
    pub memory_mb: u32,
    /// Staging disk in MB.
    pub disk_mb: u32,
}

/// Pool of legacy stagers.
pub trait StagerPool: Send + Sync {
    /// Pick a stager satisfying `requirements` without reserving anything.
    fn find_stager(&self, requirements: &StagerRequirements) -> Option<String>;

    /// Pick a stager and reserve the build's memory on it in one step.
    ///
    /// Memory stays reserved until the stager advertises again or
    /// [`release_app_memory`](Self::release_app_memory) returns it.
    fn reserve_stager(&self, requirements: &StagerRequirements) -> Option<String>;

    /// Return memory reserved for a build that was never dispatched.
    fn release_app_memory(&self, stager_id: &str, memory_mb: u32);
}

/// Request sent to `staging.<stager_id>.start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStagingRequest {
    /// Application identity.
    pub app_id: String,
    /// Attempt identity, echoed back in the reply.
    pub task_id: StagingTaskId,
    /// Stack to build on.
    pub stack: String,
    /// Staging memory in MB.
    pub memory_mb: u32,
    /// Staging disk in MB.
    pub disk_mb: u32,
    /// File descriptor limit.
    pub file_descriptors: u32,
    /// Explicit buildpack: a custom URL or a platform buildpack key.
    pub buildpack: Option<String>,
    /// Platform buildpacks available for detection.
    pub admin_buildpacks: Vec<BuildpackEntry>,
    /// Package download location.
    pub download_uri: String,
    /// Droplet upload location.
    pub upload_uri: String,
    /// Previous build cache.
    pub buildpack_cache_download_uri: String,
    /// Where to upload the new build cache.
    pub buildpack_cache_upload_uri: String,
    /// Environment, sorted by name.
    pub environment: Vec<EnvironmentVariable>,
    /// Topic to reply on.
    pub reply_to: String,
    /// Stager-side timeout in seconds.
    pub timeout: u64,
}

/// Dispatcher for the legacy pool.
pub struct LegacyPoolStager {
    app: Application,
    bus: Arc<dyn MessageBus>,
    pool: Arc<dyn StagerPool>,
    urls: Arc<dyn BlobstoreUrlGenerator>,
    catalog: Arc<dyn BuildpackCatalog>,
    common: CommonProtocol,
    completion_handler: Arc<dyn CompletionHandler>,
    attempts: Arc<AttemptTable>,
}

impl LegacyPoolStager {
    /// Assemble a legacy dispatcher.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        app: Application,
        bus: Arc<dyn MessageBus>,
        pool: Arc<dyn StagerPool>,
        urls: Arc<dyn BlobstoreUrlGenerator>,
        catalog: Arc<dyn BuildpackCatalog>,
        common: CommonProtocol,
        completion_handler: Arc<dyn CompletionHandler>,
        attempts: Arc<AttemptTable>,
    ) -> Self {
        debug_assert_eq!(completion_handler.backend(), Backend::LegacyPool);
        Self {
            app,
            bus,
            pool,
            urls,
            catalog,
            common,
            completion_handler,
            attempts,
        }
    }

    /// Application this dispatcher stages.
    #[must_use]
    pub const fn app(&self) -> &Application {
        &self.app
    }

    /// Completion budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.common.limits().timeout
    }

    /// Build the request for one attempt.
    #[must_use]
    pub fn request(&self, task_id: StagingTaskId) -> LegacyStagingRequest {
        let app = &self.app;
        let common = self.common.common_fields(app, task_id);
        let buildpack = match &app.buildpack {
            Buildpack::Custom(url) => Some(url.clone()),
            Buildpack::Named(name) => self.catalog.find(name).map(|bp| bp.key),
            Buildpack::Autodetect => None,
        };

        LegacyStagingRequest {
            app_id: common.app_id,
            task_id,
            stack: common.stack,
            memory_mb: common.memory_mb,
            disk_mb: common.disk_mb,
            file_descriptors: common.file_descriptors,
            buildpack,
            admin_buildpacks: buildpack_entries(app, self.catalog.as_ref(), self.urls.as_ref()),
            download_uri: self.urls.app_package_download_url(app),
            upload_uri: self.urls.droplet_upload_url(app),
            buildpack_cache_download_uri: self.urls.buildpack_cache_download_url(app),
            buildpack_cache_upload_uri: self.urls.buildpack_cache_upload_url(app),
            environment: common.environment,
            reply_to: topics::DEA_STAGING_FINISHED.to_string(),
            timeout: common.timeout,
        }
    }

    /// Place the build on a stager and publish the request to it.
    pub async fn stage(&self) -> Result<StagingTicket, DispatchError> {
        let task_id = Uuid::new_v4();
        let request = self.request(task_id);
        let requirements = StagerRequirements {
            stack: request.stack.clone(),
            memory_mb: request.memory_mb,
            disk_mb: request.disk_mb,
        };

        let Some(stager_id) = self.pool.reserve_stager(&requirements) else {
            tracing::warn!(
                "no stager for app {} (stack {}, {} MB)",
                self.app.guid,
                requirements.stack,
                requirements.memory_mb
            );
            return Err(DispatchError::NoStagerAvailable {
                stack: requirements.stack,
                memory_mb: requirements.memory_mb,
            });
        };
        let release = || self.pool.release_app_memory(&stager_id, requirements.memory_mb);
        let payload = match serde_json::to_vec(&request) {
            Ok(payload) => payload,
            Err(e) => {
                release();
                return Err(DispatchError::Encode(e));
            }
        };
        let topic = topics::dea_staging_start(&stager_id);

        let guid = self.app.guid.clone();
        let handler = Arc::clone(&self.completion_handler);
        let timer_guid = guid.clone();
        if let Err(e) = self
            .attempts
            .begin(&guid, task_id, Backend::LegacyPool, self.timeout(), move || {
                handler.staging_timed_out(&timer_guid, task_id);
            })
        {
            release();
            return Err(e);
        }

        if let Err(e) = self.bus.publish(&topic, payload).await {
            tracing::error!("failed to publish staging request for app {} on {}: {}", guid, topic, e);
            self.attempts.abandon(&guid, task_id);
            release();
            return Err(DispatchError::Publish(e));
        }

        tracing::info!("dispatched staging for app {} to stager {} (task {})", guid, stager_id, task_id);
        Ok(StagingTicket {
            app_guid: guid,
            task_id,
            backend: Backend::LegacyPool,
        })
    }
}
