//! Buildpack-flavor protocol.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    topics, Application, Backend, BlobstoreUrlGenerator, Buildpack, BuildpackCatalog,
    StagingTaskId,
};
use crate::protocol::common::{CommonProtocol, CommonStagingFields};
use crate::protocol::{StagingProtocol, StagingRequest};

/// Name sent for user-supplied buildpacks.
pub const CUSTOM_BUILDPACK_NAME: &str = "custom";

/// One buildpack the backend may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackEntry {
    /// Buildpack name.
    pub name: String,
    /// Blobstore key, or the URL itself for custom buildpacks.
    pub key: String,
    /// Download location.
    pub url: String,
}

/// Buildpack-flavor staging request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraditionalStagingRequest {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonStagingFields,
    /// Package download location.
    pub app_bits_download_uri: String,
    /// Previous build cache.
    pub build_artifacts_cache_download_uri: String,
    /// Where to upload the new build cache.
    pub build_artifacts_cache_upload_uri: String,
    /// Where to upload the droplet.
    pub droplet_upload_uri: String,
    /// Buildpacks to try, in order.
    pub buildpacks: Vec<BuildpackEntry>,
}

/// Buildpacks the backend should run for `app`.
///
/// A custom buildpack is sent alone. A named buildpack is sent alone when the
/// catalog knows it; otherwise, like autodetect, the whole catalog is sent.
pub fn buildpack_entries(
    app: &Application,
    catalog: &dyn BuildpackCatalog,
    urls: &dyn BlobstoreUrlGenerator,
) -> Vec<BuildpackEntry> {
    let admin_entry = |bp: &crate::core::NamedBuildpack| BuildpackEntry {
        name: bp.name.clone(),
        key: bp.key.clone(),
        url: urls.admin_buildpack_download_url(bp),
    };

    match &app.buildpack {
        Buildpack::Custom(url) => vec![BuildpackEntry {
            name: CUSTOM_BUILDPACK_NAME.to_string(),
            key: url.clone(),
            url: url.clone(),
        }],
        Buildpack::Named(name) => {
            if let Some(bp) = catalog.find(name) {
                vec![admin_entry(&bp)]
            } else {
                tracing::warn!(
                    "app {} names unknown buildpack `{}`, falling back to detection",
                    app.guid,
                    name
                );
                catalog.list().iter().map(admin_entry).collect()
            }
        }
        Buildpack::Autodetect => catalog.list().iter().map(admin_entry).collect(),
    }
}

/// Protocol for buildpack-based staging on the modern fabric.
pub struct TraditionalProtocol {
    urls: Arc<dyn BlobstoreUrlGenerator>,
    catalog: Arc<dyn BuildpackCatalog>,
    common: CommonProtocol,
}

impl TraditionalProtocol {
    /// Compose the protocol from its collaborators.
    pub fn new(
        urls: Arc<dyn BlobstoreUrlGenerator>,
        catalog: Arc<dyn BuildpackCatalog>,
        common: CommonProtocol,
    ) -> Self {
        Self {
            urls,
            catalog,
            common,
        }
    }

    /// Typed request for `app`.
    pub fn request(&self, app: &Application, task_id: StagingTaskId) -> TraditionalStagingRequest {
        TraditionalStagingRequest {
            common: self.common.common_fields(app, task_id),
            app_bits_download_uri: self.urls.app_package_download_url(app),
            build_artifacts_cache_download_uri: self.urls.buildpack_cache_download_url(app),
            build_artifacts_cache_upload_uri: self.urls.buildpack_cache_upload_url(app),
            droplet_upload_uri: self.urls.droplet_upload_url(app),
            buildpacks: buildpack_entries(app, self.catalog.as_ref(), self.urls.as_ref()),
        }
    }
}

impl StagingProtocol for TraditionalProtocol {
    fn backend(&self) -> Backend {
        Backend::ModernBuildpack
    }

    fn start_topic(&self) -> &'static str {
        topics::DIEGO_STAGING_START
    }

    fn stage_request(&self, app: &Application, task_id: StagingTaskId) -> StagingRequest {
        StagingRequest::Traditional(self.request(app, task_id))
    }
}
