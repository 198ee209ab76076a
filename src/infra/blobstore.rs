//! URL generator for a blobstore fronted by the control plane.

use crate::core::{Application, BlobstoreUrlGenerator, NamedBuildpack};

/// Builds staging URLs under a fixed internal endpoint.
#[derive(Debug, Clone)]
pub struct StagingUrlGenerator {
    base_url: String,
}

impl StagingUrlGenerator {
    /// Generator rooted at `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl BlobstoreUrlGenerator for StagingUrlGenerator {
    fn app_package_download_url(&self, app: &Application) -> String {
        format!("{}/staging/apps/{}", self.base_url, app.guid)
    }

    fn buildpack_cache_download_url(&self, app: &Application) -> String {
        format!("{}/staging/buildpack_cache/{}/download", self.base_url, app.guid)
    }

    fn buildpack_cache_upload_url(&self, app: &Application) -> String {
        format!("{}/staging/buildpack_cache/{}/upload", self.base_url, app.guid)
    }

    fn droplet_upload_url(&self, app: &Application) -> String {
        format!("{}/staging/droplets/{}/upload", self.base_url, app.guid)
    }

    fn admin_buildpack_download_url(&self, buildpack: &NamedBuildpack) -> String {
        format!("{}/staging/buildpacks/{}/download", self.base_url, buildpack.key)
    }
}
