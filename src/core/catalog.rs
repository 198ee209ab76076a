//! Narrow interfaces onto platform state the staging core reads.

use serde::{Deserialize, Serialize};

use crate::core::application::Application;

/// A platform buildpack registered by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedBuildpack {
    /// Name users refer to it by.
    pub name: String,
    /// Blobstore key of the buildpack archive.
    pub key: String,
    /// Detection order, lowest first.
    pub position: u32,
}

/// Read-only view of the registered platform buildpacks.
pub trait BuildpackCatalog: Send + Sync {
    /// All registered buildpacks in detection order.
    fn list(&self) -> Vec<NamedBuildpack>;

    /// Number of registered buildpacks.
    fn count(&self) -> usize {
        self.list().len()
    }

    /// Look up a buildpack by name.
    fn find(&self, name: &str) -> Option<NamedBuildpack> {
        self.list().into_iter().find(|bp| bp.name == name)
    }
}

/// Generates fetchable URLs for staging inputs and outputs.
///
/// Every method is a pure function of its arguments.
pub trait BlobstoreUrlGenerator: Send + Sync {
    /// Where the backend downloads the app package.
    fn app_package_download_url(&self, app: &Application) -> String;
    /// Where the backend downloads the previous build cache.
    fn buildpack_cache_download_url(&self, app: &Application) -> String;
    /// Where the backend uploads the new build cache.
    fn buildpack_cache_upload_url(&self, app: &Application) -> String;
    /// Where the backend uploads the staged droplet.
    fn droplet_upload_url(&self, app: &Application) -> String;
    /// Where the backend downloads a platform buildpack.
    fn admin_buildpack_download_url(&self, buildpack: &NamedBuildpack) -> String;
}
