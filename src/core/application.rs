//! The application attributes the staging core reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Application identifier.
pub type AppGuid = String;

/// Default stack for applications that do not name one.
pub const DEFAULT_STACK: &str = "cflinuxfs2";

/// Buildpack reference attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Buildpack {
    /// Let the backend try every platform buildpack in order.
    #[default]
    Autodetect,
    /// A platform buildpack registered under this name.
    Named(String),
    /// A user-supplied buildpack location.
    Custom(String),
}

impl Buildpack {
    /// Classify a raw buildpack reference.
    ///
    /// URL-like references (`scheme://...` or `git@...`) are custom, anything
    /// else non-blank names a platform buildpack.
    #[must_use]
    pub fn parse(reference: Option<&str>) -> Self {
        match reference.map(str::trim) {
            None | Some("") => Self::Autodetect,
            Some(r) if r.contains("://") || r.starts_with("git@") => Self::Custom(r.to_string()),
            Some(r) => Self::Named(r.to_string()),
        }
    }

    /// Whether this is a user-supplied buildpack.
    #[must_use]
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// An application awaiting staging.
///
/// Owned by the resource layer; the staging core never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Application identity.
    pub guid: AppGuid,
    /// Display name.
    pub name: String,
    /// Root filesystem the build runs on.
    pub stack: String,
    /// Content-addressed package reference.
    pub package_hash: Option<String>,
    /// Container image reference, if the app is image-based.
    pub docker_image: Option<String>,
    /// Buildpack selection.
    pub buildpack: Buildpack,
    /// Pinned to the modern execution fabric.
    pub diego: bool,
    /// Whether the owning scope allows custom buildpacks.
    pub custom_buildpacks_enabled: bool,
    /// Memory limit in MB.
    pub memory_mb: u32,
    /// Disk quota in MB.
    pub disk_quota_mb: u32,
    /// File descriptor limit.
    pub file_descriptors: u32,
    /// User-provided environment.
    pub environment: BTreeMap<String, String>,
}

impl Application {
    /// Create an application with platform defaults.
    pub fn new(guid: impl Into<AppGuid>, name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            stack: DEFAULT_STACK.to_string(),
            package_hash: None,
            docker_image: None,
            buildpack: Buildpack::Autodetect,
            diego: false,
            custom_buildpacks_enabled: true,
            memory_mb: 1024,
            disk_quota_mb: 1024,
            file_descriptors: 16384,
            environment: BTreeMap::new(),
        }
    }

    /// Set the package hash.
    #[must_use]
    pub fn with_package_hash(mut self, hash: impl Into<String>) -> Self {
        self.package_hash = Some(hash.into());
        self
    }

    /// Set the container image reference.
    #[must_use]
    pub fn with_docker_image(mut self, image: impl Into<String>) -> Self {
        self.docker_image = Some(image.into());
        self
    }

    /// Set the buildpack.
    #[must_use]
    pub fn with_buildpack(mut self, buildpack: Buildpack) -> Self {
        self.buildpack = buildpack;
        self
    }

    /// Pin the app to (or away from) the modern fabric.
    #[must_use]
    pub const fn with_diego(mut self, diego: bool) -> Self {
        self.diego = diego;
        self
    }

    /// Set the scope's custom buildpack policy.
    #[must_use]
    pub const fn with_custom_buildpacks_enabled(mut self, enabled: bool) -> Self {
        self.custom_buildpacks_enabled = enabled;
        self
    }

    /// Set the stack.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Set memory and disk limits.
    #[must_use]
    pub const fn with_limits(mut self, memory_mb: u32, disk_quota_mb: u32) -> Self {
        self.memory_mb = memory_mb;
        self.disk_quota_mb = disk_quota_mb;
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    /// Non-blank container image reference.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        non_blank(self.docker_image.as_deref())
    }

    /// Non-blank package hash.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        non_blank(self.package_hash.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buildpack_parse() {
        assert_eq!(Buildpack::parse(None), Buildpack::Autodetect);
        assert_eq!(Buildpack::parse(Some("  ")), Buildpack::Autodetect);
        assert_eq!(
            Buildpack::parse(Some("ruby_buildpack")),
            Buildpack::Named("ruby_buildpack".into())
        );
        assert_eq!(
            Buildpack::parse(Some("https://github.com/example/bp.git")),
            Buildpack::Custom("https://github.com/example/bp.git".into())
        );
        assert!(Buildpack::parse(Some("git@github.com:example/bp.git")).is_custom());
    }

    #[test]
    fn test_blank_references_are_absent() {
        let app = Application::new("guid", "app")
            .with_package_hash("   ")
            .with_docker_image("");
        assert!(app.package().is_none());
        assert!(app.image().is_none());

        let app = app.with_package_hash("abc").with_docker_image("app:latest");
        assert_eq!(app.package(), Some("abc"));
        assert_eq!(app.image(), Some("app:latest"));
    }
}
