//! Static buildpack catalog.

use crate::core::{BuildpackCatalog, NamedBuildpack};

/// Catalog backed by a fixed list, kept in detection order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBuildpackCatalog {
    buildpacks: Vec<NamedBuildpack>,
}

impl InMemoryBuildpackCatalog {
    /// Catalog over `buildpacks`.
    #[must_use]
    pub fn new(mut buildpacks: Vec<NamedBuildpack>) -> Self {
        buildpacks.sort_by_key(|bp| bp.position);
        Self { buildpacks }
    }

    /// Catalog of buildpacks named `names`, positioned in the given order.
    #[must_use]
    pub fn from_names(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .zip(1..)
                .map(|(name, position)| NamedBuildpack {
                    name: (*name).to_string(),
                    key: format!("{name}-key"),
                    position,
                })
                .collect(),
        )
    }
}

impl BuildpackCatalog for InMemoryBuildpackCatalog {
    fn list(&self) -> Vec<NamedBuildpack> {
        self.buildpacks.clone()
    }

    fn count(&self) -> usize {
        self.buildpacks.len()
    }
}
