//! Backend selection.
//!
//! [`select_backend`] is the only place the staging fabric and flavor are
//! decided. It is a pure function of the application and a configuration
//! snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::StagingConfig;
use crate::core::application::Application;

/// Bus topics used by the staging backends.
pub mod topics {
    /// Modern fabric, buildpack flavor: staging requests.
    pub const DIEGO_STAGING_START: &str = "diego.staging.start";
    /// Modern fabric, buildpack flavor: completions.
    pub const DIEGO_STAGING_FINISHED: &str = "diego.staging.finished";
    /// Modern fabric, image flavor: staging requests.
    pub const DIEGO_DOCKER_STAGING_START: &str = "diego.docker.staging.start";
    /// Modern fabric, image flavor: completions.
    pub const DIEGO_DOCKER_STAGING_FINISHED: &str = "diego.docker.staging.finished";
    /// Legacy pool: completions.
    pub const DEA_STAGING_FINISHED: &str = "dea.staging.finished";

    /// Legacy pool: staging requests addressed to one stager.
    #[must_use]
    pub fn dea_staging_start(stager_id: &str) -> String {
        format!("staging.{stager_id}.start")
    }
}

/// The execution backend and flavor that will stage an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Legacy pool-based fabric.
    LegacyPool,
    /// Modern fabric, buildpack flavor.
    ModernBuildpack,
    /// Modern fabric, container-image flavor.
    ModernImage,
}

impl Backend {
    /// Whether this backend runs on the modern fabric.
    #[must_use]
    pub const fn is_modern(self) -> bool {
        matches!(self, Self::ModernBuildpack | Self::ModernImage)
    }

    /// Topic on which this backend reports completions.
    #[must_use]
    pub const fn completion_topic(self) -> &'static str {
        match self {
            Self::LegacyPool => topics::DEA_STAGING_FINISHED,
            Self::ModernBuildpack => topics::DIEGO_STAGING_FINISHED,
            Self::ModernImage => topics::DIEGO_DOCKER_STAGING_FINISHED,
        }
    }

    /// Short label used in logs and audit events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LegacyPool => "dea",
            Self::ModernBuildpack => "diego_traditional",
            Self::ModernImage => "diego_docker",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decide which backend stages `app`.
///
/// The global kill switch wins over the app's own affinity; image versus
/// buildpack is only decided once the modern fabric is chosen.
#[must_use]
pub fn select_backend(app: &Application, config: &StagingConfig) -> Backend {
    if !config.diego_staging_enabled() || !app.diego {
        return Backend::LegacyPool;
    }
    if app.image().is_some() {
        Backend::ModernImage
    } else {
        Backend::ModernBuildpack
    }
}
