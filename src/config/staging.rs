//! Staging configuration.

use std::env;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Whether the modern execution fabric accepts staging work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FabricMode {
    /// Apps pinned to the modern fabric stage there.
    #[default]
    Enabled,
    /// Every app stages on the legacy pool.
    Disabled,
}

/// Configuration snapshot for one staging decision.
///
/// Callers pass a snapshot in at call time. Dispatchers copy the values they
/// need when they are built, so later changes do not affect running attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Modern fabric kill switch for staging.
    pub diego_staging: FabricMode,
    /// Whether container-image staging is allowed.
    pub diego_docker: bool,
    /// Per-attempt completion budget in seconds.
    pub timeout_in_seconds: u64,
    /// Lower bound on staging memory.
    pub minimum_staging_memory_mb: u32,
    /// Lower bound on staging disk.
    pub minimum_staging_disk_mb: u32,
    /// Lower bound on the staging file descriptor limit.
    pub minimum_staging_file_descriptor_limit: u32,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            diego_staging: FabricMode::Enabled,
            diego_docker: false,
            timeout_in_seconds: 900,
            minimum_staging_memory_mb: 1024,
            minimum_staging_disk_mb: 4096,
            minimum_staging_file_descriptor_limit: 16384,
        }
    }
}

impl StagingConfig {
    /// Whether the modern fabric is allowed to stage anything.
    #[must_use]
    pub fn diego_staging_enabled(&self) -> bool {
        self.diego_staging == FabricMode::Enabled
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn staging_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_in_seconds)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_in_seconds == 0 {
            return Err("timeout_in_seconds must be greater than 0".into());
        }
        if self.minimum_staging_memory_mb == 0 {
            return Err("minimum_staging_memory_mb must be greater than 0".into());
        }
        if self.minimum_staging_disk_mb == 0 {
            return Err("minimum_staging_disk_mb must be greater than 0".into());
        }
        if self.minimum_staging_file_descriptor_limit == 0 {
            return Err("minimum_staging_file_descriptor_limit must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse staging configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from `STAGING_*` environment variables on top of
    /// the defaults, loading a `.env` file first if one exists.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Ok(mode) = env::var("STAGING_DIEGO_STAGING") {
            cfg.diego_staging = match mode.trim() {
                "enabled" => FabricMode::Enabled,
                "disabled" => FabricMode::Disabled,
                other => anyhow::bail!("STAGING_DIEGO_STAGING must be enabled or disabled, got `{other}`"),
            };
        }
        if let Ok(docker) = env::var("STAGING_DIEGO_DOCKER") {
            cfg.diego_docker = docker
                .trim()
                .parse()
                .context("STAGING_DIEGO_DOCKER must be a boolean")?;
        }
        if let Ok(timeout) = env::var("STAGING_TIMEOUT_SECS") {
            cfg.timeout_in_seconds = timeout
                .trim()
                .parse()
                .context("STAGING_TIMEOUT_SECS must be an integer")?;
        }
        if let Ok(memory) = env::var("STAGING_MINIMUM_MEMORY_MB") {
            cfg.minimum_staging_memory_mb = memory
                .trim()
                .parse()
                .context("STAGING_MINIMUM_MEMORY_MB must be an integer")?;
        }
        if let Ok(disk) = env::var("STAGING_MINIMUM_DISK_MB") {
            cfg.minimum_staging_disk_mb = disk
                .trim()
                .parse()
                .context("STAGING_MINIMUM_DISK_MB must be an integer")?;
        }
        if let Ok(fds) = env::var("STAGING_MINIMUM_FILE_DESCRIPTOR_LIMIT") {
            cfg.minimum_staging_file_descriptor_limit = fds
                .trim()
                .parse()
                .context("STAGING_MINIMUM_FILE_DESCRIPTOR_LIMIT must be an integer")?;
        }

        cfg.validate().map_err(anyhow::Error::msg)?;
        tracing::debug!("loaded staging config from environment: {:?}", cfg);
        Ok(cfg)
    }
}
