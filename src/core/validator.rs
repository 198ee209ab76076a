//! Pre-flight staging validation.

use crate::config::StagingConfig;
use crate::core::application::Application;
use crate::core::catalog::BuildpackCatalog;
use crate::core::error::{StagingValidationError, EMPTY_PACKAGE_HASH};

/// Check that `app` may be staged at all.
///
/// Reports the first violation in precedence order: `DockerDisabled`,
/// `AppPackageInvalid`, `CustomBuildpacksDisabled`, `NoBuildpacksFound`.
pub fn validate(
    app: &Application,
    config: &StagingConfig,
    catalog: &dyn BuildpackCatalog,
) -> Result<(), StagingValidationError> {
    match violations(app, config, catalog).into_iter().next() {
        Some(err) => {
            tracing::info!("app {} failed staging validation: {}", app.guid, err.name());
            Err(err)
        }
        None => Ok(()),
    }
}

/// Every validation rule `app` breaks, in precedence order.
#[must_use]
pub fn violations(
    app: &Application,
    config: &StagingConfig,
    catalog: &dyn BuildpackCatalog,
) -> Vec<StagingValidationError> {
    let custom = app.buildpack.is_custom();
    let checks = [
        (
            app.image().is_some() && !config.diego_docker,
            StagingValidationError::DockerDisabled,
        ),
        (
            app.package().is_none(),
            StagingValidationError::AppPackageInvalid(EMPTY_PACKAGE_HASH.to_string()),
        ),
        (
            custom && !app.custom_buildpacks_enabled,
            StagingValidationError::CustomBuildpacksDisabled,
        ),
        (
            catalog.count() == 0 && !custom,
            StagingValidationError::NoBuildpacksFound,
        ),
    ];

    checks
        .into_iter()
        .filter_map(|(violated, err)| violated.then_some(err))
        .collect()
}
