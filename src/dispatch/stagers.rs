//! Entry point: validation and dispatcher construction.

use std::sync::Arc;

use crate::completion::{
    self, CompletionHandler, DockerCompletionHandler, LegacyCompletionHandler,
    TraditionalCompletionHandler,
};
use crate::config::StagingConfig;
use crate::core::{
    select_backend, validate, Application, AttemptTable, Backend, BlobstoreUrlGenerator,
    BuildpackCatalog, BusError, MessageBus, Runners, Spawn, StagingError,
    StagingValidationError,
};
use crate::dispatch::legacy::{LegacyPoolStager, StagerPool};
use crate::dispatch::messenger::Messenger;
use crate::dispatch::stager::{DiegoStager, Stager, StagingTicket};
use crate::protocol::{
    CommonProtocol, DockerProtocol, StagingLimits, StagingProtocol, TraditionalProtocol,
};

/// External collaborators the staging core consumes.
#[derive(Clone)]
pub struct StagingCollaborators {
    /// Transport to the fabrics.
    pub bus: Arc<dyn MessageBus>,
    /// Legacy stager pool.
    pub stager_pool: Arc<dyn StagerPool>,
    /// Platform buildpacks.
    pub catalog: Arc<dyn BuildpackCatalog>,
    /// Blobstore URL generator.
    pub urls: Arc<dyn BlobstoreUrlGenerator>,
    /// Downstream runner logic.
    pub runners: Arc<dyn Runners>,
}

/// One completion handler per backend.
#[derive(Clone)]
pub struct CompletionHandlers {
    /// Legacy pool replies.
    pub legacy: Arc<LegacyCompletionHandler>,
    /// Buildpack-flavor replies.
    pub traditional: Arc<TraditionalCompletionHandler>,
    /// Image-flavor replies.
    pub docker: Arc<DockerCompletionHandler>,
}

impl CompletionHandlers {
    /// Handler for `backend`.
    #[must_use]
    pub fn for_backend(&self, backend: Backend) -> Arc<dyn CompletionHandler> {
        match backend {
            Backend::LegacyPool => self.legacy.clone(),
            Backend::ModernBuildpack => self.traditional.clone(),
            Backend::ModernImage => self.docker.clone(),
        }
    }

    /// Every handler.
    #[must_use]
    pub fn all(&self) -> [Arc<dyn CompletionHandler>; 3] {
        [
            self.legacy.clone(),
            self.traditional.clone(),
            self.docker.clone(),
        ]
    }
}

/// Validates apps and builds the dispatcher for the selected backend.
///
/// Holds no per-app state; safe to share across tasks.
pub struct Stagers {
    collaborators: StagingCollaborators,
    attempts: Arc<AttemptTable>,
    handlers: CompletionHandlers,
}

impl Stagers {
    /// Create the factory and its completion handlers.
    pub fn new(collaborators: StagingCollaborators, attempts: Arc<AttemptTable>) -> Self {
        let runners = &collaborators.runners;
        let handlers = CompletionHandlers {
            legacy: Arc::new(LegacyCompletionHandler::new(attempts.clone(), runners.clone())),
            traditional: Arc::new(TraditionalCompletionHandler::new(
                attempts.clone(),
                runners.clone(),
            )),
            docker: Arc::new(DockerCompletionHandler::new(attempts.clone(), runners.clone())),
        };
        Self {
            collaborators,
            attempts,
            handlers,
        }
    }

    /// Subscribe every completion handler to its topic.
    pub fn listen(&self, spawner: &dyn Spawn) -> Result<(), BusError> {
        for handler in self.handlers.all() {
            completion::listen(self.collaborators.bus.as_ref(), handler, spawner)?;
        }
        Ok(())
    }

    /// Pending-attempt table shared by every dispatcher.
    #[must_use]
    pub const fn attempts(&self) -> &Arc<AttemptTable> {
        &self.attempts
    }

    /// Completion handlers.
    #[must_use]
    pub const fn handlers(&self) -> &CompletionHandlers {
        &self.handlers
    }

    /// Check that `app` may be staged.
    pub fn validate_app(
        &self,
        app: &Application,
        config: &StagingConfig,
    ) -> Result<(), StagingValidationError> {
        validate(app, config, self.collaborators.catalog.as_ref())
    }

    /// Build the dispatcher for `app`.
    ///
    /// This is the only place protocol, messenger and completion handler are
    /// paired, and it pairs them from the same [`Backend`] value.
    #[must_use]
    pub fn stager_for_app(&self, app: &Application, config: &StagingConfig) -> Stager {
        let backend = select_backend(app, config);
        let common = CommonProtocol::new(StagingLimits::from_config(config));
        let c = &self.collaborators;

        let protocol: Arc<dyn StagingProtocol> = match backend {
            Backend::LegacyPool => {
                return Stager::LegacyPool(LegacyPoolStager::new(
                    app.clone(),
                    c.bus.clone(),
                    c.stager_pool.clone(),
                    c.urls.clone(),
                    c.catalog.clone(),
                    common,
                    self.handlers.for_backend(backend),
                    self.attempts.clone(),
                ));
            }
            Backend::ModernBuildpack => Arc::new(TraditionalProtocol::new(
                c.urls.clone(),
                c.catalog.clone(),
                common,
            )),
            Backend::ModernImage => Arc::new(DockerProtocol::new(common)),
        };

        Stager::Diego(DiegoStager::new(
            app.clone(),
            Messenger::new(c.bus.clone(), protocol),
            self.handlers.for_backend(backend),
            common.limits().timeout,
            self.attempts.clone(),
        ))
    }

    /// Validate, select and dispatch in one step.
    pub async fn stage(
        &self,
        app: &Application,
        config: &StagingConfig,
    ) -> Result<StagingTicket, StagingError> {
        self.validate_app(app, config)?;
        let stager = self.stager_for_app(app, config);
        Ok(stager.stage().await?)
    }
}
