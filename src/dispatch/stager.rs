//! Per-attempt dispatchers.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::completion::CompletionHandler;
use crate::core::{Application, AttemptTable, Backend, DispatchError, StagingTaskId};
use crate::dispatch::legacy::LegacyPoolStager;
use crate::dispatch::messenger::Messenger;

/// Receipt for a published staging request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTicket {
    /// Application being staged.
    pub app_guid: String,
    /// Attempt identity carried in the request.
    pub task_id: StagingTaskId,
    /// Backend the request went to.
    pub backend: Backend,
}

/// Modern-fabric dispatcher: a messenger paired with the completion handler
/// of the same flavor.
pub struct DiegoStager {
    app: Application,
    messenger: Messenger,
    completion_handler: Arc<dyn CompletionHandler>,
    timeout: Duration,
    attempts: Arc<AttemptTable>,
}

impl DiegoStager {
    /// Assemble a dispatcher. The timeout is fixed for the attempt's lifetime.
    pub fn new(
        app: Application,
        messenger: Messenger,
        completion_handler: Arc<dyn CompletionHandler>,
        timeout: Duration,
        attempts: Arc<AttemptTable>,
    ) -> Self {
        debug_assert_eq!(messenger.backend(), completion_handler.backend());
        Self {
            app,
            messenger,
            completion_handler,
            timeout,
            attempts,
        }
    }

    /// Application this dispatcher stages.
    #[must_use]
    pub const fn app(&self) -> &Application {
        &self.app
    }

    /// Messenger used to publish the request.
    #[must_use]
    pub const fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    /// Handler that will interpret the reply.
    #[must_use]
    pub fn completion_handler(&self) -> &dyn CompletionHandler {
        self.completion_handler.as_ref()
    }

    /// Completion budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register the attempt, arm its timer, and publish the request.
    pub async fn stage(&self) -> Result<StagingTicket, DispatchError> {
        let task_id = Uuid::new_v4();
        let backend = self.messenger.backend();
        let guid = self.app.guid.clone();

        let handler = Arc::clone(&self.completion_handler);
        let timer_guid = guid.clone();
        self.attempts.begin(&guid, task_id, backend, self.timeout, move || {
            handler.staging_timed_out(&timer_guid, task_id);
        })?;

        if let Err(e) = self.messenger.send_stage_request(&self.app, task_id).await {
            self.attempts.abandon(&guid, task_id);
            return Err(e);
        }

        tracing::info!("dispatched staging for app {} to {} (task {})", guid, backend, task_id);
        Ok(StagingTicket {
            app_guid: guid,
            task_id,
            backend,
        })
    }
}

/// A ready-to-use dispatcher for one application.
pub enum Stager {
    /// Legacy pool fabric.
    LegacyPool(LegacyPoolStager),
    /// Modern fabric, either flavor.
    Diego(DiegoStager),
}

impl Stager {
    /// Backend this dispatcher targets.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            Self::LegacyPool(_) => Backend::LegacyPool,
            Self::Diego(stager) => stager.messenger().backend(),
        }
    }

    /// Application this dispatcher stages.
    #[must_use]
    pub const fn app(&self) -> &Application {
        match self {
            Self::LegacyPool(stager) => stager.app(),
            Self::Diego(stager) => stager.app(),
        }
    }

    /// Completion budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        match self {
            Self::LegacyPool(stager) => stager.timeout(),
            Self::Diego(stager) => stager.timeout(),
        }
    }

    /// Send the staging request. Returns once it is published.
    pub async fn stage(&self) -> Result<StagingTicket, DispatchError> {
        match self {
            Self::LegacyPool(stager) => stager.stage().await,
            Self::Diego(stager) => stager.stage().await,
        }
    }
}
