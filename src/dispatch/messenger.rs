//! Publishes staging requests onto the bus.

use std::sync::Arc;

use crate::core::{Application, Backend, DispatchError, MessageBus, StagingTaskId};
use crate::protocol::StagingProtocol;

/// Sends staging requests built by one protocol. Never reads replies.
pub struct Messenger {
    bus: Arc<dyn MessageBus>,
    protocol: Arc<dyn StagingProtocol>,
}

impl Messenger {
    /// Bind `protocol` to `bus`.
    pub fn new(bus: Arc<dyn MessageBus>, protocol: Arc<dyn StagingProtocol>) -> Self {
        Self { bus, protocol }
    }

    /// Backend requests go to.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.protocol.backend()
    }

    /// Topic requests are published on.
    #[must_use]
    pub fn start_topic(&self) -> &'static str {
        self.protocol.start_topic()
    }

    /// Topic the backend will answer on.
    #[must_use]
    pub fn completion_topic(&self) -> &'static str {
        self.protocol.completion_topic()
    }

    /// Protocol used to build requests.
    #[must_use]
    pub fn protocol(&self) -> &dyn StagingProtocol {
        self.protocol.as_ref()
    }

    /// Encode and publish the request for one attempt.
    ///
    /// Returns once the bus accepted the message, not once the build is done.
    pub async fn send_stage_request(
        &self,
        app: &Application,
        task_id: StagingTaskId,
    ) -> Result<(), DispatchError> {
        let request = self.protocol.stage_request(app, task_id);
        let payload = serde_json::to_vec(&request)?;
        let topic = self.protocol.start_topic();

        if let Err(e) = self.bus.publish(topic, payload).await {
            tracing::error!(
                "failed to publish staging request for app {} on {}: {}",
                app.guid,
                topic,
                e
            );
            return Err(DispatchError::Publish(e));
        }
        tracing::debug!("published staging request for app {} task {} on {}", app.guid, task_id, topic);
        Ok(())
    }
}
