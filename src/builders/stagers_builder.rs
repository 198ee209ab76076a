//! Wires the attempt table, completion handlers and their subscriptions.

use std::sync::Arc;

use crate::core::{AttemptTable, AuditSink, BusError, Spawn};
use crate::dispatch::{Stagers, StagingCollaborators};

/// Build a [`Stagers`] factory and subscribe its completion handlers.
///
/// Once this returns, every completion topic has a listener, so dispatchers
/// obtained from the factory can never publish a request whose reply is
/// missed.
pub fn build_stagers(
    collaborators: StagingCollaborators,
    spawner: Arc<dyn Spawn>,
    audit: Option<Box<dyn AuditSink>>,
) -> Result<Stagers, BusError> {
    let mut attempts = AttemptTable::new(spawner.clone());
    if let Some(audit) = audit {
        attempts = attempts.with_audit(audit);
    }

    let stagers = Stagers::new(collaborators, Arc::new(attempts));
    stagers.listen(spawner.as_ref())?;
    tracing::info!("staging dispatch ready");
    Ok(stagers)
}
