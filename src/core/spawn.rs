//! Runtime-agnostic task spawning.

use std::future::Future;
use std::pin::Pin;

/// Boxed background task.
pub type SpawnedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction for spawning background work (timeout timers, completion
/// listeners) on a runtime.
pub trait Spawn: Send + Sync {
    /// Spawn a detached task.
    fn spawn(&self, task: SpawnedTask);
}
