//! Message bus backends.

pub mod memory;

pub use memory::{InMemoryMessageBus, PublishedMessage};
