//! Runner sink backends.

pub mod memory;

pub use memory::{InMemoryRunners, OutcomeRecord};
