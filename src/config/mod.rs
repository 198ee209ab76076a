//! Configuration snapshot consumed by validation and backend selection.

pub mod staging;

pub use staging::{FabricMode, StagingConfig};
