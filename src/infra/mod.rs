//! Infrastructure adapters: message bus, runner sink, stager pool, blobstore
//! URLs and buildpack catalog.

pub mod blobstore;
pub mod bus;
pub mod catalog;
pub mod runners;
pub mod stager_pool;

pub use blobstore::StagingUrlGenerator;
pub use bus::InMemoryMessageBus;
pub use catalog::InMemoryBuildpackCatalog;
pub use runners::InMemoryRunners;
pub use stager_pool::{InMemoryStagerPool, StagerAdvertisement};
