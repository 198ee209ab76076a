//! Core staging abstractions: application model, validation, backend
//! selection and the pending-attempt lifecycle.

pub mod application;
pub mod attempts;
pub mod audit;
pub mod backend;
pub mod bus;
pub mod catalog;
pub mod error;
pub mod outcome;
pub mod spawn;
pub mod validator;

pub use application::{AppGuid, Application, Buildpack};
pub use attempts::{
    AttemptSnapshot, AttemptState, AttemptTable, DiscardReason, Resolution, Terminal,
};
pub use audit::{build_audit_event, AuditSink, InMemoryAuditSink, StagingAuditEvent};
pub use backend::{select_backend, topics, Backend};
pub use bus::{MessageBus, Subscription};
pub use catalog::{BlobstoreUrlGenerator, BuildpackCatalog, NamedBuildpack};
pub use error::{
    AppResult, BusError, DispatchError, StagingError, StagingValidationError, EMPTY_PACKAGE_HASH,
};
pub use outcome::{
    FailureKind, Runners, StagingFailure, StagingOutcome, StagingResult, StagingTaskId,
};
pub use spawn::{Spawn, SpawnedTask};
pub use validator::{validate, violations};
