//! Dispatch: backend selection, dispatcher construction and publishing.

pub mod legacy;
pub mod messenger;
pub mod stager;
pub mod stagers;

pub use legacy::{LegacyPoolStager, LegacyStagingRequest, StagerPool, StagerRequirements};
pub use messenger::Messenger;
pub use stager::{DiegoStager, Stager, StagingTicket};
pub use stagers::{CompletionHandlers, Stagers, StagingCollaborators};
