//! Builders to construct the staging core from collaborators.

pub mod stagers_builder;

pub use stagers_builder::build_stagers;
