//! # Staging Dispatch
//!
//! The staging core of a platform-as-a-service control plane: given an
//! application awaiting a build, decide which execution backend builds it,
//! speak that backend's wire protocol, publish the request, and route the
//! eventual completion back to runner logic.
//!
//! ## Backends
//!
//! Two generations of execution fabric exist:
//!
//! - **Legacy pool**: builds are placed on a stager picked from a pool of
//!   advertised stagers.
//! - **Modern fabric**: builds are requested over the bus, in a buildpack
//!   ("traditional") or container-image ("docker") flavor.
//!
//! [`core::select_backend`] picks exactly one [`core::Backend`] from the
//! application and a configuration snapshot. A global kill switch for the
//! modern fabric always wins over an application's own affinity.
//!
//! ## Lifecycle
//!
//! Every attempt moves `Dispatched -> {Succeeded, Failed, TimedOut}` in the
//! [`core::AttemptTable`]. Completions and timeout timers race through the
//! same lock; exactly one outcome reaches [`core::Runners`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use staging_dispatch::builders::build_stagers;
//! use staging_dispatch::config::StagingConfig;
//! use staging_dispatch::dispatch::StagingCollaborators;
//! use staging_dispatch::runtime::TokioSpawner;
//!
//! let stagers = build_stagers(collaborators, Arc::new(TokioSpawner::current()), None)?;
//! let config = StagingConfig::from_env()?;
//!
//! stagers.validate_app(&app, &config)?;
//! let ticket = stagers.stager_for_app(&app, &config).stage().await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders wiring the staging core together.
pub mod builders;
/// Completion handlers and the shared resolution path.
pub mod completion;
/// Configuration snapshot for staging decisions.
pub mod config;
/// Application model, validation, backend selection and attempt lifecycle.
pub mod core;
/// Dispatchers and the `Stagers` factory.
pub mod dispatch;
/// Infrastructure adapters for the bus, sinks, pools and catalogs.
pub mod infra;
/// Modern-fabric wire protocols.
pub mod protocol;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
