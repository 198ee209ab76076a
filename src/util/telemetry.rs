//! Tracing setup for binaries and tests embedding the staging core.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "staging_dispatch=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (or [`DEFAULT_FILTER`]).
///
/// Does nothing if the host already installed a subscriber.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
