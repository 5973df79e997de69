//! Tracing bootstrap for embedders without their own subscriber.

use tracing_subscriber::EnvFilter;

/// Install an env-filtered fmt subscriber if none is set yet, defaulting
/// to `chime=info` so job lifecycle logs appear without `RUST_LOG`.
///
/// Embedders running their own subscriber keep it: this helper backs off
/// when a dispatcher is already registered.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chime=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
