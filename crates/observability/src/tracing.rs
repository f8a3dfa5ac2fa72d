//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global JSON subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Re-initialization
/// attempts are ignored rather than treated as errors, so tests and embedded
/// callers can all call this unconditionally.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
