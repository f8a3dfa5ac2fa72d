//! Shared observability setup for stocktill binaries.

/// Initialize process-wide tracing/logging.
///
/// Idempotent; calling it again after the first successful init is a no-op.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
