//! Process-wide tracing setup shared by the API and worker binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing for `service` in the given output format.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(service: &'static str, format: LogFormat) {
    tracing::init(service, format);
}
