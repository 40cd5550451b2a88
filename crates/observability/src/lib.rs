//! Process-wide logging setup for the gateway binaries and tests.

pub mod logging;

pub use logging::LogFormat;

/// Initialize tracing with the format named by `SCHOOLGATE_LOG_FORMAT`
/// (`json` by default, `text` for local development).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
