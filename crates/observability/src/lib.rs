//! Tracing subscriber setup shared by the binaries.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize process-wide logging from the environment.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env(), "info");
}
