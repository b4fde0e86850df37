//! Logging initialization and the in-process logger service

pub mod logger;

pub use logger::{LogEntry, LogLevel, Logger, DEFAULT_LOG_CAPACITY};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with standard configuration
///
/// `RUST_LOG` takes precedence; otherwise `level` is used. Returns `false`
/// if a global subscriber was already installed.
pub fn init_tracing(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
