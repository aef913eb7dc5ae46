//! Logging configuration and initialization.

use tracing::Level;

use crate::cli::LogLevel;

/// Configure the tracing subscriber according to CLI verbosity flags.
///
/// Precedence:
/// 1. `quiet` forces WARN+.
/// 2. `-vv` => TRACE.
/// 3. `-v`  => DEBUG.
/// 4. Else INFO with optional `RUST_LOG` env filter overrides.
pub fn configure_logging(level: LogLevel) {
    use LogLevel::*;
    let max = match level {
        Warn => Level::WARN,
        Info => Level::INFO,
        Debug => Level::DEBUG,
        Trace => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_max_level(max)
        .init();
}
