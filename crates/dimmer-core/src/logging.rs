//! Logging setup using tracing.
//!
//! The daemon and the one-shot CLI commands share this initialization so
//! `-v` means the same thing everywhere. `RUST_LOG` directives still apply
//! on top of the verbosity-derived default.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Map the number of `-v` flags to a maximum log level.
///
/// 0=warn, 1=info, 2=debug, 3+=trace.
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
///
/// # Example
/// ```
/// dimmer_core::logging::init(2); // debug level
/// ```
pub fn init(verbosity: u8) {
    let filter =
        EnvFilter::from_default_env().add_directive(level_for_verbosity(verbosity).into());

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
