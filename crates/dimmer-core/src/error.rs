//! Error types for dimmer-core.

use std::path::PathBuf;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dimmer-core.
///
/// The reconciliation state machine itself never fails; these cover the
/// configuration layer and the overlay backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file passed explicitly but not present.
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration validation failed.
    #[error("config validation failed:\n{}", .0.join("\n"))]
    ConfigValidation(Vec<String>),

    /// Overlay level outside the unit interval.
    #[error("overlay level must be between 0 and 1, got {0}")]
    InvalidLevel(f64),

    /// An `xprop` invocation exited unsuccessfully.
    #[error("xprop failed ({status}): {command}: {stderr}")]
    Xprop {
        command: String,
        status: String,
        stderr: String,
    },

    /// Filesystem or process I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
