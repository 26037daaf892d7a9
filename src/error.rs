use std::time::Duration;

use thiserror::Error;

/// Failure of a single platform probe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The platform API answered with an error.
    #[error("platform call failed: {0}")]
    Platform(String),

    /// The capability does not exist on this platform.
    #[error("not available on this platform: {0}")]
    Unavailable(String),

    /// A helper command could not be run or exited abnormally.
    #[error("command `{program}` failed: {reason}")]
    Command { program: String, reason: String },

    /// The probe did not resolve before its deadline.
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
