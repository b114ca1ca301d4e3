//! Error types for bigbox-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for bigbox-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while merging, building or flashing firmware.
#[derive(Debug, Error)]
pub enum Error {
    /// The printer is running a job; nothing was touched.
    #[error("printer is busy")]
    BusyConflict,

    /// Another build/flash request holds the device.
    #[error("a build is already in progress")]
    BuildInProgress,

    /// The build tool ran but the expected artifact is missing.
    #[error("build failed: artifact {} does not exist", artifact.display())]
    BuildFailure { artifact: PathBuf },

    /// The flasher exited unsuccessfully.
    #[error("flashing failed ({})", describe_exit(*code))]
    FlashFailure { code: Option<i32> },

    /// IO error on a specific file.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External tool could not be located.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// External tool could not be launched or its output could not be read.
    #[error("failed to run {tool}: {message}")]
    ToolExec { tool: String, message: String },

    /// External tool exceeded the configured timeout and was killed.
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    /// No profile with this id exists in the requested location.
    #[error("profile not found: {id}{}", if *is_default { " (default)" } else { "" })]
    ProfileNotFound { id: String, is_default: bool },

    /// Profile failed validation.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Profile (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}
