//! Execution errors

use std::path::PathBuf;

/// Errors raised while driving the external binary
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The binary failed to start
    #[error("error spawning {executable}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A runlist export or similar write failed
    #[error("io {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
