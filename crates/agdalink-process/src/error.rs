use std::path::PathBuf;

/// Errors establishing or using a prover process session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// No executable in configuration and none found on PATH.
    #[error("no {program} executable found on PATH")]
    PathSearchFailed { program: String },

    /// The version probe ran but yielded no usable version string.
    #[error("cannot validate {path}: no version in probe output {output:?}")]
    ValidationFailed { path: PathBuf, output: String },

    /// Spawn or pipe I/O failure.
    #[error("process I/O error: {0}")]
    Process(#[from] std::io::Error),

    /// `subscribe` was called a second time on one session.
    #[error("session already has a subscriber")]
    AlreadySubscribed,

    /// The session was closed.
    #[error("session is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
