//! Error taxonomy for Wingline pipelines.

use std::path::PathBuf;

/// The error kinds a Wingline pipeline can surface.
///
/// This is a taxonomy, not an implementation detail: every variant
/// here corresponds to a named failure mode a caller can match on,
/// rather than an opaque wrapper around whatever library raised it.
#[derive(Debug, thiserror::Error)]
pub enum WinglineError {
    /// No container/format combination could be determined for a path.
    #[error("unrecognized filetype for {0}")]
    UnrecognizedFiletype(PathBuf),

    /// A writer was opened against a path that already exists.
    #[error("path already exists: {0}")]
    PathExists(PathBuf),

    /// A reader was opened against a path that doesn't exist.
    #[error("source does not exist: {0}")]
    NonexistentSource(PathBuf),

    /// Caching was requested on a stage descending from a non-deterministic
    /// source, so it has no content hash to key a cache entry on.
    #[error("cache requested on stage `{0}` with no content hash")]
    HashUnavailable(String),

    /// The graph (or builder) was mutated, started, or re-iterated after
    /// it had already been started once.
    #[error("pipeline already started")]
    AlreadyStarted,

    /// A user-supplied `process` closure raised.
    #[error("stage `{stage}` failed: {source}")]
    StageFailure {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    /// A queue wait exceeded its bounded poll. This should never occur in
    /// normal use; it exists purely so the abort-responsiveness polling
    /// has a typed failure to report if something upstream is truly stuck.
    #[error("queue operation timed out")]
    QueueTimeout,

    /// Non-pipeline I/O failure (reading/writing files, temp directories).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded in the requested format.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl WinglineError {
    /// Wrap an arbitrary user error as a [`WinglineError::StageFailure`].
    pub fn stage_failure(stage: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        WinglineError::StageFailure {
            stage: stage.into(),
            source: source.into(),
        }
    }
}
