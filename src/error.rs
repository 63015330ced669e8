//! Crate-wide error types.
//!
//! Only fatal conditions are represented here. Recoverable problems (unknown
//! metadata keys, malformed lines, duplicate pids, ...) are reported through
//! [`crate::Diagnostics`] and never abort a run.

use std::path::PathBuf;

use thiserror::Error;

pub type SmapsResult<T> = Result<T, SmapsError>;

#[derive(Debug, Error)]
pub enum SmapsError {
    #[error("{}: no such file", .0.display())]
    MissingInput(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: broken CSV: {reason}", path.display())]
    BrokenCsv { path: PathBuf, reason: String },

    #[error("unknown export mode: {0:?}")]
    UnknownMode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SmapsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
