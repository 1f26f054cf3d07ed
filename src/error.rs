use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TermInfoError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Host key error: {0}")]
    HostKeyError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ssh_key::Error> for TermInfoError {
    fn from(err: ssh_key::Error) -> Self {
        Self::HostKeyError(err.to_string())
    }
}

/// Why a key source contributed no trust.
///
/// Never fatal to the process; the evaluator logs it and moves on to the
/// next source.
#[derive(Error, Debug)]
pub enum KeySourceError {
    #[error("cannot read key source {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key source {path:?} is not a regular file")]
    NotAFile { path: PathBuf },

    #[error("malformed entry in {path:?} at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
