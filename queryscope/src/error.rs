// queryscope/src/error.rs
//
// Library error type. The analysis core is infallible; everything that can
// fail lives at the source boundary (file reads, record decoding), in
// configuration loading, or in writing outputs.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path} (line {line}): {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown data version: {0} (expected diag_2012, storm_2013 or diag_2014)")]
    UnknownVersion(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("failed to encode output record: {0}")]
    Encode(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }
}
