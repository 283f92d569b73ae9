use std::path::PathBuf;

use thiserror::Error;

use crate::parser::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request line did not yield method, target and protocol.
    #[error("malformed request line '{line}'")]
    MalformedRequestLine { line: String },

    #[error(transparent)]
    ParseGrammar(#[from] ParseError),

    #[error("unable to read '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Strict mode: the file had rejected records and was rolled back.
    #[error("'{}' had {count} rejected record(s), rolled back", path.display())]
    Rejected { path: PathBuf, count: usize },
}

/// Process exit codes. Command line usage errors exit with clap's own 2.
pub mod exit {
    pub const OK: i32 = 0;
    pub const FILES_FAILED: i32 = 1;
    pub const STORAGE_UNAVAILABLE: i32 = 3;
}
