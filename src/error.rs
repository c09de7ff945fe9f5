use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`Tamer`](crate::Tamer) handle.
///
/// Engine errors are carried unmodified in `source`; only the kind is added.
#[derive(Debug, Error)]
pub enum TamerError {
    #[error("couldn't connect to database {location}: {source}")]
    Connection {
        location: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("statement failed: {0}")]
    Statement(#[from] rusqlite::Error),
    #[error("database handle is closed")]
    ClosedHandle,
    #[error("couldn't create database folder {}: {source}", folder.display())]
    CreateFolder {
        folder: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't remove database file {}: {source}", path.display())]
    RemoveDatabase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid database layout: {0}")]
    Layout(String),
    #[error("'{column}' doesn't exist in '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("foreign keys violated in {0} row(s)")]
    ForeignKeyViolation(usize),
    #[error("operation requires a file-backed database")]
    InMemory,
}

impl TamerError {
    /// The engine error behind a connection or statement failure, if any.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            TamerError::Connection { source, .. } => Some(source),
            TamerError::Statement(source) => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TamerError {
    fn from(err: serde_json::Error) -> Self {
        TamerError::Layout(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TamerError>;
