//! Ledger error types
//!
//! Two kinds of failure reach callers: rejected input (`Validation`) and
//! storage that could not be opened, read or written (`Storage`).

use crate::schema::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Storage-layer failure. Fatal to the operation that raised it.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database file could not be opened
    #[error("cannot open ledger database {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Statement, transaction or commit failed
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row does not decode into a movement
    #[error("corrupt row id={id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

/// Error returned by every ledger store operation
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::Validation(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(StorageError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
