//! Migration-specific error types

use crate::connection::ConnectionError;
use crate::executor::DbError;
use crate::transaction::TransactionError;

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// Database execution error
    Database(DbError),
    /// Connection establishment error
    Connection(ConnectionError),
    /// Migration source or script not found / unreadable
    FileNotFound(String),
    /// Version digits in a migration file name exceed the supported numeric range
    InvalidVersion { filename: String },
    /// Two catalog files share the same numeric version
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },
    /// Migration failed during execution and was not classified as benign
    ExecutionFailed {
        version: String,
        script: String,
        error: String,
    },
    /// History bookkeeping failed while recording a classified-benign skip
    HistoryAppend { version: String, error: String },
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::Database(e) => write!(f, "Database error: {}", e),
            MigrationError::Connection(e) => write!(f, "Connection failed: {}", e),
            MigrationError::FileNotFound(msg) => write!(f, "Migration source error: {}", msg),
            MigrationError::InvalidVersion { filename } => {
                write!(
                    f,
                    "Migration file '{}' has a version outside the supported numeric range",
                    filename
                )
            }
            MigrationError::DuplicateVersion {
                version,
                first,
                second,
            } => {
                write!(
                    f,
                    "Duplicate migration version {}: '{}' and '{}'.\n\
                     Each migration must carry a unique version number; rename one of the files.",
                    version, first, second
                )
            }
            MigrationError::ExecutionFailed {
                version,
                script,
                error,
            } => {
                write!(
                    f,
                    "Migration V{} ({}) failed during execution: {}",
                    version, script, error
                )
            }
            MigrationError::HistoryAppend { version, error } => {
                write!(
                    f,
                    "Failed to record history for V{}: {}\n\
                     The migration outcome was classified benign but could not be bookkept; \
                     the run cannot continue safely.",
                    version, error
                )
            }
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<DbError> for MigrationError {
    fn from(error: DbError) -> Self {
        MigrationError::Database(error)
    }
}

impl From<ConnectionError> for MigrationError {
    fn from(error: ConnectionError) -> Self {
        MigrationError::Connection(error)
    }
}

impl From<TransactionError> for MigrationError {
    fn from(error: TransactionError) -> Self {
        MigrationError::Database(error.into())
    }
}
