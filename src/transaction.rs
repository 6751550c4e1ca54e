//! Transaction support for the migration runner.
//!
//! Each migration script runs inside a flat transaction: `BEGIN`, the script
//! body, the history insert, then `COMMIT`. Rollback discards both the script
//! effects and the pending history row. The transaction wraps any
//! [`SqlExecutor`], so transactional code paths can be exercised without a
//! live server.

use crate::executor::{DbError, SqlExecutor, SqlParam, SqlRow};
use std::fmt;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// Execution error from the underlying executor
    Db(DbError),
    /// Transaction already committed or rolled back
    TransactionClosed,
    /// Other transaction errors
    Other(String),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Db(e) => {
                write!(f, "{e}")
            }
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
            TransactionError::Other(s) => {
                write!(f, "Transaction error: {s}")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<DbError> for TransactionError {
    fn from(err: DbError) -> Self {
        TransactionError::Db(err)
    }
}

impl From<TransactionError> for DbError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Db(e) => e,
            TransactionError::TransactionClosed => {
                DbError::Other("Transaction closed".to_string())
            }
            TransactionError::Other(s) => DbError::Other(s),
        }
    }
}

/// A flat database transaction over an executor
///
/// All statements issued through the transaction happen between `BEGIN` and
/// the final `COMMIT`/`ROLLBACK` on the same connection. After closing, the
/// transaction rejects further operations.
pub struct Transaction<'a> {
    executor: &'a dyn SqlExecutor,
    closed: bool,
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<'a> Transaction<'a> {
    /// Start a new transaction on the given executor
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if the `BEGIN` statement fails.
    pub fn begin(executor: &'a dyn SqlExecutor) -> Result<Self, TransactionError> {
        executor
            .execute("BEGIN", &[])
            .map_err(TransactionError::from)?;

        Ok(Self {
            executor,
            closed: false,
        })
    }

    /// Commit the transaction
    ///
    /// All changes made within the transaction are permanently saved. After
    /// committing, the transaction is closed and cannot be used further.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been committed or
    /// rolled back, or if the `COMMIT` statement fails.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        self.executor
            .execute("COMMIT", &[])
            .map_err(TransactionError::from)?;

        self.closed = true;
        Ok(())
    }

    /// Rollback the transaction
    ///
    /// All changes made within the transaction are discarded. After rolling
    /// back, the transaction is closed and cannot be used further.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been committed or
    /// rolled back, or if the `ROLLBACK` statement fails.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        self.executor
            .execute("ROLLBACK", &[])
            .map_err(TransactionError::from)?;

        self.closed = true;
        Ok(())
    }

    /// Check if the transaction is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SqlExecutor for Transaction<'_> {
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.query(sql, params)
    }

    fn batch(&self, sql: &str) -> Result<(), DbError> {
        if self.closed {
            return Err(DbError::Other("Transaction is closed".to_string()));
        }
        self.executor.batch(sql)
    }
}
