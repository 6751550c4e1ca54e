//! # Sluicegate
//!
//! Versioned SQL migration runner for PostgreSQL, built on coroutine-based
//! `may_postgres` connections.
//!
//! Migration scripts named `V<version>__<description>.sql` are discovered in
//! a directory, ordered numerically, and applied one per transaction. Every
//! outcome is recorded in a Flyway-compatible history table so reruns skip
//! work that is already done. Failures whose error text matches a benign
//! pattern are recorded as skipped instead of aborting the run.
//!
//! The [`handler`] module is the top-level entry point: it accepts an event
//! describing one of the run, query, history, or fix modes and returns a
//! JSON-serializable response.

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod handler;
pub mod migration;
pub mod transaction;

#[cfg(test)]
pub mod testing;

pub use config::{AppConfig, DatabaseConfig, RunnerConfig};
pub use connection::{connect, ConnectionError};
pub use error::MigrationError;
pub use executor::{DbError, PgExecutor, SqlExecutor, SqlParam, SqlRow};
pub use handler::{handle, MigrationEvent, MigrationResponse};
pub use migration::{HistoryStore, Migrator, RunSummary};
pub use transaction::{Transaction, TransactionError};
