//! Read-only inspection and one-off maintenance operations.
//!
//! These paths never create the history schema or table. Inspecting an
//! environment must not mutate it, so a missing history table surfaces as a
//! query error instead of being silently bootstrapped.

use crate::error::MigrationError;
use crate::executor::{SqlExecutor, SqlRow};
use crate::migration::history::HistoryStore;
use crate::migration::source::ScriptSource;
use log::info;

/// Fetch the applied-migration overview from the history table
///
/// Returns one row per successfully applied migration with `version`,
/// `description`, `checksum` and `installed_on`, ordered by rank.
///
/// # Errors
///
/// Returns `MigrationError` if the query fails, including when the history
/// table does not exist yet.
pub fn fetch_history(
    executor: &dyn SqlExecutor,
    store: &HistoryStore,
) -> Result<Vec<SqlRow>, MigrationError> {
    let sql = format!(
        "SELECT version, description, checksum, installed_on FROM {} \
         WHERE success = true ORDER BY installed_rank",
        store.qualified_table()
    );
    Ok(executor.query(&sql, &[])?)
}

/// Run an arbitrary read query and return the decoded rows
///
/// # Errors
///
/// Returns `MigrationError` if the query fails.
pub fn run_query(executor: &dyn SqlExecutor, sql: &str) -> Result<Vec<SqlRow>, MigrationError> {
    Ok(executor.query(sql, &[])?)
}

/// Run a named maintenance script outside the versioned pipeline
///
/// The script is read from the source and executed as a batch. It is not
/// recorded in the migration history.
///
/// # Errors
///
/// Returns `MigrationError` if the script is missing or its execution fails.
pub fn run_fix(
    executor: &dyn SqlExecutor,
    source: &dyn ScriptSource,
    script: &str,
) -> Result<(), MigrationError> {
    info!("Running fix script {script}");
    let content = source.read(script)?;
    executor.batch(&content)?;
    Ok(())
}
