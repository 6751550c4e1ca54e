//! Migration history table access.
//!
//! The history lives in a Flyway-compatible `flyway_schema_history` table
//! inside a configurable schema. All statements go through the executor
//! seam, so the store works identically inside and outside a transaction.

use crate::executor::{DbError, SqlExecutor, SqlParam};
use crate::migration::record::HistoryRecord;
use std::collections::HashMap;

/// Applied migrations keyed by version string, with the stored checksum
pub type AppliedSet = HashMap<String, i32>;

/// Access to the migration history table
#[derive(Debug, Clone)]
pub struct HistoryStore {
    schema: String,
}

impl HistoryStore {
    /// Create a store for the history table in the given schema
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// Schema that owns the history table
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Schema-qualified history table name
    pub fn qualified_table(&self) -> String {
        format!("{}.flyway_schema_history", self.schema)
    }

    /// Create the schema and history table if they do not exist
    ///
    /// Idempotent. Identifiers cannot be bound as parameters, so the schema
    /// name is interpolated from configuration.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if either DDL statement fails.
    pub fn ensure_schema(&self, executor: &dyn SqlExecutor) -> Result<(), DbError> {
        let create_schema_sql = format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema);
        executor.execute(&create_schema_sql, &[])?;

        let create_table_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                installed_rank INT PRIMARY KEY,
                version VARCHAR(50),
                description VARCHAR(200),
                type VARCHAR(20),
                script VARCHAR(1000),
                checksum INTEGER,
                installed_by VARCHAR(100),
                installed_on TIMESTAMP DEFAULT NOW(),
                execution_time INTEGER,
                success BOOLEAN
            )",
            self.qualified_table()
        );
        executor.execute(&create_table_sql, &[])?;

        Ok(())
    }

    /// Load the set of successfully applied migrations
    ///
    /// Only rows with `success = true` count; a failed row never blocks a
    /// later retry of the same version.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails or a row is malformed.
    pub fn load_applied(&self, executor: &dyn SqlExecutor) -> Result<AppliedSet, DbError> {
        let sql = format!(
            "SELECT version, checksum FROM {} WHERE success = true",
            self.qualified_table()
        );
        let rows = executor.query(&sql, &[])?;

        let mut applied = AppliedSet::with_capacity(rows.len());
        for row in &rows {
            applied.insert(row.try_string(0)?, row.try_i32(1)?);
        }

        Ok(applied)
    }

    /// Append one record to the history
    ///
    /// `installed_on` is left to the database default so history timestamps
    /// come from a single clock.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the insert fails.
    pub fn append(&self, executor: &dyn SqlExecutor, record: &HistoryRecord) -> Result<(), DbError> {
        let sql = format!(
            "INSERT INTO {} (installed_rank, version, description, type, script, checksum, installed_by, execution_time, success) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.qualified_table()
        );

        let params = [
            SqlParam::Int(record.installed_rank),
            SqlParam::Text(record.version.clone()),
            SqlParam::Text(record.description.clone()),
            SqlParam::Text(record.migration_type.clone()),
            SqlParam::Text(record.script.clone()),
            SqlParam::Int(record.checksum),
            SqlParam::Text(record.installed_by.clone()),
            SqlParam::Int(record.execution_time_ms),
            SqlParam::Bool(record.success),
        ];

        executor.execute(&sql, &params)?;
        Ok(())
    }

    /// Load the full history ordered by rank
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails or a row is malformed.
    pub fn list_all(&self, executor: &dyn SqlExecutor) -> Result<Vec<HistoryRecord>, DbError> {
        let sql = format!(
            "SELECT installed_rank, version, description, type, script, checksum, installed_by, installed_on, execution_time, success \
             FROM {} ORDER BY installed_rank",
            self.qualified_table()
        );

        let rows = executor.query(&sql, &[])?;
        rows.iter().map(HistoryRecord::from_row).collect()
    }
}
