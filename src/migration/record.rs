//! History record for the `flyway_schema_history` table

use crate::executor::{DbError, SqlRow};
use crate::migration::catalog::MigrationFile;
use chrono::{DateTime, Utc};

/// `installed_by` value for migrations applied normally
pub const INSTALLED_BY_APPLIED: &str = "automated";

/// `installed_by` value for migrations recorded after a benign failure
pub const INSTALLED_BY_SKIPPED: &str = "automated-skipped";

/// The only migration type this runner produces
pub const MIGRATION_TYPE_SQL: &str = "SQL";

/// One row of the migration history table
///
/// Matches the Flyway-compatible schema: rank is the primary key, version and
/// checksum identify the script, and the bookkeeping columns record who
/// applied it, when, and how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub installed_rank: i32,
    pub version: String,
    pub description: String,
    pub migration_type: String,
    pub script: String,
    pub checksum: i32,
    pub installed_by: String,
    pub installed_on: DateTime<Utc>,
    pub execution_time_ms: i32,
    pub success: bool,
}

impl HistoryRecord {
    /// Record for a migration that ran and committed normally
    #[must_use]
    pub fn applied(
        installed_rank: i32,
        file: &MigrationFile,
        checksum: i32,
        execution_time_ms: i32,
    ) -> Self {
        Self {
            installed_rank,
            version: file.version.clone(),
            description: file.description.clone(),
            migration_type: MIGRATION_TYPE_SQL.to_string(),
            script: file.filename.clone(),
            checksum,
            installed_by: INSTALLED_BY_APPLIED.to_string(),
            installed_on: Utc::now(),
            execution_time_ms,
            success: true,
        }
    }

    /// Record for a migration whose failure was classified as already-applied
    ///
    /// The script did not run to completion, so no execution time is claimed
    /// and the `installed_by` column marks the row as a classification result
    /// rather than a real application.
    #[must_use]
    pub fn skip_classified(installed_rank: i32, file: &MigrationFile, checksum: i32) -> Self {
        Self {
            installed_rank,
            version: file.version.clone(),
            description: file.description.clone(),
            migration_type: MIGRATION_TYPE_SQL.to_string(),
            script: file.filename.clone(),
            checksum,
            installed_by: INSTALLED_BY_SKIPPED.to_string(),
            installed_on: Utc::now(),
            execution_time_ms: 0,
            success: true,
        }
    }

    /// Create a `HistoryRecord` from a decoded row
    ///
    /// Expected column order: `installed_rank`, `version`, `description`,
    /// `type`, `script`, `checksum`, `installed_by`, `installed_on`,
    /// `execution_time`, `success`
    ///
    /// # Errors
    ///
    /// Returns `DbError` if a cell has the wrong shape or the timestamp does
    /// not parse.
    pub fn from_row(row: &SqlRow) -> Result<Self, DbError> {
        let installed_rank = row.try_i32(0)?;
        let version = row.try_string(1)?;
        let description = row.try_string(2)?;
        let migration_type = row.try_string(3)?;
        let script = row.try_string(4)?;
        let checksum = row.try_i32(5)?;
        let installed_by = row.try_string(6)?;

        // TIMESTAMP cells are decoded as strings; accept the formats the
        // driver and the database are known to produce
        let installed_on_str = row.try_string(7)?;
        let installed_on = {
            if let Ok(naive) =
                chrono::NaiveDateTime::parse_from_str(&installed_on_str, "%Y-%m-%d %H:%M:%S%.f")
            {
                naive.and_utc()
            } else if let Ok(naive) =
                chrono::NaiveDateTime::parse_from_str(&installed_on_str, "%Y-%m-%d %H:%M:%S")
            {
                naive.and_utc()
            } else if let Ok(naive) =
                chrono::NaiveDateTime::parse_from_str(&installed_on_str, "%Y-%m-%dT%H:%M:%S%.f")
            {
                naive.and_utc()
            } else if let Ok(naive) =
                chrono::NaiveDateTime::parse_from_str(&installed_on_str, "%Y-%m-%dT%H:%M:%S")
            {
                naive.and_utc()
            } else {
                return Err(DbError::Parse(format!(
                    "Failed to parse timestamp '{installed_on_str}': unrecognized format"
                )));
            }
        };

        let execution_time_ms = row.try_i32(8)?;
        let success = row.try_bool(9)?;

        Ok(Self {
            installed_rank,
            version,
            description,
            migration_type,
            script,
            checksum,
            installed_by,
            installed_on,
            execution_time_ms,
            success,
        })
    }
}
