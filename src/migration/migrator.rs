//! Migrator - core migration run engine
//!
//! Discovers versioned scripts, compares them against the history table, and
//! applies anything pending in version order. Each script runs inside its own
//! transaction together with its history insert, so a failure leaves no
//! half-recorded state. Failures whose message matches a benign pattern are
//! recorded as already-applied and the run continues.

use crate::config::RunnerConfig;
use crate::error::MigrationError;
use crate::executor::{DbError, SqlExecutor};
use crate::migration::catalog::{build_catalog, MigrationFile};
use crate::migration::checksum::checksum_of;
use crate::migration::classify::{ErrorClassifier, FailureKind};
use crate::migration::history::HistoryStore;
use crate::migration::record::HistoryRecord;
use crate::migration::source::{DirScriptSource, ScriptSource};
use crate::transaction::Transaction;
use log::{error, info, warn};
use std::time::Instant;

/// Counters for one migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Scripts that ran and committed
    pub applied: usize,
    /// Scripts skipped, either already in the history or recorded after a
    /// benign failure
    pub skipped: usize,
    /// Final installed rank after the run. Under the single-writer model
    /// this equals the number of history rows.
    pub total: i32,
}

/// What happened to one script inside its transaction
enum ApplyOutcome {
    Committed { execution_time_ms: i32 },
    RolledBack { error: String },
}

/// Core migration run engine
pub struct Migrator {
    source: Box<dyn ScriptSource>,
    history: HistoryStore,
    classifier: ErrorClassifier,
}

impl Migrator {
    /// Create a migrator from its parts
    pub fn new(
        source: Box<dyn ScriptSource>,
        history: HistoryStore,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            source,
            history,
            classifier,
        }
    }

    /// Create a migrator from runner configuration
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(
            Box::new(DirScriptSource::new(&config.migrations_dir)),
            HistoryStore::new(config.history_schema.clone()),
            ErrorClassifier::new(config.benign_patterns.clone()),
        )
    }

    /// Run all pending migrations
    ///
    /// Ensures the history table exists, loads the applied set, then walks
    /// the catalog in version order. Already-applied versions are skipped by
    /// membership on the version string alone; stored checksums are carried
    /// in the applied set but not compared. Ranks continue from the size of
    /// the applied set, so every processed script consumes exactly one rank
    /// whether it committed or was recorded after a benign failure.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` on catalog problems, fatal script failures,
    /// rollback failures, or a failed history append after a benign failure.
    pub fn run(&self, executor: &dyn SqlExecutor) -> Result<RunSummary, MigrationError> {
        self.history.ensure_schema(executor)?;

        let applied = self.history.load_applied(executor)?;
        info!("Current state: {} migrations applied", applied.len());

        let catalog = build_catalog(self.source.as_ref())?;
        info!("Found {} migration files", catalog.len());

        let mut next_rank = applied.len() as i32;
        let mut applied_count = 0;
        let mut skipped_count = 0;

        for file in &catalog {
            if applied.contains_key(&file.version) {
                info!("Skipping V{}: already applied", file.version);
                skipped_count += 1;
                continue;
            }

            let content = self.source.read(&file.filename)?;
            let checksum = checksum_of(&content);

            info!("Applying V{}: {}", file.version, file.description);
            match self.apply_in_transaction(executor, file, &content, checksum, next_rank + 1)? {
                ApplyOutcome::Committed { execution_time_ms } => {
                    next_rank += 1;
                    applied_count += 1;
                    info!("Applied V{} ({execution_time_ms}ms)", file.version);
                }
                ApplyOutcome::RolledBack { error: cause } => {
                    match self.classifier.classify(&cause) {
                        FailureKind::Benign => {
                            warn!(
                                "V{} already applied or blocked by schema state, marking as applied",
                                file.version
                            );
                            next_rank += 1;
                            let record =
                                HistoryRecord::skip_classified(next_rank, file, checksum);
                            self.history.append(executor, &record).map_err(|e| {
                                MigrationError::HistoryAppend {
                                    version: file.version.clone(),
                                    error: e.to_string(),
                                }
                            })?;
                            skipped_count += 1;
                        }
                        FailureKind::Fatal => {
                            error!("Failed V{}: {cause}", file.version);
                            return Err(MigrationError::ExecutionFailed {
                                version: file.version.clone(),
                                script: file.filename.clone(),
                                error: cause,
                            });
                        }
                    }
                }
            }
        }

        info!(
            "Migration run complete: {applied_count} applied, {skipped_count} skipped, {next_rank} total"
        );

        Ok(RunSummary {
            applied: applied_count,
            skipped: skipped_count,
            total: next_rank,
        })
    }

    /// Run one script and its history insert inside a transaction
    ///
    /// Any failure between `BEGIN` and `COMMIT` rolls the transaction back
    /// and surfaces the original error for classification. A rollback that
    /// itself fails is returned as a hard error, since the connection state
    /// is unknown at that point.
    fn apply_in_transaction(
        &self,
        executor: &dyn SqlExecutor,
        file: &MigrationFile,
        content: &str,
        checksum: i32,
        rank: i32,
    ) -> Result<ApplyOutcome, MigrationError> {
        let start = Instant::now();

        let tx = match Transaction::begin(executor) {
            Ok(tx) => tx,
            Err(e) => return Self::roll_back_connection(executor, e.to_string()),
        };

        if let Err(e) = tx.batch(content) {
            return Self::roll_back(tx, e);
        }

        let execution_time_ms = start.elapsed().as_millis() as i32;
        let record = HistoryRecord::applied(rank, file, checksum, execution_time_ms);

        if let Err(e) = self.history.append(&tx, &record) {
            return Self::roll_back(tx, e);
        }

        if let Err(e) = tx.commit() {
            return Self::roll_back_connection(executor, e.to_string());
        }

        Ok(ApplyOutcome::Committed { execution_time_ms })
    }

    /// Roll back an open transaction and keep the original cause
    fn roll_back(tx: Transaction<'_>, cause: DbError) -> Result<ApplyOutcome, MigrationError> {
        tx.rollback().map_err(MigrationError::from)?;
        Ok(ApplyOutcome::RolledBack {
            error: cause.to_string(),
        })
    }

    /// Roll back on the bare connection after `BEGIN` or `COMMIT` failed
    fn roll_back_connection(
        executor: &dyn SqlExecutor,
        cause: String,
    ) -> Result<ApplyOutcome, MigrationError> {
        executor
            .execute("ROLLBACK", &[])
            .map_err(MigrationError::from)?;
        Ok(ApplyOutcome::RolledBack { error: cause })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::record::{INSTALLED_BY_APPLIED, INSTALLED_BY_SKIPPED};
    use crate::testing::{FakeExecutor, MemoryScriptSource};

    fn migrator(source: MemoryScriptSource) -> Migrator {
        Migrator::new(
            Box::new(source),
            HistoryStore::new("sluicegate"),
            ErrorClassifier::default(),
        )
    }

    fn three_scripts() -> MemoryScriptSource {
        MemoryScriptSource::new()
            .add("V1__create_core_schema.sql", "CREATE TABLE partners (id SERIAL PRIMARY KEY);")
            .add("V2__add_partner_status.sql", "ALTER TABLE partners ADD COLUMN status VARCHAR(20);")
            .add("V3__seed_reference_data.sql", "INSERT INTO partners (status) VALUES ('active');")
    }

    /// First word of every statement sent through `execute`
    fn verbs(fake: &FakeExecutor) -> Vec<String> {
        fake.executed_sql()
            .iter()
            .map(|s| s.split_whitespace().next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_fresh_database_applies_everything() {
        let fake = FakeExecutor::new();
        let summary = migrator(three_scripts()).run(&fake).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                applied: 3,
                skipped: 0,
                total: 3
            }
        );

        // Every script body went through the batch path, in version order
        let batches = fake.batches();
        assert_eq!(batches.len(), 3);
        assert!(batches[0].contains("CREATE TABLE partners"));
        assert!(batches[2].contains("INSERT INTO partners"));

        let rows = fake.applied_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].installed_rank, 1);
        assert_eq!(rows[1].installed_rank, 2);
        assert_eq!(rows[2].installed_rank, 3);
        assert!(rows.iter().all(|r| r.installed_by == INSTALLED_BY_APPLIED));
        assert!(rows.iter().all(|r| r.success));
    }

    #[test]
    fn test_each_script_is_applied_atomically() {
        let fake = FakeExecutor::new();
        migrator(three_scripts()).run(&fake).unwrap();

        assert_eq!(
            verbs(&fake),
            vec![
                "CREATE", "CREATE", // schema + history table
                "BEGIN", "INSERT", "COMMIT", // V1
                "BEGIN", "INSERT", "COMMIT", // V2
                "BEGIN", "INSERT", "COMMIT", // V3
            ]
        );
    }

    #[test]
    fn test_already_applied_versions_are_skipped_by_membership() {
        let fake = FakeExecutor::new();
        fake.seed_applied("1", 111);

        let summary = migrator(three_scripts()).run(&fake).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                applied: 2,
                skipped: 1,
                total: 3
            }
        );

        // V1 never ran again; ranks continue from the applied set size
        let batches = fake.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches[0].contains("ALTER TABLE partners"));

        let rows = fake.applied_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].version, "2");
        assert_eq!(rows[1].installed_rank, 2);
        assert_eq!(rows[2].version, "3");
        assert_eq!(rows[2].installed_rank, 3);
    }

    #[test]
    fn test_benign_failure_is_recorded_and_run_continues() {
        let fake = FakeExecutor::new().fail_batch(
            "ADD COLUMN status",
            "column \"status\" of relation \"partners\" already exists",
        );

        let summary = migrator(three_scripts()).run(&fake).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                applied: 2,
                skipped: 1,
                total: 3
            }
        );

        // The skip record is written outside any transaction, after rollback
        assert_eq!(
            verbs(&fake),
            vec![
                "CREATE", "CREATE",
                "BEGIN", "INSERT", "COMMIT", // V1
                "BEGIN", "ROLLBACK", "INSERT", // V2 failed, rolled back, recorded
                "BEGIN", "INSERT", "COMMIT", // V3
            ]
        );

        let rows = fake.applied_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].version, "2");
        assert_eq!(rows[1].installed_by, INSTALLED_BY_SKIPPED);
        assert_eq!(rows[1].execution_time_ms, 0);
        assert_eq!(rows[1].installed_rank, 2);
        assert!(rows[1].success);
        assert_eq!(rows[2].installed_rank, 3);
    }

    #[test]
    fn test_fatal_failure_stops_the_run() {
        let fake = FakeExecutor::new()
            .fail_batch("ADD COLUMN status", "syntax error at or near \"COLLUMN\"");

        let err = migrator(three_scripts()).run(&fake).unwrap_err();
        match err {
            MigrationError::ExecutionFailed { version, script, error } => {
                assert_eq!(version, "2");
                assert_eq!(script, "V2__add_partner_status.sql");
                assert!(error.contains("syntax error"));
            }
            other => panic!("expected ExecutionFailed, got {other}"),
        }

        // V3 was never attempted and only V1 made it into the history
        assert_eq!(fake.batches().len(), 2);
        let rows = fake.applied_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version, "1");
    }

    #[test]
    fn test_failed_history_append_after_benign_failure_is_fatal() {
        let source = MemoryScriptSource::new()
            .add("V1__create_core_schema.sql", "CREATE TABLE partners (id INT);");
        let fake = FakeExecutor::new()
            .fail_batch("CREATE TABLE partners", "relation \"partners\" already exists")
            .fail_execute("INSERT INTO", "connection lost");

        let err = migrator(source).run(&fake).unwrap_err();
        match err {
            MigrationError::HistoryAppend { version, error } => {
                assert_eq!(version, "1");
                assert!(error.contains("connection lost"));
            }
            other => panic!("expected HistoryAppend, got {other}"),
        }
    }

    #[test]
    fn test_failed_rollback_bypasses_classification() {
        let source = MemoryScriptSource::new()
            .add("V1__create_core_schema.sql", "CREATE TABLE partners (id INT);");
        let fake = FakeExecutor::new()
            .fail_batch("CREATE TABLE partners", "relation \"partners\" already exists")
            .fail_execute("ROLLBACK", "terminating connection due to administrator command");

        // The script error alone would be benign, but the rollback failure
        // leaves the connection state unknown
        let err = migrator(source).run(&fake).unwrap_err();
        assert!(matches!(err, MigrationError::Database(_)));
        assert!(err.to_string().contains("terminating connection"));
        assert!(fake.applied_rows().is_empty());
    }

    #[test]
    fn test_failed_commit_rolls_back_and_keeps_history_clean() {
        let source = MemoryScriptSource::new()
            .add("V1__create_core_schema.sql", "CREATE TABLE partners (id INT);");
        let fake = FakeExecutor::new().fail_execute("COMMIT", "connection lost before commit");

        let err = migrator(source).run(&fake).unwrap_err();
        assert!(matches!(err, MigrationError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("connection lost before commit"));

        // The in-transaction insert must not survive the failed commit
        assert!(fake.applied_rows().is_empty());
        let v = verbs(&fake);
        assert_eq!(&v[v.len() - 2..], &["COMMIT", "ROLLBACK"]);
    }

    #[test]
    fn test_failed_begin_goes_through_classification() {
        let source = MemoryScriptSource::new()
            .add("V1__create_core_schema.sql", "CREATE TABLE partners (id INT);");
        let fake = FakeExecutor::new().fail_execute("BEGIN", "too many connections");

        let err = migrator(source).run(&fake).unwrap_err();
        assert!(matches!(err, MigrationError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("too many connections"));

        // Rollback was still issued on the bare connection
        let v = verbs(&fake);
        assert_eq!(&v[v.len() - 2..], &["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let fake = FakeExecutor::new();
        let runner = migrator(three_scripts());

        runner.run(&fake).unwrap();
        let second = runner.run(&fake).unwrap();

        assert_eq!(
            second,
            RunSummary {
                applied: 0,
                skipped: 3,
                total: 3
            }
        );
        // Nothing executed a second time
        assert_eq!(fake.batches().len(), 3);
        assert_eq!(fake.applied_rows().len(), 3);
    }

    #[test]
    fn test_rank_continues_from_applied_set_size() {
        let fake = FakeExecutor::new();
        // A version recorded in the history but absent from the catalog
        // still counts toward the starting rank
        fake.seed_applied("9", 999);

        let source =
            MemoryScriptSource::new().add("V1__create_core_schema.sql", "SELECT 1;");
        let summary = migrator(source).run(&fake).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                applied: 1,
                skipped: 0,
                total: 2
            }
        );
        let rows = fake.applied_rows();
        assert_eq!(rows.last().unwrap().installed_rank, 2);
    }

    #[test]
    fn test_versions_run_in_numeric_order() {
        let source = MemoryScriptSource::new()
            .add("V10__ten.sql", "SELECT 10;")
            .add("V2__two.sql", "SELECT 2;")
            .add("V1__one.sql", "SELECT 1;");
        let fake = FakeExecutor::new();

        migrator(source).run(&fake).unwrap();

        let rows = fake.applied_rows();
        let versions: Vec<&str> = rows.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_duplicate_versions_fail_before_any_script_runs() {
        let source = MemoryScriptSource::new()
            .add("V3__first_take.sql", "SELECT 1;")
            .add("V3__second_take.sql", "SELECT 2;");
        let fake = FakeExecutor::new();

        let err = migrator(source).run(&fake).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateVersion { .. }));
        assert!(fake.batches().is_empty());
        // Only the schema bootstrap ran
        assert_eq!(verbs(&fake), vec!["CREATE", "CREATE"]);
    }

    #[test]
    fn test_empty_catalog_still_bootstraps_history() {
        let fake = FakeExecutor::new();
        let summary = migrator(MemoryScriptSource::new()).run(&fake).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                applied: 0,
                skipped: 0,
                total: 0
            }
        );
        assert_eq!(verbs(&fake), vec!["CREATE", "CREATE"]);
    }

    #[test]
    fn test_non_matching_files_are_ignored() {
        let source = MemoryScriptSource::new()
            .add("V1__one.sql", "SELECT 1;")
            .add("fix_partners.sql", "UPDATE partners SET status = 'active';")
            .add("README.md", "notes");
        let fake = FakeExecutor::new();

        let summary = migrator(source).run(&fake).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(fake.batches().len(), 1);
    }

    #[test]
    fn test_missing_script_content_is_fatal() {
        let source = MemoryScriptSource::new().with_listed_but_unreadable("V1__ghost.sql");
        let fake = FakeExecutor::new();

        let err = migrator(source).run(&fake).unwrap_err();
        assert!(matches!(err, MigrationError::FileNotFound(_)));
    }
}
