//! In-memory test doubles for the executor seam and script source.
//!
//! `FakeExecutor` speaks just enough SQL to stand in for the history table:
//! it tracks transaction boundaries, captures every statement, and answers
//! the runner's known queries from its recorded history rows. Failures are
//! injected by SQL substring.

use crate::error::MigrationError;
use crate::executor::{DbError, SqlExecutor, SqlParam, SqlRow};
use crate::migration::source::ScriptSource;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Timestamp reported for every fake history row
const FAKE_INSTALLED_ON: &str = "2026-01-15 12:00:00";

/// A history row as captured from an INSERT or seeded directly
#[derive(Debug, Clone, PartialEq)]
pub struct FakeHistoryRow {
    pub installed_rank: i32,
    pub version: String,
    pub description: String,
    pub migration_type: String,
    pub script: String,
    pub checksum: i32,
    pub installed_by: String,
    pub execution_time_ms: i32,
    pub success: bool,
}

/// In-memory `SqlExecutor` with transaction-aware history bookkeeping
#[derive(Default)]
pub struct FakeExecutor {
    executed: RefCell<Vec<(String, Vec<SqlParam>)>>,
    queried: RefCell<Vec<String>>,
    batched: RefCell<Vec<String>>,
    applied: RefCell<Vec<FakeHistoryRow>>,
    pending: RefCell<Vec<FakeHistoryRow>>,
    in_tx: Cell<bool>,
    canned: RefCell<VecDeque<Vec<SqlRow>>>,
    execute_failures: Vec<(String, String)>,
    batch_failures: Vec<(String, String)>,
    query_failures: Vec<(String, String)>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any `execute` whose SQL contains the pattern
    pub fn fail_execute(mut self, pattern: &str, message: &str) -> Self {
        self.execute_failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    /// Fail any `batch` whose SQL contains the pattern
    pub fn fail_batch(mut self, pattern: &str, message: &str) -> Self {
        self.batch_failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    /// Fail any `query` whose SQL contains the pattern
    pub fn fail_query(mut self, pattern: &str, message: &str) -> Self {
        self.query_failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    /// Seed a successfully applied migration into the history
    pub fn seed_applied(&self, version: &str, checksum: i32) {
        let rank = self.applied.borrow().len() as i32 + 1;
        self.applied.borrow_mut().push(FakeHistoryRow {
            installed_rank: rank,
            version: version.to_string(),
            description: format!("seeded {version}"),
            migration_type: "SQL".to_string(),
            script: format!("V{version}__seeded.sql"),
            checksum,
            installed_by: "automated".to_string(),
            execution_time_ms: 5,
            success: true,
        });
    }

    /// Queue a canned response for the next unrecognized query
    pub fn push_canned(&self, rows: Vec<SqlRow>) {
        self.canned.borrow_mut().push_back(rows);
    }

    /// Every statement sent through `execute`, in order
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .borrow()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// The most recent `execute` call with its parameters
    pub fn last_executed(&self) -> Option<(String, Vec<SqlParam>)> {
        self.executed.borrow().last().cloned()
    }

    /// Every statement sent through `query`, in order
    pub fn queried_sql(&self) -> Vec<String> {
        self.queried.borrow().clone()
    }

    /// Every batch body, in order
    pub fn batches(&self) -> Vec<String> {
        self.batched.borrow().clone()
    }

    /// Committed history rows, in rank order
    pub fn applied_rows(&self) -> Vec<FakeHistoryRow> {
        self.applied.borrow().clone()
    }

    fn failure_for(failures: &[(String, String)], sql: &str) -> Option<DbError> {
        failures
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, message)| DbError::Query(message.clone()))
    }

    fn record_insert(&self, params: &[SqlParam]) {
        let row = FakeHistoryRow {
            installed_rank: int(&params[0]),
            version: text(&params[1]),
            description: text(&params[2]),
            migration_type: text(&params[3]),
            script: text(&params[4]),
            checksum: int(&params[5]),
            installed_by: text(&params[6]),
            execution_time_ms: int(&params[7]),
            success: boolean(&params[8]),
        };

        if self.in_tx.get() {
            self.pending.borrow_mut().push(row);
        } else {
            self.applied.borrow_mut().push(row);
        }
    }

    fn two_column_rows(&self) -> Vec<SqlRow> {
        self.applied
            .borrow()
            .iter()
            .filter(|r| r.success)
            .map(|r| {
                SqlRow::new(
                    vec!["version".to_string(), "checksum".to_string()],
                    vec![json!(r.version), json!(r.checksum)],
                )
            })
            .collect()
    }

    fn four_column_rows(&self) -> Vec<SqlRow> {
        self.applied
            .borrow()
            .iter()
            .filter(|r| r.success)
            .map(|r| {
                SqlRow::new(
                    vec![
                        "version".to_string(),
                        "description".to_string(),
                        "checksum".to_string(),
                        "installed_on".to_string(),
                    ],
                    vec![
                        json!(r.version),
                        json!(r.description),
                        json!(r.checksum),
                        json!(FAKE_INSTALLED_ON),
                    ],
                )
            })
            .collect()
    }

    fn full_rows(&self) -> Vec<SqlRow> {
        self.applied
            .borrow()
            .iter()
            .map(|r| {
                SqlRow::new(
                    vec![
                        "installed_rank".to_string(),
                        "version".to_string(),
                        "description".to_string(),
                        "type".to_string(),
                        "script".to_string(),
                        "checksum".to_string(),
                        "installed_by".to_string(),
                        "installed_on".to_string(),
                        "execution_time".to_string(),
                        "success".to_string(),
                    ],
                    vec![
                        json!(r.installed_rank),
                        json!(r.version),
                        json!(r.description),
                        json!(r.migration_type),
                        json!(r.script),
                        json!(r.checksum),
                        json!(r.installed_by),
                        json!(FAKE_INSTALLED_ON),
                        json!(r.execution_time_ms),
                        json!(r.success),
                    ],
                )
            })
            .collect()
    }
}

impl SqlExecutor for FakeExecutor {
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        self.executed
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));

        if let Some(err) = Self::failure_for(&self.execute_failures, sql) {
            return Err(err);
        }

        match sql {
            "BEGIN" => self.in_tx.set(true),
            "COMMIT" => {
                let mut pending = self.pending.borrow_mut();
                self.applied.borrow_mut().append(&mut pending);
                self.in_tx.set(false);
            }
            "ROLLBACK" => {
                self.pending.borrow_mut().clear();
                self.in_tx.set(false);
            }
            _ => {
                if sql.contains("flyway_schema_history") && sql.trim_start().starts_with("INSERT")
                {
                    self.record_insert(params);
                }
            }
        }

        Ok(1)
    }

    fn query(&self, sql: &str, _params: &[SqlParam]) -> Result<Vec<SqlRow>, DbError> {
        self.queried.borrow_mut().push(sql.to_string());

        if let Some(err) = Self::failure_for(&self.query_failures, sql) {
            return Err(err);
        }

        // Longest prefix first: both history queries start with "SELECT version,"
        if sql.starts_with("SELECT version, description, checksum, installed_on") {
            Ok(self.four_column_rows())
        } else if sql.starts_with("SELECT version, checksum") {
            Ok(self.two_column_rows())
        } else if sql.starts_with("SELECT installed_rank") {
            Ok(self.full_rows())
        } else {
            Ok(self.canned.borrow_mut().pop_front().unwrap_or_default())
        }
    }

    fn batch(&self, sql: &str) -> Result<(), DbError> {
        self.batched.borrow_mut().push(sql.to_string());

        if let Some(err) = Self::failure_for(&self.batch_failures, sql) {
            return Err(err);
        }

        Ok(())
    }
}

fn text(param: &SqlParam) -> String {
    match param {
        SqlParam::Text(s) => s.clone(),
        other => panic!("expected text parameter, got {other:?}"),
    }
}

fn int(param: &SqlParam) -> i32 {
    match param {
        SqlParam::Int(i) => *i,
        other => panic!("expected int parameter, got {other:?}"),
    }
}

fn boolean(param: &SqlParam) -> bool {
    match param {
        SqlParam::Bool(b) => *b,
        other => panic!("expected bool parameter, got {other:?}"),
    }
}

/// Script source backed by an in-memory name/content list
#[derive(Default)]
pub struct MemoryScriptSource {
    scripts: Vec<(String, String)>,
    unreadable: Vec<String>,
}

impl MemoryScriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named script
    pub fn add(mut self, name: &str, content: &str) -> Self {
        self.scripts.push((name.to_string(), content.to_string()));
        self
    }

    /// Add a name that lists but fails to read
    pub fn with_listed_but_unreadable(mut self, name: &str) -> Self {
        self.unreadable.push(name.to_string());
        self
    }
}

impl ScriptSource for MemoryScriptSource {
    fn list(&self) -> Result<Vec<String>, MigrationError> {
        let mut names: Vec<String> = self.scripts.iter().map(|(n, _)| n.clone()).collect();
        names.extend(self.unreadable.iter().cloned());
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, MigrationError> {
        self.scripts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| {
                MigrationError::FileNotFound(format!("Failed to read migration file {name}"))
            })
    }
}
