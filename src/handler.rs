//! Invocation entry point.
//!
//! Mirrors the deployed invocation contract: a structured event selects
//! inspection mode, fix mode, or the default migration run, and the response
//! carries a status code plus a structured body. All failures fold into a
//! single failure response with the underlying error message.

use crate::config::AppConfig;
use crate::connection::connect;
use crate::error::MigrationError;
use crate::executor::{PgExecutor, SqlExecutor, SqlRow};
use crate::gateway;
use crate::migration::history::HistoryStore;
use crate::migration::migrator::{Migrator, RunSummary};
use crate::migration::source::DirScriptSource;
use log::{error, info};
use serde::{Deserialize, Serialize};

/// Script name used by fix mode when the event names none
pub const DEFAULT_FIX_SCRIPT: &str = "fix_partners.sql";

/// Structured invocation event
///
/// `queryOnly` takes precedence over `runFix`; with neither set the default
/// migration run executes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationEvent {
    /// Read-only inspection mode
    pub query_only: bool,
    /// Optional free-form SQL for inspection mode
    pub query: Option<String>,
    /// Run a named auxiliary script instead of the migration set
    pub run_fix: bool,
    /// Script name for fix mode
    pub script: Option<String>,
}

/// Structured invocation response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

impl MigrationResponse {
    /// Successful response
    pub fn ok(body: ResponseBody) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    /// Failure response
    pub fn failed(body: ResponseBody) -> Self {
        Self {
            status_code: 500,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Response body; absent fields are omitted from the serialized form
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseBody {
    /// Body for a completed migration run
    pub fn run_summary(summary: &RunSummary) -> Self {
        Self {
            message: "Success".to_string(),
            applied: Some(summary.applied),
            skipped: Some(summary.skipped),
            total: Some(summary.total),
            ..Self::default()
        }
    }

    /// Body for a custom inspection query
    pub fn query_rows(rows: &[SqlRow]) -> Self {
        Self {
            message: "Query completed".to_string(),
            rows: Some(rows.iter().map(SqlRow::to_json).collect()),
            ..Self::default()
        }
    }

    /// Body for the migration history overview
    pub fn history_rows(rows: &[SqlRow]) -> Self {
        Self {
            message: "Query completed".to_string(),
            migrations: Some(rows.iter().map(SqlRow::to_json).collect()),
            ..Self::default()
        }
    }

    /// Body for a completed fix script
    pub fn fix_applied() -> Self {
        Self {
            message: "Fix applied successfully".to_string(),
            ..Self::default()
        }
    }

    /// Body for any failure
    pub fn failure(error: &str) -> Self {
        Self {
            message: "Failed".to_string(),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Handle one invocation end to end
///
/// Connects to the configured database, routes the event to the requested
/// mode, and folds every error into a failure response.
pub fn handle(config: &AppConfig, event: &MigrationEvent) -> MigrationResponse {
    info!("Starting DB migration for {}", config.environment);
    info!("Database: {}", config.database.summary());

    match dispatch(config, event) {
        Ok(body) => MigrationResponse::ok(body),
        Err(e) => {
            error!("Migration failed: {e}");
            MigrationResponse::failed(ResponseBody::failure(&e.to_string()))
        }
    }
}

fn dispatch(config: &AppConfig, event: &MigrationEvent) -> Result<ResponseBody, MigrationError> {
    let client = connect(&config.database.connection_string())?;
    let executor = PgExecutor::new(client);
    route(config, event, &executor)
}

/// Route an event to its mode against an already-connected executor
fn route(
    config: &AppConfig,
    event: &MigrationEvent,
    executor: &dyn SqlExecutor,
) -> Result<ResponseBody, MigrationError> {
    if event.query_only {
        let store = HistoryStore::new(config.runner.history_schema.clone());
        return Ok(match &event.query {
            Some(sql) => ResponseBody::query_rows(&gateway::run_query(executor, sql)?),
            None => ResponseBody::history_rows(&gateway::fetch_history(executor, &store)?),
        });
    }

    if event.run_fix {
        let source = DirScriptSource::new(&config.runner.migrations_dir);
        let script = event.script.as_deref().unwrap_or(DEFAULT_FIX_SCRIPT);
        gateway::run_fix(executor, &source, script)?;
        return Ok(ResponseBody::fix_applied());
    }

    info!("Connected to database");
    let summary = Migrator::from_config(&config.runner).run(executor)?;
    Ok(ResponseBody::run_summary(&summary))
}
