//! SQL execution seam over `may_postgres`.
//!
//! Provides the `SqlExecutor` trait that abstracts database execution for the
//! migration runner, history store, and inspection gateway. Parameters cross
//! the seam as [`SqlParam`] values and rows come back as [`SqlRow`], so callers
//! never touch driver types directly and can be exercised against an in-memory
//! executor in tests.

use may_postgres::types::{ToSql, Type};
use may_postgres::{Client, Error as PostgresError, Row};
use serde_json::{json, Value as JsonValue};
use std::fmt;

/// Database execution error type
#[derive(Debug)]
pub enum DbError {
    /// `PostgreSQL` error from `may_postgres`
    Postgres(PostgresError),
    /// Query execution error
    Query(String),
    /// Row parsing/conversion error
    Parse(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Postgres(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            DbError::Query(s) => {
                write!(f, "Query error: {s}")
            }
            DbError::Parse(s) => {
                write!(f, "Parse error: {s}")
            }
            DbError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for DbError {}

impl From<PostgresError> for DbError {
    fn from(err: PostgresError) -> Self {
        DbError::Postgres(err)
    }
}

/// A single bound query parameter
///
/// The runner binds only the handful of shapes the history table needs, so
/// the enum stays small. Each variant owns its value; conversion to
/// `&dyn ToSql` borrows straight from the slice.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i32),
    BigInt(i64),
    Bool(bool),
    Null,
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Int(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::BigInt(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

/// Convert seam parameters into driver parameters
///
/// The returned references borrow from `params`, so the vector is valid for
/// as long as the input slice is.
fn bind(params: &[SqlParam]) -> Vec<&dyn ToSql> {
    static NULL: Option<i32> = None;

    params
        .iter()
        .map(|p| match p {
            SqlParam::Text(s) => s as &dyn ToSql,
            SqlParam::Int(i) => i as &dyn ToSql,
            SqlParam::BigInt(i) => i as &dyn ToSql,
            SqlParam::Bool(b) => b as &dyn ToSql,
            SqlParam::Null => &NULL as &dyn ToSql,
        })
        .collect()
}

/// A decoded result row
///
/// Cells are JSON values decoded per column type. That keeps inspection-mode
/// output serializable without a second conversion, and keeps tests free of
/// driver row types (driver rows cannot be constructed without a server).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Vec<String>,
    values: Vec<JsonValue>,
}

impl SqlRow {
    /// Create a row from parallel column/value vectors
    pub fn new(columns: Vec<String>, values: Vec<JsonValue>) -> Self {
        Self { columns, values }
    }

    /// Column names in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of cells in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cell value by position
    pub fn get(&self, index: usize) -> Option<&JsonValue> {
        self.values.get(index)
    }

    /// Cell value by column name (first match wins)
    pub fn get_named(&self, name: &str) -> Option<&JsonValue> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Extract a 32-bit integer cell
    ///
    /// # Errors
    ///
    /// Returns `DbError::Parse` if the cell is missing, not a number, or out
    /// of `i32` range.
    pub fn try_i32(&self, index: usize) -> Result<i32, DbError> {
        let value = self
            .get(index)
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| self.parse_error(index, "an integer"))?;
        i32::try_from(value).map_err(|_| self.parse_error(index, "a 32-bit integer"))
    }

    /// Extract a string cell
    ///
    /// # Errors
    ///
    /// Returns `DbError::Parse` if the cell is missing or not a string.
    pub fn try_string(&self, index: usize) -> Result<String, DbError> {
        self.get(index)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.parse_error(index, "a string"))
    }

    /// Extract a boolean cell
    ///
    /// # Errors
    ///
    /// Returns `DbError::Parse` if the cell is missing or not a boolean.
    pub fn try_bool(&self, index: usize) -> Result<bool, DbError> {
        self.get(index)
            .and_then(JsonValue::as_bool)
            .ok_or_else(|| self.parse_error(index, "a boolean"))
    }

    /// Render the row as a JSON object keyed by column name
    pub fn to_json(&self) -> JsonValue {
        let mut object = serde_json::Map::with_capacity(self.columns.len());
        for (name, value) in self.columns.iter().zip(self.values.iter()) {
            object.insert(name.clone(), value.clone());
        }
        JsonValue::Object(object)
    }

    fn parse_error(&self, index: usize, expected: &str) -> DbError {
        let column = self
            .columns
            .get(index)
            .map(String::as_str)
            .unwrap_or("<out of range>");
        DbError::Parse(format!(
            "column {index} ('{column}') is not {expected}: {:?}",
            self.get(index)
        ))
    }
}

/// Trait for executing database operations
///
/// This trait abstracts database execution, allowing different implementations
/// (direct client, in-transaction execution, test doubles) to be used
/// interchangeably by the runner, history store, and gateway.
pub trait SqlExecutor {
    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Arguments
    ///
    /// * `sql` - SQL statement (can contain parameters like `$1`, `$2`, etc.)
    /// * `params` - Parameters to bind to the statement
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the execution fails.
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError>;

    /// Execute a query and return all rows, decoded
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the query fails or a row cannot be decoded.
    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DbError>;

    /// Execute a raw statement batch via the simple query protocol
    ///
    /// Migration scripts routinely contain several statements separated by
    /// semicolons; the simple query protocol runs them all in one round trip.
    /// No rows are returned.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if any statement in the batch fails.
    fn batch(&self, sql: &str) -> Result<(), DbError>;
}

/// Implementation of `SqlExecutor` for `may_postgres::Client`
///
/// This is the primary executor implementation that directly uses a
/// `may_postgres::Client`.
pub struct PgExecutor {
    client: Client,
}

impl PgExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Consume the executor and return the underlying client
    pub fn into_client(self) -> Client {
        self.client
    }
}

impl SqlExecutor for PgExecutor {
    fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, DbError> {
        let bound = bind(params);
        self.client.execute(sql, &bound).map_err(DbError::Postgres)
    }

    fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<SqlRow>, DbError> {
        let bound = bind(params);
        let rows = self.client.query(sql, &bound).map_err(DbError::Postgres)?;
        rows.iter().map(decode_row).collect()
    }

    fn batch(&self, sql: &str) -> Result<(), DbError> {
        self.client.batch_execute(sql).map_err(DbError::Postgres)
    }
}

/// Decode a driver row into a [`SqlRow`]
pub(crate) fn decode_row(row: &Row) -> Result<SqlRow, DbError> {
    let mut columns = Vec::with_capacity(row.columns().len());
    let mut values = Vec::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_cell(row, idx, column.name(), column.type_())?);
    }

    Ok(SqlRow::new(columns, values))
}

/// Decode one cell according to its declared column type
///
/// Types the history table and common inspection queries produce are decoded
/// natively; anything else is attempted as text and becomes JSON null (with a
/// warning) if the driver cannot read it that way.
fn decode_cell(row: &Row, idx: usize, name: &str, ty: &Type) -> Result<JsonValue, DbError> {
    let cell_error =
        |e: PostgresError| DbError::Parse(format!("failed to decode column '{name}' ({ty}): {e}"));

    let value = if *ty == Type::BOOL {
        row.try_get::<usize, Option<bool>>(idx)
            .map_err(cell_error)?
            .map(JsonValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<usize, Option<i16>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v))
    } else if *ty == Type::INT4 {
        row.try_get::<usize, Option<i32>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v))
    } else if *ty == Type::INT8 {
        row.try_get::<usize, Option<i64>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<usize, Option<f32>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<usize, Option<f64>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<usize, Option<String>>(idx)
            .map_err(cell_error)?
            .map(JsonValue::String)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<usize, Option<chrono::NaiveDateTime>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<usize, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v.to_rfc3339()))
    } else if *ty == Type::DATE {
        row.try_get::<usize, Option<chrono::NaiveDate>>(idx)
            .map_err(cell_error)?
            .map(|v| json!(v.format("%Y-%m-%d").to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<usize, Option<JsonValue>>(idx)
            .map_err(cell_error)?
    } else if *ty == Type::NUMERIC {
        // Rendered as a string, the lossless choice for JSON output
        row.try_get::<usize, Option<rust_decimal::Decimal>>(idx)
            .map_err(cell_error)?
            .map(|v| JsonValue::String(v.to_string()))
    } else if *ty == Type::UUID {
        row.try_get::<usize, Option<uuid::Uuid>>(idx)
            .map_err(cell_error)?
            .map(|v| JsonValue::String(v.to_string()))
    } else {
        match row.try_get::<usize, Option<String>>(idx) {
            Ok(v) => v.map(JsonValue::String),
            Err(e) => {
                log::warn!(
                    "Cannot decode column '{name}' of type {ty} as text, returning null: {e}"
                );
                None
            }
        }
    };

    Ok(value.unwrap_or(JsonValue::Null))
}
