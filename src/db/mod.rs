//! Database access: a lazily built MySQL pool and an executor that retries
//! operations which fail because the connection broke.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

pub mod executor;
pub mod pool;
pub mod row;

pub use executor::{Executor, QueryOutcome, RetryPolicy};
pub use pool::PoolManager;

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// MySQL client/server error numbers that mean the connection itself is gone.
const CONNECTION_ERROR_NUMBERS: &[u16] = &[
    1053, // ER_SERVER_SHUTDOWN
    1927, // ER_CONNECTION_KILLED
    2006, // CR_SERVER_GONE_ERROR
    2013, // CR_SERVER_LOST
];

const CONNECTION_ERROR_MARKERS: &[&str] = &[
    "etimedout",
    "econnreset",
    "econnrefused",
    "connection lost",
    "connection reset",
    "connection refused",
    "broken pipe",
];

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Invalid procedure name: {0}")]
    InvalidProcedureName(String),
}

impl DbError {
    /// True when the failure came from the connection layer rather than from
    /// the statement, i.e. a fresh pool may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Sqlx(err) => is_connection_error(err),
            DbError::InvalidProcedureName(_) => false,
        }
    }
}

fn is_connection_error(err: &sqlx::Error) -> bool {
    use std::io::ErrorKind;

    match err {
        sqlx::Error::Io(io) => matches!(
            io.kind(),
            ErrorKind::TimedOut
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::NotConnected
                | ErrorKind::UnexpectedEof
        ),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => {
            let by_number = db
                .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                .map(|mysql| CONNECTION_ERROR_NUMBERS.contains(&mysql.number()))
                .unwrap_or(false);
            by_number || mentions_connection_failure(db.message())
        }
        other => mentions_connection_failure(&other.to_string()),
    }
}

fn mentions_connection_failure(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    CONNECTION_ERROR_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
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

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Float(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

/// A single logical database operation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    Sql { sql: String, params: Vec<SqlParam> },
    Procedure { name: String, params: Vec<SqlParam> },
}

impl QueryRequest {
    /// Statement text sent to the server. Procedure parameters only ever
    /// appear as `?` placeholders.
    pub fn statement(&self) -> Result<String, DbError> {
        match self {
            QueryRequest::Sql { sql, .. } => Ok(sql.clone()),
            QueryRequest::Procedure { name, params } => {
                if !is_valid_procedure_name(name) {
                    return Err(DbError::InvalidProcedureName(name.clone()));
                }
                Ok(format!("CALL {}({})", name, placeholders(params.len())))
            }
        }
    }

    pub fn params(&self) -> &[SqlParam] {
        match self {
            QueryRequest::Sql { params, .. } | QueryRequest::Procedure { params, .. } => params,
        }
    }

    /// Short label for logs.
    pub fn describe(&self) -> &str {
        match self {
            QueryRequest::Sql { .. } => "query",
            QueryRequest::Procedure { name, .. } => name,
        }
    }
}

/// `?, ?, ?` for `count` parameters; empty for zero.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits and `_`.
pub fn is_valid_procedure_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Where the executor gets its connections from.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Runs one attempt of `request` against the current pool.
    async fn run(&self, request: &QueryRequest) -> Result<Vec<Row>, DbError>;

    /// Drops the current pool so the next attempt starts from scratch.
    fn reset(&self);
}
