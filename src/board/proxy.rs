//! SQL proxy: the only way the data layer reaches storage.
//!
//! A proxy takes query text plus bound parameters and answers with rows, each
//! row a JSON object keyed by column name. Two backends:
//!
//! | Backend          | Transport                                   | Batches        |
//! |------------------|---------------------------------------------|----------------|
//! | `HttpSqlProxy`   | `POST {query, params}` to a database service | sequential     |
//! | `SqliteProxy`    | embedded SQLite on the blocking thread pool  | one transaction|

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::StoreError;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// A bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl From<&SqlValue> for SqliteValue {
    fn from(v: &SqlValue) -> Self {
        match v {
            SqlValue::Null => SqliteValue::Null,
            SqlValue::Integer(i) => SqliteValue::Integer(*i),
            SqlValue::Text(s) => SqliteValue::Text(s.clone()),
        }
    }
}

/// Query text with positional (`?1`, `?2`, ...) parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    #[serde(rename = "query")]
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

#[async_trait]
pub trait SqlProxy: Send + Sync {
    /// Run one statement and return its rows (empty for writes).
    async fn query(&self, statement: Statement) -> Result<Vec<Row>, StoreError>;

    /// Run several write statements in order.
    ///
    /// The default sends them one by one with no atomicity across them.
    async fn execute_all(&self, statements: Vec<Statement>) -> Result<(), StoreError> {
        for statement in statements {
            self.query(statement).await?;
        }
        Ok(())
    }

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

// ── HTTP backend ──────────────────────────────────────────────────────

pub const DEFAULT_API_KEY_HEADER: &str = "X-Api-Key";

/// Forwards statements to a remote database service over HTTP.
pub struct HttpSqlProxy {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    api_key_header: String,
}

impl HttpSqlProxy {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        api_key_header: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(StoreError::Transport)?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            api_key_header: api_key_header.into(),
        })
    }
}

/// Pull the service's error message out of a failed response body.
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("error"))
                .and_then(|d| d.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| "Database query failed".to_string())
}

/// Writes may answer with an object or nothing; only arrays carry rows.
fn rows_from_body(body: Value) -> Result<Vec<Row>, StoreError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::Decode(format!("expected row object, got {}", other))),
            })
            .collect(),
        _ => Ok(Vec::new()),
    }
}

#[async_trait]
impl SqlProxy for HttpSqlProxy {
    async fn query(&self, statement: Statement) -> Result<Vec<Row>, StoreError> {
        debug!(sql = %statement.sql, params = statement.params.len(), "proxy query");
        let mut request = self.client.post(&self.url).json(&statement);
        if let Some(key) = &self.api_key {
            request = request.header(self.api_key_header.as_str(), key);
        }
        let resp = request.send().await.map_err(StoreError::Transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(StoreError::Transport)?;
        if !status.is_success() {
            return Err(StoreError::Rejected {
                message: rejection_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        rows_from_body(serde_json::from_str(&text)?)
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}

// ── SQLite backend ────────────────────────────────────────────────────

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kanban_board (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        date_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        date_updated TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS kanban_swim_lane (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid TEXT NOT NULL UNIQUE,
        board_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        position INTEGER NOT NULL DEFAULT 0,
        date_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        date_updated TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS kanban_card (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid TEXT NOT NULL UNIQUE,
        lane_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        priority TEXT NOT NULL DEFAULT 'Medium',
        position INTEGER NOT NULL DEFAULT 0,
        date_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        date_updated TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_swim_lane_board ON kanban_swim_lane(board_id, position);
    CREATE INDEX IF NOT EXISTS idx_card_lane ON kanban_card(lane_id, position);
";

/// Embedded SQLite database speaking the proxy contract.
///
/// The connection sits behind `Arc<Mutex>` and every call runs on tokio's
/// blocking pool via `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteProxy {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProxy {
    /// Open (or create) a database file and make sure the tables exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("connection lock poisoned: {}", e)))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn sqlite_params(statement: &Statement) -> Vec<SqliteValue> {
    statement.params.iter().map(SqliteValue::from).collect()
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn run_statement(conn: &Connection, statement: &Statement) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare(&statement.sql)?;
    let params = rusqlite::params_from_iter(sqlite_params(statement));
    if stmt.column_count() == 0 {
        stmt.execute(params)?;
        return Ok(Vec::new());
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (index, name) in columns.iter().enumerate() {
            map.insert(name.clone(), json_value(row.get_ref(index)?));
        }
        out.push(map);
    }
    Ok(out)
}

#[async_trait]
impl SqlProxy for SqliteProxy {
    async fn query(&self, statement: Statement) -> Result<Vec<Row>, StoreError> {
        debug!(sql = %statement.sql, params = statement.params.len(), "sqlite query");
        self.with_conn(move |conn| run_statement(conn, &statement))
            .await
    }

    async fn execute_all(&self, statements: Vec<Statement>) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for statement in &statements {
                tx.execute(&statement.sql, rusqlite::params_from_iter(sqlite_params(statement)))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
