//! # Database Access
//!
//! A narrow interface over one SQLite connection: execute, query,
//! transactions. A `Database` wraps exactly one underlying connection
//! and every operation takes `&mut self`, so exclusive use is a
//! compile-time property rather than a locking discipline; concurrent
//! callers go through the pool instead.
//!
//! Query results are materialized into owned rows up front - column
//! names from the prepared statement, values decoded by storage class -
//! so the mapper never depends on cursor lifetimes.

use crate::error::{OrmError, Result};
use crate::value::DbValue;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::collections::VecDeque;
use std::str::FromStr;

#[derive(Debug)]
enum Conn {
    Owned(SqliteConnection),
    Pooled(sqlx::pool::PoolConnection<sqlx::Sqlite>),
}

/// One exclusive database connection
#[derive(Debug)]
pub struct Database {
    conn: Conn,
}

impl Database {
    /// Open a SQLite database at `path` (created if missing)
    ///
    /// `":memory:"` opens an in-memory database.
    ///
    /// # Errors
    ///
    /// [`OrmError::OpenFailed`] with the backend's message.
    pub async fn open(path: &str) -> Result<Self> {
        let open_failed = |e: sqlx::Error| OrmError::OpenFailed {
            path: path.to_string(),
            message: e.to_string(),
        };
        let options = connect_options(path).map_err(open_failed)?;
        let conn = options.connect().await.map_err(open_failed)?;
        Ok(Self {
            conn: Conn::Owned(conn),
        })
    }

    pub(crate) fn from_pooled(conn: sqlx::pool::PoolConnection<sqlx::Sqlite>) -> Self {
        Self {
            conn: Conn::Pooled(conn),
        }
    }

    fn conn_mut(&mut self) -> &mut SqliteConnection {
        match &mut self.conn {
            Conn::Owned(c) => c,
            Conn::Pooled(p) => &mut **p,
        }
    }

    /// Execute a statement that returns no rows
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] with the backend's message.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql)
            .execute(self.conn_mut())
            .await
            .map_err(query_failed)?;
        Ok(result.rows_affected())
    }

    /// Execute an INSERT and return the assigned rowid
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] with the backend's message.
    pub async fn execute_insert(&mut self, sql: &str) -> Result<i64> {
        let result = sqlx::query(sql)
            .execute(self.conn_mut())
            .await
            .map_err(query_failed)?;
        Ok(result.last_insert_rowid())
    }

    /// Run a SELECT and materialize the full result set
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] with the backend's message.
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        run_query(self.conn_mut(), sql).await
    }

    /// Begin a transaction
    ///
    /// One transaction per connection at a time; the returned guard
    /// borrows the connection exclusively until committed or rolled
    /// back. Dropping the guard without committing rolls back.
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] with the backend's message.
    pub async fn begin(&mut self) -> Result<DbTransaction<'_>> {
        let tx = self.conn_mut().begin().await.map_err(query_failed)?;
        Ok(DbTransaction { tx })
    }

    /// Close the connection
    ///
    /// Pooled connections return to their pool on drop instead.
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] if the backend fails to shut down cleanly.
    pub async fn close(self) -> Result<()> {
        match self.conn {
            Conn::Owned(c) => c.close().await.map_err(query_failed),
            Conn::Pooled(_) => Ok(()),
        }
    }
}

fn query_failed(err: sqlx::Error) -> OrmError {
    OrmError::Query {
        message: err.to_string(),
    }
}

pub(crate) fn connect_options(
    path: &str,
) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    if path == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")
    } else {
        Ok(SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true))
    }
}

/// An in-flight transaction
///
/// `commit` and `rollback` consume the guard, so a transaction cannot be
/// completed twice.
pub struct DbTransaction<'c> {
    tx: sqlx::Transaction<'c, sqlx::Sqlite>,
}

impl DbTransaction<'_> {
    /// Execute a statement inside the transaction
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] with the backend's message.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql)
            .execute(&mut *self.tx)
            .await
            .map_err(query_failed)?;
        Ok(result.rows_affected())
    }

    /// Run a SELECT inside the transaction
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] with the backend's message.
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        run_query(&mut self.tx, sql).await
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] if the commit fails; the transaction is gone
    /// either way.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(query_failed)
    }

    /// Roll the transaction back
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] if the rollback itself fails.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(query_failed)
    }
}

async fn run_query(conn: &mut SqliteConnection, sql: &str) -> Result<ResultSet> {
    let statement = (&mut *conn).prepare(sql).await.map_err(query_failed)?;
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let rows = sqlx::query(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(query_failed)?;

    let rows = rows
        .iter()
        .map(|row| Row {
            values: (0..columns.len()).map(|i| decode_value(row, i)).collect(),
        })
        .collect();

    Ok(ResultSet { columns, rows })
}

/// Decode one cell by its storage class
fn decode_value(row: &SqliteRow, index: usize) -> DbValue {
    let Ok(raw) = row.try_get_raw(index) else {
        return DbValue::Null;
    };
    if raw.is_null() {
        return DbValue::Null;
    }
    let type_name = raw.type_info().name().to_string();

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(DbValue::Int)
            .unwrap_or(DbValue::Null),
        "REAL" => row
            .try_get::<f64, _>(index)
            .map(DbValue::Float)
            .unwrap_or(DbValue::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(DbValue::Blob)
            .unwrap_or(DbValue::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(DbValue::Text)
            .unwrap_or(DbValue::Null),
    }
}

/// A fully materialized query result
#[derive(Debug)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: VecDeque<Row>,
}

impl ResultSet {
    /// Number of columns
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column name by index
    #[must_use]
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    /// All column names in result order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Advance the cursor and take the next row
    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Number of rows not yet consumed
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether any rows remain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One materialized result row
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<DbValue>,
}

impl Row {
    /// Text value by column index; `None` when NULL or not text
    #[must_use]
    pub fn get_text(&self, index: usize) -> Option<&str> {
        match self.values.get(index) {
            Some(DbValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integer value by column index; 0 when NULL or not an integer
    #[must_use]
    pub fn get_int64(&self, index: usize) -> i64 {
        match self.values.get(index) {
            Some(DbValue::Int(v)) => *v,
            _ => 0,
        }
    }

    /// Float value by column index; 0.0 when NULL or not numeric
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_double(&self, index: usize) -> f64 {
        match self.values.get(index) {
            Some(DbValue::Float(v)) => *v,
            Some(DbValue::Int(v)) => *v as f64,
            _ => 0.0,
        }
    }

    /// Whether the cell at `index` is NULL (out-of-range reads as NULL)
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), None | Some(DbValue::Null))
    }

    /// Raw decoded value by column index
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }
}
