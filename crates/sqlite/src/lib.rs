//! `SQLite` connection for `strata-orm`.
//!
//! A lightweight, single-connection backend intended for development and
//! tests. Statements are executed under a mutex and query results are read
//! into memory before the cursor is handed back.
//!
//! ```ignore
//! let db = SqliteDatabase::connect().await?;
//! db.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let session = db.session();
//! let users = session.select(&users_table).all(&session).await?.try_collect().await?;
//! ```

#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_wrap)]

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use fromenv::FromEnv;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection as SqliteConnection, ToSql};
use strata_orm::{Connection, Cursor, DataType, Field, FutureResult, Params, Row, Session};
use tracing::instrument;

/// Options used to connect to the SQL database.
///
/// This struct is used to load connection options from environment variables.
#[derive(Debug, Clone, FromEnv)]
pub struct ConnectOptions {
    /// Path or URI of the database file.
    #[env(from = "SQL_DATABASE", default = "file::memory:?cache=shared")]
    pub database: String,
}

impl ConnectOptions {
    /// Loads options from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading connection options")
    }
}

/// A `SQLite` database implementing [`Connection`].
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    // rusqlite::Connection isn't `Sync`
    conn: Arc<Mutex<SqliteConnection>>,
}

impl SqliteDatabase {
    /// Connects using options loaded from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be loaded or the database
    /// cannot be opened.
    pub async fn connect() -> Result<Self> {
        Self::connect_with(ConnectOptions::load()?).await
    }

    /// Connects using explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    #[instrument]
    pub async fn connect_with(options: ConnectOptions) -> Result<Self> {
        tracing::debug!("initializing SQLite connection to: {}", options.database);

        let conn = SqliteConnection::open(&options.database).context("failed to open SQLite database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs one or more semicolon-separated statements without parameters,
    /// typically schema setup.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    #[instrument(skip(self))]
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql).context("failed to execute batch")
    }

    /// A session running queries on this database.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(Arc::new(self.clone()))
    }
}

impl Connection for SqliteDatabase {
    fn query(&self, sql: String, params: Params) -> FutureResult<Box<dyn Cursor>> {
        tracing::debug!("executing query: {}", sql);
        let conn = Arc::clone(&self.conn);

        async move {
            let conn = conn.lock();
            let mut stmt = conn.prepare(&sql).context("failed to prepare statement")?;

            let column_names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
            let bound = bind_params(&params);
            let named: Vec<(&str, &dyn ToSql)> =
                bound.iter().map(|(name, value)| (name.as_str(), value as &dyn ToSql)).collect();

            let mut rows = stmt.query(named.as_slice()).context("failed to execute query")?;

            let mut buffered = VecDeque::new();
            while let Some(row) = rows.next().context("failed to fetch row")? {
                let mut fields = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    let value = row.get_ref(i).context("failed to get column value")?;
                    fields.push(Field {
                        name: name.clone(),
                        value: from_sqlite(value)?,
                    });
                }
                buffered.push_back(Row { fields });
            }

            tracing::debug!(row_count = buffered.len(), "query returned rows");
            Ok(Box::new(BufferedCursor { rows: buffered }) as Box<dyn Cursor>)
        }
        .boxed()
    }

    fn exec(&self, sql: String, params: Params) -> FutureResult<u64> {
        tracing::debug!("executing statement: {}", sql);
        let conn = Arc::clone(&self.conn);

        async move {
            let conn = conn.lock();
            let mut stmt = conn.prepare(&sql).context("failed to prepare statement")?;

            let bound = bind_params(&params);
            let named: Vec<(&str, &dyn ToSql)> =
                bound.iter().map(|(name, value)| (name.as_str(), value as &dyn ToSql)).collect();

            let rows_affected = stmt.execute(named.as_slice()).context("failed to execute statement")?;
            Ok(rows_affected as u64)
        }
        .boxed()
    }
}

/// Rows of one query, already read from the database.
struct BufferedCursor {
    rows: VecDeque<Row>,
}

impl Cursor for BufferedCursor {
    fn fetch_row(&mut self) -> BoxFuture<'_, anyhow::Result<Option<Row>>> {
        let row = self.rows.pop_front();
        async move { Ok(row) }.boxed()
    }
}

// rusqlite names carry the `:` prefix used in the SQL text.
fn bind_params(params: &Params) -> Vec<(String, Value)> {
    params.iter().map(|(name, value)| (format!(":{name}"), to_sqlite(value))).collect()
}

fn to_sqlite(value: &DataType) -> Value {
    match value {
        DataType::Boolean(Some(b)) => Value::Integer(i64::from(*b)),
        DataType::Int32(Some(i)) => Value::Integer(i64::from(*i)),
        DataType::Int64(Some(i)) => Value::Integer(*i),
        DataType::Uint32(Some(u)) => Value::Integer(i64::from(*u)),
        DataType::Uint64(Some(u)) => Value::Integer(*u as i64),
        DataType::Float(Some(f)) => Value::Real(f64::from(*f)),
        DataType::Double(Some(f)) => Value::Real(*f),
        DataType::Str(Some(s))
        | DataType::Date(Some(s))
        | DataType::Time(Some(s))
        | DataType::Timestamp(Some(s)) => Value::Text(s.clone()),
        DataType::Binary(Some(b)) => Value::Blob(b.clone()),
        // All None variants map to NULL
        _ => Value::Null,
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Result<DataType> {
    match value {
        ValueRef::Null => Ok(DataType::NULL),
        ValueRef::Integer(i) => Ok(DataType::Int64(Some(i))),
        ValueRef::Real(f) => Ok(DataType::Double(Some(f))),
        ValueRef::Text(t) => {
            let s = std::str::from_utf8(t).context("invalid UTF-8 in text value")?;
            Ok(DataType::Str(Some(s.to_string())))
        }
        ValueRef::Blob(b) => Ok(DataType::Binary(Some(b.to_vec()))),
    }
}
