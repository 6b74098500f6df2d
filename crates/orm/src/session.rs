use std::sync::Arc;

use tracing::instrument;

use crate::connection::{Connection, Cursor};
use crate::error::Result;
use crate::mutation::{InsertQuery, RowDeleteQuery, RowUpdateQuery};
use crate::operators::Dialect;
use crate::schema::Table;
use crate::select::SelectQuery;
use crate::stream::{ResultStream, check_groupable};

/// Runs compiled queries against a [`Connection`].
///
/// Cheap to clone. Rows produced by a session keep a handle to it.
#[derive(Debug, Clone)]
pub struct Session {
    connection: Arc<dyn Connection>,
    dialect: Dialect,
}

impl Session {
    /// Creates a session using the default dialect.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            dialect: Dialect::default(),
        }
    }

    /// Sets the dialect handed to the queries this session creates.
    #[must_use]
    pub const fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// The session's dialect.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Starts a select on `table`.
    #[must_use]
    pub fn select(&self, table: &Arc<Table>) -> SelectQuery {
        SelectQuery::new().from(table).dialect(self.dialect)
    }

    /// Starts an insert.
    #[must_use]
    pub fn insert(&self) -> InsertQuery {
        InsertQuery::new().dialect(self.dialect)
    }

    /// Starts an update.
    #[must_use]
    pub fn update(&self) -> RowUpdateQuery {
        RowUpdateQuery::new().dialect(self.dialect)
    }

    /// Starts a delete.
    #[must_use]
    pub fn delete(&self) -> RowDeleteQuery {
        RowDeleteQuery::new().dialect(self.dialect)
    }

    /// Executes a select and returns a stream over its mapped rows.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any I/O if the query cannot be
    /// compiled or streamed, or the connection's error if execution fails.
    #[instrument(skip_all)]
    pub async fn run_select(&self, query: &SelectQuery) -> Result<ResultStream> {
        let statement = query.compile()?;
        let Some(table) = query.table() else {
            return Err(crate::config_error!("select query has no table"));
        };
        check_groupable(table)?;

        let cursor = self.connection.query(statement.sql, statement.params).await?;
        ResultStream::new(Arc::clone(table), cursor, Some(self.clone()))
    }

    /// Executes an insert, one statement per row, and returns the total
    /// number of affected rows. Key values generated by the database are
    /// read back into their rows. Inserted rows are marked as existing and
    /// bound to this session.
    ///
    /// # Errors
    ///
    /// Returns the first compile or execution error, or a mapping error if a
    /// generated value does not fit its column. Rows inserted before the
    /// failure stay inserted.
    #[instrument(skip_all)]
    pub async fn run_insert(&self, query: &mut InsertQuery) -> Result<u64> {
        let statements = query.compile()?;
        let mut affected = 0;

        for (row, statement) in query.rows_mut().iter_mut().zip(statements) {
            if statement.returning.is_empty() {
                affected += self.connection.exec(statement.sql, statement.params).await?;
            } else {
                let mut cursor = self.connection.query(statement.sql, statement.params).await?;
                if let Some(generated) = cursor.fetch_row().await? {
                    row.store_generated(&generated)?;
                    affected += 1;
                }
            }
            row.mark_existed();
            row.bind_session(Some(self.clone()));
        }

        Ok(affected)
    }

    /// Executes an update for every changed row and returns the total number
    /// of affected rows. Updated rows take a fresh snapshot, so running the
    /// query again writes nothing.
    ///
    /// # Errors
    ///
    /// Returns the first compile or execution error.
    #[instrument(skip_all)]
    pub async fn run_update(&self, query: &mut RowUpdateQuery) -> Result<u64> {
        let statements = query.compile()?;
        let mut affected = 0;

        for (row, statement) in query.rows_mut().iter_mut().zip(statements) {
            let Some(statement) = statement else {
                continue;
            };
            affected += self.connection.exec(statement.sql, statement.params).await?;
            row.mark_existed();
        }

        Ok(affected)
    }

    /// Executes a delete for every row and returns the total number of
    /// affected rows. Deleted rows are flagged as such.
    ///
    /// # Errors
    ///
    /// Returns the first compile or execution error.
    #[instrument(skip_all)]
    pub async fn run_delete(&self, query: &mut RowDeleteQuery) -> Result<u64> {
        let statements = query.compile()?;
        let mut affected = 0;

        for (row, statement) in query.rows_mut().iter_mut().zip(statements) {
            affected += self.connection.exec(statement.sql, statement.params).await?;
            row.mark_deleted();
        }

        Ok(affected)
    }
}
