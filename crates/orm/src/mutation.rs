//! Row-based INSERT, UPDATE, and DELETE builders.
//!
//! Each builder holds row objects and compiles to one independent statement
//! per row. All rows of a compile share a single placeholder counter, so the
//! parameter names of a batch never collide.

use crate::error::Result;
use crate::operators::{Dialect, Placeholders};
use crate::query::Statement;
use crate::row::TableRow;

macro_rules! row_query {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            rows: Vec<TableRow>,
            dialect: Dialect,
        }

        impl $name {
            /// Creates an empty builder.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Adds a row.
            #[must_use]
            pub fn add_row(mut self, row: TableRow) -> Self {
                self.rows.push(row);
                self
            }

            /// Adds several rows.
            #[must_use]
            pub fn add_rows(mut self, rows: impl IntoIterator<Item = TableRow>) -> Self {
                self.rows.extend(rows);
                self
            }

            /// Sets the dialect placeholders are rendered for.
            #[must_use]
            pub const fn dialect(mut self, dialect: Dialect) -> Self {
                self.dialect = dialect;
                self
            }

            /// Rows held by the builder.
            #[must_use]
            pub fn rows(&self) -> &[TableRow] {
                &self.rows
            }

            pub(crate) fn rows_mut(&mut self) -> &mut [TableRow] {
                &mut self.rows
            }
        }
    };
}

row_query! {
    /// Inserts rows, one `INSERT` per row.
    InsertQuery
}

row_query! {
    /// Writes the changed columns of rows, one `UPDATE` per changed row.
    RowUpdateQuery
}

row_query! {
    /// Deletes rows by primary key, one `DELETE` per row.
    RowDeleteQuery
}

impl InsertQuery {
    /// Compiles one statement per row.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot render its statement.
    pub fn compile(&self) -> Result<Vec<Statement>> {
        let mut placeholders = Placeholders::new(self.dialect);
        self.rows
            .iter()
            .map(|row| {
                let statement = row.generate_insert_sql(&mut placeholders)?;
                log_statement("InsertQuery", row, &statement);
                Ok(statement)
            })
            .collect()
    }
}

impl RowUpdateQuery {
    /// Compiles one entry per row, `None` for rows without changes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a row's table has no primary key.
    pub fn compile(&self) -> Result<Vec<Option<Statement>>> {
        let mut placeholders = Placeholders::new(self.dialect);
        self.rows
            .iter()
            .map(|row| {
                let statement = row.generate_update_sql(&mut placeholders)?;
                if let Some(statement) = &statement {
                    log_statement("RowUpdateQuery", row, statement);
                }
                Ok(statement)
            })
            .collect()
    }
}

impl RowDeleteQuery {
    /// Compiles one statement per row.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a row's table has no primary key.
    pub fn compile(&self) -> Result<Vec<Statement>> {
        let mut placeholders = Placeholders::new(self.dialect);
        self.rows
            .iter()
            .map(|row| {
                let statement = row.generate_delete_sql(&mut placeholders)?;
                log_statement("RowDeleteQuery", row, &statement);
                Ok(statement)
            })
            .collect()
    }
}

fn log_statement(builder: &str, row: &TableRow, statement: &Statement) {
    tracing::debug!(
        table = row.table().name(),
        sql = %statement.sql,
        param_count = statement.params.len(),
        "{builder} generated SQL"
    );
}
