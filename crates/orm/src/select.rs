use std::borrow::Borrow;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config_error;
use crate::error::Result;
use crate::operators::{Dialect, Placeholders, Predicate, SortOrder, Sorter};
use crate::query::Statement;
use crate::row::TableRow;
use crate::schema::{Column, Table};
use crate::session::Session;
use crate::stream::ResultStream;
use crate::value::Params;

/// Builder for SELECT queries.
///
/// Every column of the table, and of each table reached through a joined
/// relationship, is projected under its `t_<table>_<column>` alias.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    table: Option<Arc<Table>>,
    predicates: Vec<Predicate>,
    limit: Option<u64>,
    offset: Option<u64>,
    sorter: Option<Sorter>,
    dialect: Dialect,
}

impl SelectQuery {
    /// Creates a new SELECT query builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table to select from.
    #[must_use]
    pub fn from(mut self, table: &Arc<Table>) -> Self {
        self.table = Some(Arc::clone(table));
        self
    }

    /// Adds a WHERE condition. Conditions from repeated calls are AND-ed.
    #[must_use]
    pub fn r#where(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds several WHERE conditions.
    #[must_use]
    pub fn where_all(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Sets the maximum number of rows to return.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Orders by `columns` in `order`, replacing any previous ordering.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `columns` is empty.
    pub fn order_by<C: Borrow<Column>>(
        mut self, columns: impl IntoIterator<Item = C>, order: SortOrder,
    ) -> Result<Self> {
        let sorter = Sorter::new(columns.into_iter().map(|column| column.borrow().clone()), order)?;
        self.sorter = Some(sorter);
        Ok(self)
    }

    /// Orders by a prepared sorter, replacing any previous ordering.
    #[must_use]
    pub fn order_by_sorter(mut self, sorter: Sorter) -> Self {
        self.sorter = Some(sorter);
        self
    }

    /// Sets the dialect placeholders are rendered for.
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// The table being selected from, if set.
    #[must_use]
    pub const fn table(&self) -> Option<&Arc<Table>> {
        self.table.as_ref()
    }

    /// Conditions added so far.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Compiles the query.
    ///
    /// Clauses are emitted in the order `JOIN`, `WHERE`, `LIMIT`, `OFFSET`,
    /// `ORDER BY`, drawing placeholders from one counter in that order. The
    /// builder is left untouched, so compiling twice yields the same
    /// statement.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no table was set, two projected
    /// columns share an alias, or a condition is not supported by the
    /// dialect.
    pub fn compile(&self) -> Result<Statement> {
        let table = self.table.as_ref().ok_or_else(|| config_error!("select query has no table"))?;
        check_projection(table)?;
        let mut placeholders = Placeholders::new(self.dialect);
        let mut params = Params::new();

        let joins: Vec<_> = table.joined_relationships().collect();
        let projection: Vec<String> = table
            .columns()
            .iter()
            .chain(joins.iter().copied().flat_map(|rel| rel.foreign_table().columns()))
            .map(|column| format!("{} AS {}", column.quoted_fullname(), column.quoted_alias_name()))
            .collect();

        let mut sql = format!("SELECT {} FROM {}", projection.join(", "), table.quoted_name());
        for rel in &joins {
            sql.push(' ');
            sql.push_str(&rel.join_clause());
        }

        if !self.predicates.is_empty() {
            let conditions = self
                .predicates
                .iter()
                .map(|predicate| predicate.to_sql(&mut placeholders, &mut params))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        if let Some(sorter) = &self.sorter {
            sql.push_str(" ORDER BY ");
            sql.push_str(&sorter.to_sql(&mut placeholders));
        }

        tracing::debug!(
            table = table.name(),
            sql = %sql,
            param_count = params.len(),
            "SelectQuery generated SQL"
        );

        Ok(Statement::new(sql, params))
    }

    /// Runs the query and streams the mapped rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query does not compile or the connection
    /// fails to execute it.
    pub async fn all(&self, session: &Session) -> Result<ResultStream> {
        session.run_select(self).await
    }

    /// Runs the query and returns the first mapped row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the first row cannot be mapped.
    pub async fn first(&self, session: &Session) -> Result<Option<TableRow>> {
        let mut stream = self.all(session).await?;
        stream.next().await
    }
}

/// Rejects tables whose projection would emit the same alias twice.
///
/// Aliases are `t_<table>_<column>`, so `a.b_c` and `a_b.c` both project as
/// `t_a_b_c` once `a_b` is joined into `a`.
pub(crate) fn check_projection(table: &Table) -> Result<()> {
    let mut seen = HashSet::new();
    let mut collisions = Vec::new();
    let aliases = table
        .columns()
        .iter()
        .chain(table.joined_relationships().flat_map(|rel| rel.foreign_table().columns()))
        .map(Column::alias_name);

    for alias in aliases {
        if !seen.insert(alias.clone()) && !collisions.contains(&alias) {
            collisions.push(alias);
        }
    }

    if !collisions.is_empty() {
        return Err(config_error!(
            "projection of table '{}' repeats aliases: {}",
            table.name(),
            collisions.join(", ")
        ));
    }
    Ok(())
}
