//! Row objects.
//!
//! A [`TableRow`] holds one record of a [`Table`]: the current value of each
//! column, a snapshot of previous values used to diff updates, and the child
//! rows attached through joined relationships. Rows come either from a
//! [`ResultStream`](crate::ResultStream) (marked as existing in storage) or
//! from user code.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config_error;
use crate::error::{Error, Result};
use crate::operators::Placeholders;
use crate::query::Statement;
use crate::schema::{Column, Relationship, Table};
use crate::select::SelectQuery;
use crate::session::Session;
use crate::value::{DataType, FetchValue, Params, Row};

/// Old and new value of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHistory<'a> {
    /// The column.
    pub column: &'a Column,

    /// Value before the first change since the last snapshot, `None` when no
    /// value was tracked.
    pub old: Option<&'a DataType>,

    /// Current value, `None` when the column has no value.
    pub new: Option<&'a DataType>,
}

impl ColumnHistory<'_> {
    /// Whether the value differs from the snapshot.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.old != self.new
    }
}

/// One record of a table.
#[derive(Debug, Clone)]
pub struct TableRow {
    table: Arc<Table>,
    values: Vec<Option<DataType>>,
    previous: Vec<Option<DataType>>,
    children: HashMap<String, Vec<Self>>,
    existed: bool,
    deleted: bool,
    session: Option<Session>,
}

impl TableRow {
    /// Creates an empty, not yet persisted row.
    #[must_use]
    pub fn new(table: &Arc<Table>) -> Self {
        let width = table.columns().len();
        Self {
            table: Arc::clone(table),
            values: vec![None; width],
            previous: vec![None; width],
            children: HashMap::new(),
            existed: false,
            deleted: false,
            session: None,
        }
    }

    /// Creates a row from `(column name, value)` pairs.
    ///
    /// Values are coerced to their column's type. No history is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] naming every column that does not exist on
    /// the table or whose value the column cannot hold.
    pub fn from_values<N, V>(table: &Arc<Table>, values: impl IntoIterator<Item = (N, V)>) -> Result<Self>
    where
        N: AsRef<str>,
        V: Into<DataType>,
    {
        let mut row = Self::new(table);
        let mut unknown = Vec::new();
        let mut rejected = Vec::new();

        for (name, value) in values {
            let name = name.as_ref();
            let Some(index) = table.column_index(name) else {
                unknown.push(name.to_string());
                continue;
            };
            match table.columns()[index].coerce(value.into()) {
                Ok(value) => row.values[index] = Some(value),
                Err(reason) => rejected.push((name.to_string(), reason)),
            }
        }

        if !unknown.is_empty() {
            return Err(Error::Mapping {
                table: table.name().to_string(),
                columns: unknown,
                reason: "no such column".to_string(),
            });
        }
        if !rejected.is_empty() {
            let reason = rejected.iter().map(|(_, reason)| reason.as_str()).collect::<Vec<_>>().join("; ");
            return Err(Error::Mapping {
                table: table.name().to_string(),
                columns: rejected.into_iter().map(|(name, _)| name).collect(),
                reason,
            });
        }

        Ok(row)
    }

    /// The row's table.
    #[must_use]
    pub const fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Whether the row was loaded from (or written to) storage.
    #[must_use]
    pub const fn existed(&self) -> bool {
        self.existed
    }

    /// Whether the row has been deleted from storage.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The session the row is bound to.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Stores a value. The snapshot taken when the row was loaded or last
    /// written stays untouched, so setting a column back to its stored value
    /// leaves it unchanged. A row that never existed has no snapshot and
    /// every value it holds counts as a change.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown column, or a conversion
    /// error when the column cannot hold the value.
    pub fn set(&mut self, column: &str, value: impl Into<DataType>) -> Result<()> {
        let index = self.index_of(column)?;
        let value = self.table.columns()[index]
            .coerce(value.into())
            .map_err(|reason| Error::Conversion(format!("column '{column}': {reason}")))?;

        self.values[index] = Some(value);

        Ok(())
    }

    /// Value of `column`.
    ///
    /// With `use_default`, a column without a value yields its default, or a
    /// typed `NULL` when it has none. Without it, `None` means "no value".
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `column` belongs to another table.
    pub fn get_column_value(&self, column: &Column, use_default: bool) -> Result<Option<DataType>> {
        if column.table_name() != self.table.name() {
            return Err(config_error!(
                "column {} does not belong to table '{}'",
                column.quoted_fullname(),
                self.table.name()
            ));
        }
        let index = self.index_of(column.name())?;

        Ok(match &self.values[index] {
            Some(value) => Some(value.clone()),
            None if use_default => Some(default_or_null(column)),
            None => None,
        })
    }

    /// Current value of a column by name, falling back to the column
    /// default.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&DataType> {
        let index = self.table.column_index(column)?;
        self.values[index].as_ref().or_else(|| self.table.columns()[index].default_value())
    }

    /// Typed value of a column.
    ///
    /// # Errors
    ///
    /// Returns a conversion error when the column is missing or holds an
    /// incompatible value.
    pub fn get<T: FetchValue>(&self, column: &str) -> Result<T> {
        T::fetch(self, column)
    }

    /// Old and new value of every column, in column order.
    #[must_use]
    pub fn history(&self) -> Vec<ColumnHistory<'_>> {
        self.table
            .columns()
            .iter()
            .zip(self.previous.iter().zip(&self.values))
            .map(|(column, (old, new))| ColumnHistory {
                column,
                old: old.as_ref(),
                new: new.as_ref(),
            })
            .collect()
    }

    /// Primary-key values in key order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<DataType> {
        self.table.primary_key().iter().map(|column| self.current_or_default(column)).collect()
    }

    /// Children attached through the named relationship.
    #[must_use]
    pub fn related(&self, relationship: &str) -> &[Self] {
        self.children.get(relationship).map(Vec::as_slice).unwrap_or_default()
    }

    /// A select for the rows of a relationship's foreign table that join to
    /// this row.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown relationship.
    pub fn related_query(&self, relationship: &str) -> Result<SelectQuery> {
        let rel = self.table.relationship(relationship).ok_or_else(|| {
            config_error!("table '{}' has no relationship '{}'", self.table.name(), relationship)
        })?;
        let value = self.current_or_default(rel.our_column());

        let mut query = SelectQuery::new()
            .from(rel.foreign_table())
            .r#where(rel.foreign_column().predicate_eq(value));
        if let Some(session) = &self.session {
            query = query.dialect(session.dialect());
        }

        Ok(query)
    }

    /// Renders the object as a JSON object of column name to value.
    /// Binary values are base64 encoded.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .table
            .columns()
            .iter()
            .map(|column| (column.name().to_string(), self.current_or_default(column).to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Renders `INSERT INTO "t" ("a", "b") VALUES (:param_0, :param_1)`.
    ///
    /// Columns without a value and without a default, or holding an explicit
    /// `NULL` with no default, are left to the database. When that includes
    /// primary key or autoincrement columns and the dialect supports it,
    /// `RETURNING` reads their generated values back.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a column value cannot be read.
    pub fn generate_insert_sql(&self, placeholders: &mut Placeholders) -> Result<Statement> {
        let mut params = Params::new();
        let mut names = Vec::new();
        let mut tokens = Vec::new();
        let mut generated = Vec::new();

        for column in self.table.columns() {
            let value = self.get_column_value(column, true)?.unwrap_or_else(|| column.column_type().null_value());
            if value.is_null() && column.default_value().is_none() {
                if column.is_primary_key() || column.is_autoincrement() {
                    generated.push(column);
                }
                continue;
            }
            names.push(column.quoted_name());
            tokens.push(placeholders.bind(&mut params, value));
        }

        let mut sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table.quoted_name())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table.quoted_name(),
                names.join(", "),
                tokens.join(", ")
            )
        };

        if generated.is_empty() || !placeholders.dialect().supports_returning {
            return Ok(Statement::new(sql, params));
        }

        let returned: Vec<String> = generated.iter().map(|column| column.quoted_name()).collect();
        sql.push_str(" RETURNING ");
        sql.push_str(&returned.join(", "));

        let returning = generated.iter().map(|column| column.name().to_string()).collect();
        Ok(Statement::new(sql, params).with_returning(returning))
    }

    /// Renders `UPDATE "t" SET "a" = :param_0 WHERE ("pk" = :param_1)` for
    /// the columns changed since the last snapshot, or `None` when nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the table has no primary key.
    pub fn generate_update_sql(&self, placeholders: &mut Placeholders) -> Result<Option<Statement>> {
        self.require_primary_key("update")?;

        let changes: Vec<ColumnHistory<'_>> =
            self.history().into_iter().filter(ColumnHistory::is_changed).collect();
        if changes.is_empty() {
            return Ok(None);
        }

        let mut params = Params::new();
        let mut sets = Vec::with_capacity(changes.len());
        for change in &changes {
            let value = change.new.cloned().unwrap_or_else(|| change.column.column_type().null_value());
            let token = placeholders.bind(&mut params, value);
            sets.push(format!("{} = {token}", change.column.quoted_name()));
        }

        let mut wheres = Vec::new();
        for column in self.table.primary_key() {
            let index = self.index_of(column.name())?;
            let key = self.previous[index].clone().unwrap_or_else(|| self.current_or_default(column));
            let token = placeholders.bind(&mut params, key);
            wheres.push(format!("{} = {token}", column.quoted_name()));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE ({})",
            self.table.quoted_name(),
            sets.join(", "),
            wheres.join(" AND ")
        );
        Ok(Some(Statement::new(sql, params)))
    }

    /// Renders `DELETE FROM "t" WHERE ("t"."pk" = :param_0)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the table has no primary key.
    pub fn generate_delete_sql(&self, placeholders: &mut Placeholders) -> Result<Statement> {
        self.require_primary_key("delete")?;

        let mut params = Params::new();
        let wheres: Vec<String> = self
            .table
            .primary_key()
            .iter()
            .map(|column| {
                let token = placeholders.bind(&mut params, self.current_or_default(column));
                format!("{} = {token}", column.quoted_fullname())
            })
            .collect();

        let sql = format!("DELETE FROM {} WHERE ({})", self.table.quoted_name(), wheres.join(" AND "));
        Ok(Statement::new(sql, params))
    }

    /// Attaches the joined-relationship values found in an alias-keyed row.
    ///
    /// For every joined relationship, the values projected under the foreign
    /// table's aliases form one child row. Children whose values are all
    /// `NULL` (no match on the join) are skipped, as are children whose
    /// primary key is already attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if the values cannot be mapped onto the
    /// foreign table.
    pub fn attach_relationship_data(&mut self, data: &Row) -> Result<()> {
        let table = Arc::clone(&self.table);
        for rel in table.joined_relationships() {
            let Some(child) = self.child_from(rel, data)? else {
                continue;
            };

            let siblings = self.children.entry(rel.name().to_string()).or_default();
            let key = child.identity_key();
            if siblings.iter().any(|sibling| sibling.identity_key() == key) {
                tracing::trace!(relationship = rel.name(), "skipping duplicate child row");
                continue;
            }
            siblings.push(child);
        }

        Ok(())
    }

    /// Marks the row as persisted: the current values become the previous
    /// values snapshot.
    pub(crate) fn mark_existed(&mut self) {
        self.previous.clone_from(&self.values);
        self.existed = true;
    }

    pub(crate) const fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn bind_session(&mut self, session: Option<Session>) {
        if session.is_some() {
            self.session = session;
        }
    }

    fn child_from(&self, rel: &Relationship, data: &Row) -> Result<Option<Self>> {
        let foreign = rel.foreign_table();
        let pairs: Vec<(&str, DataType)> = foreign
            .columns()
            .iter()
            .filter_map(|column| data.get(&column.alias_name()).map(|value| (column.name(), value.clone())))
            .collect();

        if pairs.is_empty() || pairs.iter().all(|(_, value)| value.is_null()) {
            tracing::trace!(relationship = rel.name(), "no joined values for relationship");
            return Ok(None);
        }

        let mut child = Self::from_values(foreign, pairs)?;
        child.mark_existed();
        child.bind_session(self.session.clone());
        Ok(Some(child))
    }

    // Primary key when the table has one, every value otherwise.
    fn identity_key(&self) -> Vec<Option<DataType>> {
        if self.table.primary_key().is_empty() {
            return self.values.clone();
        }
        self.primary_key().into_iter().map(Some).collect()
    }

    fn current_or_default(&self, column: &Column) -> DataType {
        self.table
            .column_index(column.name())
            .and_then(|index| self.values[index].clone())
            .unwrap_or_else(|| default_or_null(column))
    }

    /// Stores the values an `INSERT ... RETURNING` read back, keyed by
    /// column name. Generated values are not changes.
    pub(crate) fn store_generated(&mut self, generated: &Row) -> Result<()> {
        for field in &generated.fields {
            let index = self.index_of(&field.name)?;
            let value = self.table.columns()[index].coerce(field.value.clone()).map_err(|reason| Error::Mapping {
                table: self.table.name().to_string(),
                columns: vec![field.name.clone()],
                reason,
            })?;
            self.values[index] = Some(value);
        }
        Ok(())
    }

    fn index_of(&self, column: &str) -> Result<usize> {
        self.table
            .column_index(column)
            .ok_or_else(|| config_error!("table '{}' has no column '{}'", self.table.name(), column))
    }

    fn require_primary_key(&self, action: &str) -> Result<()> {
        if self.table.primary_key().is_empty() {
            return Err(config_error!(
                "cannot {} a row of table '{}' without a primary key",
                action,
                self.table.name()
            ));
        }
        Ok(())
    }
}

fn default_or_null(column: &Column) -> DataType {
    column.default_value().cloned().unwrap_or_else(|| column.column_type().null_value())
}
