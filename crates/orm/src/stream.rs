//! Streaming result reconstruction.
//!
//! A joined select returns one physical row per parent/child pair, so a
//! parent with three children arrives as three consecutive rows repeating the
//! parent's columns. [`RowGrouper`] pulls rows from a [`Cursor`] and cuts
//! them into runs sharing the primary key; [`ResultStream`] maps each run to
//! one [`TableRow`] with the children attached.
//!
//! Runs are detected by comparing consecutive keys only. The cursor must
//! deliver each parent's rows contiguously (for example by ordering on the
//! primary key); interleaved rows produce one object per contiguous run.

use std::collections::HashSet;
use std::sync::Arc;

use futures::Stream;

use crate::config_error;
use crate::connection::Cursor;
use crate::error::{Error, Result};
use crate::row::TableRow;
use crate::schema::{Column, Table};
use crate::select::check_projection;
use crate::session::Session;
use crate::value::{DataType, Row};

/// Cuts a cursor's rows into runs of equal key.
pub struct RowGrouper {
    cursor: Box<dyn Cursor>,
    table: String,
    key: Vec<String>,
    pending: Option<(Vec<DataType>, Row)>,
    exhausted: bool,
}

impl RowGrouper {
    /// Groups by the primary-key aliases of `table`.
    #[must_use]
    pub fn new(cursor: Box<dyn Cursor>, table: &Table) -> Self {
        let key = table.primary_key().iter().map(Column::alias_name).collect();
        Self::with_key(cursor, table.name(), key)
    }

    /// Groups by arbitrary alias names. With an empty key every row is its
    /// own group.
    #[must_use]
    pub fn with_key(cursor: Box<dyn Cursor>, table: impl Into<String>, key: Vec<String>) -> Self {
        Self {
            cursor,
            table: table.into(),
            key,
            pending: None,
            exhausted: false,
        }
    }

    /// Returns the next run of rows, or `None` once the cursor is exhausted.
    ///
    /// The first row of the following run is held back and seeds the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cursor`] when fetching fails and [`Error::Mapping`]
    /// when a row lacks a key alias. Either ends the grouping.
    pub async fn next_group(&mut self) -> Result<Option<Vec<Row>>> {
        let result = self.advance().await;
        if result.is_err() {
            self.exhausted = true;
            self.pending = None;
        }
        result
    }

    async fn advance(&mut self) -> Result<Option<Vec<Row>>> {
        let (key, seed) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.fetch().await? {
                Some(row) => (self.key_of(&row)?, row),
                None => return Ok(None),
            },
        };

        let mut group = vec![seed];
        if self.key.is_empty() {
            return Ok(Some(group));
        }

        while let Some(row) = self.fetch().await? {
            let next_key = self.key_of(&row)?;
            if next_key != key {
                self.pending = Some((next_key, row));
                break;
            }
            group.push(row);
        }

        Ok(Some(group))
    }

    async fn fetch(&mut self) -> Result<Option<Row>> {
        if self.exhausted {
            return Ok(None);
        }

        let row = self.cursor.fetch_row().await?;
        if row.is_none() {
            self.exhausted = true;
        }
        Ok(row)
    }

    fn key_of(&self, row: &Row) -> Result<Vec<DataType>> {
        let mut values = Vec::with_capacity(self.key.len());
        let mut missing = Vec::new();

        for alias in &self.key {
            match row.get(alias) {
                Some(value) => values.push(value.clone()),
                None => missing.push(alias.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(Error::Mapping {
                table: self.table.clone(),
                columns: missing,
                reason: "row is missing primary key columns".to_string(),
            });
        }
        Ok(values)
    }
}

/// Lazily maps the rows of one select into [`TableRow`]s.
///
/// Each call to [`next`](Self::next) consumes exactly the physical rows of one
/// logical record. Dropping the stream stops fetching.
pub struct ResultStream {
    table: Arc<Table>,
    grouper: RowGrouper,
    session: Option<Session>,
    related_aliases: HashSet<String>,
}

impl ResultStream {
    /// Opens a stream over `cursor` for rows of `table`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the table loads relationships with a
    /// join but has no primary key to group by, or if two projected columns
    /// share an alias.
    pub fn new(table: Arc<Table>, cursor: Box<dyn Cursor>, session: Option<Session>) -> Result<Self> {
        check_groupable(&table)?;
        check_projection(&table)?;

        let related_aliases = table
            .joined_relationships()
            .flat_map(|rel| rel.foreign_table().columns().iter().map(Column::alias_name))
            .collect();
        let grouper = RowGrouper::new(cursor, &table);

        tracing::debug!(table = table.name(), "opened result stream");

        Ok(Self {
            table,
            grouper,
            session,
            related_aliases,
        })
    }

    /// Table the rows belong to.
    #[must_use]
    pub const fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Returns the next mapped row, or `None` at the end of the results.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching fails or a row cannot be mapped. Rows
    /// returned earlier are unaffected.
    pub async fn next(&mut self) -> Result<Option<TableRow>> {
        match self.grouper.next_group().await? {
            Some(group) => self.map_group(group).map(Some),
            None => Ok(None),
        }
    }

    /// Drains the stream into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn try_collect(mut self) -> Result<Vec<TableRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Adapts the stream to [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<TableRow>> + Send {
        futures::stream::try_unfold(self, |mut stream| async move {
            let next = stream.next().await?;
            Ok::<_, Error>(next.map(|row| (row, stream)))
        })
    }

    /// Maps one run of physical rows to a single object.
    ///
    /// The first row supplies the object's own columns; every row
    /// contributes its joined relationship values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] if the rows do not fit the table.
    pub fn map_group(&self, rows: Vec<Row>) -> Result<TableRow> {
        let group_size = rows.len();
        let mut rows = rows.into_iter();
        let Some(first) = rows.next() else {
            return Err(Error::Mapping {
                table: self.table.name().to_string(),
                columns: Vec::new(),
                reason: "empty row group".to_string(),
            });
        };

        let mut mapped = self.map_columns(&first)?;
        for run_on in rows {
            mapped.attach_relationship_data(&run_on)?;
        }

        tracing::debug!(table = self.table.name(), group_size, "mapped row group");
        Ok(mapped)
    }

    /// Maps a single physical row.
    ///
    /// Aliases of the table's own columns become the object's values, and
    /// the remaining aliases are handed to relationship attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mapping`] naming aliases that belong to neither the
    /// table nor a joined relationship, or values a column cannot hold.
    pub fn map_columns(&self, row: &Row) -> Result<TableRow> {
        let mut own = Vec::new();
        let mut related = Row::default();
        let mut unknown = Vec::new();

        for field in &row.fields {
            if let Some(column) = self.table.columns().iter().find(|column| column.alias_name() == field.name) {
                own.push((column.name(), field.value.clone()));
            } else if self.related_aliases.contains(&field.name) {
                related.push(field.name.clone(), field.value.clone());
            } else {
                unknown.push(field.name.clone());
            }
        }

        if !unknown.is_empty() {
            return Err(Error::Mapping {
                table: self.table.name().to_string(),
                columns: unknown,
                reason: "not part of the projection".to_string(),
            });
        }

        let mut mapped = TableRow::from_values(&self.table, own)?;
        mapped.mark_existed();
        mapped.bind_session(self.session.clone());
        mapped.attach_relationship_data(&related)?;
        Ok(mapped)
    }
}

/// Rejects tables whose joined rows could not be grouped.
pub(crate) fn check_groupable(table: &Table) -> Result<()> {
    if table.primary_key().is_empty() && table.joined_relationships().next().is_some() {
        return Err(config_error!(
            "table '{}' joins relationships but has no primary key to group rows by",
            table.name()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use futures::future::BoxFuture;

    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    struct VecCursor(VecDeque<anyhow::Result<Row>>);

    impl Cursor for VecCursor {
        fn fetch_row(&mut self) -> BoxFuture<'_, anyhow::Result<Option<Row>>> {
            let next = self.0.pop_front().transpose();
            Box::pin(async move { next })
        }
    }

    fn cursor(rows: Vec<anyhow::Result<Row>>) -> Box<dyn Cursor> {
        Box::new(VecCursor(rows.into()))
    }

    fn pk_row(pk: i64, child: &str) -> anyhow::Result<Row> {
        Ok(Row::new([("pk", DataType::from(pk)), ("child", child.into())]))
    }

    #[tokio::test]
    async fn groups_runs_by_key() {
        let rows = vec![pk_row(1, "a"), pk_row(1, "b"), pk_row(2, "c")];
        let mut grouper = RowGrouper::with_key(cursor(rows), "t", vec!["pk".to_string()]);

        let first = grouper.next_group().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].get("child"), Some(&DataType::from("b")));

        let second = grouper.next_group().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get("pk"), Some(&DataType::from(2_i64)));

        assert!(grouper.next_group().await.unwrap().is_none());
        assert!(grouper.next_group().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_key_yields_single_rows() {
        let rows = vec![pk_row(1, "a"), pk_row(1, "b")];
        let mut grouper = RowGrouper::with_key(cursor(rows), "t", Vec::new());

        assert_eq!(grouper.next_group().await.unwrap().unwrap().len(), 1);
        assert_eq!(grouper.next_group().await.unwrap().unwrap().len(), 1);
        assert!(grouper.next_group().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_key_is_mapping_error() {
        let rows = vec![Ok(Row::new([("child", DataType::from("a"))]))];
        let mut grouper = RowGrouper::with_key(cursor(rows), "t", vec!["pk".to_string()]);

        let err = grouper.next_group().await.unwrap_err();
        assert!(matches!(err, Error::Mapping { columns, .. } if columns == ["pk"]));
        assert!(grouper.next_group().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cursor_error_ends_grouping() {
        let rows = vec![pk_row(1, "a"), Err(anyhow::anyhow!("connection reset")), pk_row(2, "b")];
        let mut grouper = RowGrouper::with_key(cursor(rows), "t", vec!["pk".to_string()]);

        assert!(matches!(grouper.next_group().await, Err(Error::Cursor(_))));
        assert!(grouper.next_group().await.unwrap().is_none());
    }

    #[test]
    fn keyless_join_rejected() {
        let children = Table::builder("children")
            .column(ColumnDef::new("parent", ColumnType::Text))
            .build()
            .unwrap();
        let parents = Table::builder("parents")
            .column(ColumnDef::new("name", ColumnType::Text))
            .relationship(crate::schema::RelationshipDef::new("children", "name", &children, "parent").joined())
            .build()
            .unwrap();

        let err = ResultStream::new(parents, cursor(Vec::new()), None).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        ResultStream::new(children, cursor(Vec::new()), None).unwrap();
    }
}
