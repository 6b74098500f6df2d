use std::sync::Arc;

use super::column::Column;
use super::table::Table;

/// How a relationship's rows are loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Loaded on demand with a separate query (see
    /// [`TableRow::related_query`](crate::TableRow::related_query)).
    #[default]
    Select,

    /// Loaded eagerly with a `JOIN` in the parent's select.
    Joined,
}

/// Declaration of a relationship, consumed by
/// [`TableBuilder`](super::TableBuilder).
#[derive(Debug, Clone)]
pub struct RelationshipDef {
    pub(crate) name: String,
    pub(crate) our_column: String,
    pub(crate) foreign_table: Arc<Table>,
    pub(crate) foreign_column: String,
    pub(crate) load: LoadStrategy,
}

impl RelationshipDef {
    /// Links `our_column` on the table being built to `foreign_column` on
    /// `foreign_table`.
    #[must_use]
    pub fn new(
        name: impl Into<String>, our_column: impl Into<String>, foreign_table: &Arc<Table>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            our_column: our_column.into(),
            foreign_table: Arc::clone(foreign_table),
            foreign_column: foreign_column.into(),
            load: LoadStrategy::default(),
        }
    }

    /// Sets the load strategy.
    #[must_use]
    pub const fn load(mut self, load: LoadStrategy) -> Self {
        self.load = load;
        self
    }

    /// Shorthand for `load(LoadStrategy::Joined)`.
    #[must_use]
    pub const fn joined(self) -> Self {
        self.load(LoadStrategy::Joined)
    }
}

/// A directional one-to-many link from the owning table to a foreign table.
#[derive(Debug, Clone)]
pub struct Relationship {
    name: String,
    our_column: Column,
    foreign_table: Arc<Table>,
    foreign_column: Column,
    load: LoadStrategy,
}

impl Relationship {
    pub(crate) fn new(
        name: String, our_column: Column, foreign_table: Arc<Table>, foreign_column: Column,
        load: LoadStrategy,
    ) -> Self {
        Self {
            name,
            our_column,
            foreign_table,
            foreign_column,
            load,
        }
    }

    /// Relationship name, used to look up attached children.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join column on the owning table.
    #[must_use]
    pub const fn our_column(&self) -> &Column {
        &self.our_column
    }

    /// Table the relationship points at.
    #[must_use]
    pub const fn foreign_table(&self) -> &Arc<Table> {
        &self.foreign_table
    }

    /// Join column on the foreign table.
    #[must_use]
    pub const fn foreign_column(&self) -> &Column {
        &self.foreign_column
    }

    /// Load strategy.
    #[must_use]
    pub const fn load(&self) -> LoadStrategy {
        self.load
    }

    /// Whether the relationship is loaded with a `JOIN`.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.load == LoadStrategy::Joined
    }

    /// `JOIN "foreign" ON "ours"."a" = "foreign"."b"`
    #[must_use]
    pub fn join_clause(&self) -> String {
        format!(
            "JOIN {} ON {} = {}",
            self.foreign_table.quoted_name(),
            self.our_column.quoted_fullname(),
            self.foreign_column.quoted_fullname()
        )
    }
}
