use std::collections::HashSet;
use std::sync::Arc;

use super::column::{Column, ColumnDef};
use super::quote_ident;
use super::relationship::{LoadStrategy, Relationship, RelationshipDef};
use crate::error::{Error, Result};

/// An immutable table definition, shared as `Arc<Table>`.
#[derive(Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<Column>,
    relationships: Vec<Relationship>,
}

impl Table {
    /// Starts a table definition.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            relationships: Vec::new(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"table"`
    #[must_use]
    pub fn quoted_name(&self) -> String {
        quote_ident(&self.name)
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    /// Position of a column in declaration order.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name() == name)
    }

    /// Primary-key columns, in key order. Empty when the table has no key.
    #[must_use]
    pub fn primary_key(&self) -> &[Column] {
        &self.primary_key
    }

    /// Relationships in declaration order.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Looks up a relationship by name.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|rel| rel.name() == name)
    }

    /// Relationships loaded with a `JOIN`, in declaration order.
    pub fn joined_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(|rel| rel.is_joined())
    }
}

/// Builder for [`Table`].
#[derive(Debug)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Option<Vec<String>>,
    relationships: Vec<RelationshipDef>,
}

impl TableBuilder {
    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key explicitly, overriding per-column flags.
    #[must_use]
    pub fn primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a relationship to a previously built table.
    #[must_use]
    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Validates the definition and freezes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for an empty table name, a table without
    /// columns, duplicate column or relationship names, unknown primary-key
    /// columns, or relationship columns missing from either table.
    pub fn build(self) -> Result<Arc<Table>> {
        let Self {
            name,
            columns: defs,
            primary_key,
            relationships: rel_defs,
        } = self;

        if name.is_empty() {
            return Err(Error::Schema("table name must not be empty".to_string()));
        }
        if defs.is_empty() {
            return Err(Error::Schema(format!("table '{name}' has no columns")));
        }

        let mut seen = HashSet::new();
        for def in &defs {
            if !seen.insert(def.name()) {
                return Err(Error::Schema(format!(
                    "duplicate column '{}' in table '{name}'",
                    def.name()
                )));
            }
        }

        let key_names: Vec<String> = match primary_key {
            Some(names) => {
                if let Some(unknown) = names.iter().find(|key| !seen.contains(key.as_str())) {
                    return Err(Error::Schema(format!(
                        "primary key column '{unknown}' is not a column of table '{name}'"
                    )));
                }
                names
            }
            None => {
                defs.iter().filter(|def| def.is_primary_key()).map(|def| def.name().to_string()).collect()
            }
        };

        let columns: Vec<Column> = defs
            .into_iter()
            .map(|def| {
                let is_key = key_names.iter().any(|key| key == def.name());
                def.into_column_with_key(&name, is_key)
            })
            .collect();

        let primary_key = key_names
            .iter()
            .filter_map(|key| columns.iter().find(|column| column.name() == key))
            .cloned()
            .collect();

        let mut relationships = Vec::with_capacity(rel_defs.len());
        for def in rel_defs {
            if relationships.iter().any(|rel: &Relationship| rel.name() == def.name) {
                return Err(Error::Schema(format!(
                    "duplicate relationship '{}' in table '{name}'",
                    def.name
                )));
            }

            let our_column = columns.iter().find(|column| column.name() == def.our_column).ok_or_else(|| {
                Error::Schema(format!(
                    "relationship '{}' joins on unknown column '{}.{}'",
                    def.name, name, def.our_column
                ))
            })?;
            let foreign_column = def.foreign_table.column(&def.foreign_column).ok_or_else(|| {
                Error::Schema(format!(
                    "relationship '{}' joins on unknown column '{}.{}'",
                    def.name,
                    def.foreign_table.name(),
                    def.foreign_column
                ))
            })?;

            if def.load == LoadStrategy::Joined {
                let foreign_name = def.foreign_table.name();
                if foreign_name == name {
                    return Err(Error::Schema(format!(
                        "relationship '{}' joins table '{name}' into itself",
                        def.name
                    )));
                }
                if let Some(other) = relationships
                    .iter()
                    .find(|rel: &&Relationship| rel.is_joined() && rel.foreign_table().name() == foreign_name)
                {
                    return Err(Error::Schema(format!(
                        "relationships '{}' and '{}' both join table '{foreign_name}' into '{name}'",
                        other.name(),
                        def.name
                    )));
                }
            }

            relationships.push(Relationship::new(
                def.name.clone(),
                our_column.clone(),
                Arc::clone(&def.foreign_table),
                foreign_column.clone(),
                def.load,
            ));
        }

        Ok(Arc::new(Table {
            name,
            columns,
            primary_key,
            relationships,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, LoadStrategy};

    fn users() -> Arc<Table> {
        Table::builder("users")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("name", ColumnType::Text))
            .build()
            .unwrap()
    }

    #[test]
    fn primary_key_from_flags() {
        let table = users();
        let key: Vec<&str> = table.primary_key().iter().map(Column::name).collect();
        assert_eq!(key, ["id"]);
        assert_eq!(table.column_index("name"), Some(1));
    }

    #[test]
    fn explicit_primary_key_wins() {
        let table = Table::builder("memberships")
            .column(ColumnDef::new("user_id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("group_id", ColumnType::Integer))
            .primary_key(["group_id", "user_id"])
            .build()
            .unwrap();

        let key: Vec<&str> = table.primary_key().iter().map(Column::name).collect();
        assert_eq!(key, ["group_id", "user_id"]);
        assert!(table.column("group_id").unwrap().is_primary_key());
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Table::builder("users")
            .column(ColumnDef::new("id", ColumnType::Integer))
            .column(ColumnDef::new("id", ColumnType::Text))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("duplicate column 'id'")));
    }

    #[test]
    fn rejects_unknown_primary_key() {
        let err = Table::builder("users")
            .column(ColumnDef::new("id", ColumnType::Integer))
            .primary_key(["uuid"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("'uuid'")));
    }

    #[test]
    fn rejects_unknown_relationship_columns() {
        let users = users();
        let err = Table::builder("posts")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .relationship(RelationshipDef::new("author", "author_id", &users, "id"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("posts.author_id")));

        let err = Table::builder("posts")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("author_id", ColumnType::Integer))
            .relationship(RelationshipDef::new("author", "author_id", &users, "uuid"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("users.uuid")));
    }

    #[test]
    fn joined_relationships_filtered() {
        let users = users();
        let posts = Table::builder("posts")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("author_id", ColumnType::Integer))
            .column(ColumnDef::new("editor_id", ColumnType::Integer))
            .relationship(RelationshipDef::new("author", "author_id", &users, "id").joined())
            .relationship(RelationshipDef::new("editor", "editor_id", &users, "id"))
            .build()
            .unwrap();

        let joined: Vec<&str> = posts.joined_relationships().map(Relationship::name).collect();
        assert_eq!(joined, ["author"]);
        assert_eq!(posts.relationship("editor").unwrap().load(), LoadStrategy::Select);
        assert_eq!(
            posts.relationship("author").unwrap().join_clause(),
            r#"JOIN "users" ON "posts"."author_id" = "users"."id""#
        );
    }

    #[test]
    fn rejects_joining_one_table_twice() {
        let users = users();
        let err = Table::builder("posts")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("author_id", ColumnType::Integer))
            .column(ColumnDef::new("editor_id", ColumnType::Integer))
            .relationship(RelationshipDef::new("author", "author_id", &users, "id").joined())
            .relationship(RelationshipDef::new("editor", "editor_id", &users, "id").joined())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(msg) if msg == "relationships 'author' and 'editor' both join table 'users' into 'posts'"
        ));
    }

    #[test]
    fn rejects_joined_self_reference() {
        let parent = users();
        let err = Table::builder("users")
            .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDef::new("parent_id", ColumnType::Integer))
            .relationship(RelationshipDef::new("parent", "parent_id", &parent, "id").joined())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("into itself")));
    }
}
