use std::hash::{Hash, Hasher};

use super::quote_ident;
use super::types::ColumnType;
use crate::error::Result;
use crate::operators::{Operand, Operator, Predicate, SortOrder, Sorter};
use crate::value::DataType;

/// A column of another table referenced by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Referenced table name.
    pub table: String,

    /// Referenced column name.
    pub column: String,
}

/// Declaration of a column, consumed by [`TableBuilder`](super::TableBuilder).
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    nullable: bool,
    unique: bool,
    indexed: bool,
    autoincrement: bool,
    default: Option<DataType>,
    foreign_key: Option<ForeignKey>,
}

impl ColumnDef {
    /// Declares a nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            nullable: true,
            unique: false,
            indexed: false,
            autoincrement: false,
            default: None,
            foreign_key: None,
        }
    }

    /// Marks the column as part of the primary key. Primary-key columns are
    /// not nullable.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column indexed.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Lets the database generate values for the column.
    #[must_use]
    pub const fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Client-side default used when a row has no value for the column.
    #[must_use]
    pub fn default(mut self, value: impl Into<DataType>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Links the column to a column of another table.
    #[must_use]
    pub fn foreign_key(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[cfg(test)]
    pub(crate) fn into_column(self, table: &str) -> Column {
        let primary_key = self.primary_key;
        self.into_column_with_key(table, primary_key)
    }

    pub(crate) fn into_column_with_key(self, table: &str, primary_key: bool) -> Column {
        Column {
            table: table.to_string(),
            name: self.name,
            column_type: self.column_type,
            primary_key,
            nullable: self.nullable && !primary_key,
            unique: self.unique,
            indexed: self.indexed,
            autoincrement: self.autoincrement,
            default: self.default,
            foreign_key: self.foreign_key,
        }
    }
}

/// A column bound to its owning table.
///
/// Two kinds of comparison exist and are kept apart: [`Column::identity_eq`]
/// (also `==`) asks whether two handles denote the same schema column, while
/// [`Column::predicate_eq`] and friends build SQL predicates.
#[derive(Debug, Clone)]
pub struct Column {
    table: String,
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    nullable: bool,
    unique: bool,
    indexed: bool,
    autoincrement: bool,
    default: Option<DataType>,
    foreign_key: Option<ForeignKey>,
}

impl Column {
    /// Name of the owning table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Whether the column belongs to the primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether the column accepts `NULL`.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether the column is unique.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether the column is indexed.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether the database generates the column's values.
    #[must_use]
    pub const fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    /// Client-side default value.
    #[must_use]
    pub const fn default_value(&self) -> Option<&DataType> {
        self.default.as_ref()
    }

    /// Foreign key target.
    #[must_use]
    pub const fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign_key.as_ref()
    }

    /// `"col"`
    #[must_use]
    pub fn quoted_name(&self) -> String {
        quote_ident(&self.name)
    }

    /// `"table"."col"`
    #[must_use]
    pub fn quoted_fullname(&self) -> String {
        format!("{}.{}", quote_ident(&self.table), quote_ident(&self.name))
    }

    /// `t_table_col`, the alias the column is projected under in a select.
    #[must_use]
    pub fn alias_name(&self) -> String {
        format!("t_{}_{}", self.table, self.name)
    }

    /// `"t_table_col"`
    #[must_use]
    pub fn quoted_alias_name(&self) -> String {
        quote_ident(&self.alias_name())
    }

    /// Structural identity: same owning table and same name.
    #[must_use]
    pub fn identity_eq(&self, other: &Self) -> bool {
        self.table == other.table && self.name == other.name
    }

    /// Converts a driver value into this column's representation.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the column's type cannot
    /// hold the value.
    pub fn coerce(&self, value: DataType) -> std::result::Result<DataType, String> {
        self.column_type.coerce(value)
    }

    /// `column = operand`
    #[must_use]
    pub fn predicate_eq(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(Operator::Eq, operand)
    }

    /// `column != operand`
    #[must_use]
    pub fn predicate_ne(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(Operator::Ne, operand)
    }

    /// `column < operand`
    #[must_use]
    pub fn lt(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(Operator::Lt, operand)
    }

    /// `column > operand`
    #[must_use]
    pub fn gt(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(Operator::Gt, operand)
    }

    /// `column <= operand`
    #[must_use]
    pub fn lte(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(Operator::Lte, operand)
    }

    /// `column >= operand`
    #[must_use]
    pub fn gte(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(Operator::Gte, operand)
    }

    /// `column LIKE pattern`
    #[must_use]
    pub fn like(&self, pattern: impl Into<String>) -> Predicate {
        self.compare(Operator::Like, DataType::Str(Some(pattern.into())))
    }

    /// `column ILIKE pattern`. Only valid on dialects that support it.
    #[must_use]
    pub fn ilike(&self, pattern: impl Into<String>) -> Predicate {
        self.compare(Operator::ILike, DataType::Str(Some(pattern.into())))
    }

    /// `column IN (v1, v2, ...)`
    #[must_use]
    pub fn is_in<V: Into<DataType>>(&self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::In {
            column: self.clone(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Ascending sort on this column.
    #[must_use]
    pub fn asc(&self) -> Sorter {
        Sorter::single(self.clone(), SortOrder::Asc)
    }

    /// Descending sort on this column.
    #[must_use]
    pub fn desc(&self) -> Sorter {
        Sorter::single(self.clone(), SortOrder::Desc)
    }

    /// Sort on this column in the given direction, parsed from `"asc"` or
    /// `"desc"`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any other direction.
    pub fn sort(&self, direction: &str) -> Result<Sorter> {
        Ok(Sorter::single(self.clone(), direction.parse()?))
    }

    fn compare(&self, operator: Operator, operand: impl Into<Operand>) -> Predicate {
        Predicate::Comparison {
            column: self.clone(),
            operator,
            operand: operand.into(),
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.identity_eq(other)
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.name.hash(state);
    }
}
