//! Schema metadata: tables, columns, and relationships.
//!
//! Tables are declared with [`Table::builder`] and frozen into an
//! `Arc<Table>`; nothing in a built table changes afterwards, so the same
//! definition can be shared freely across tasks. Tables referenced by a
//! relationship must be built first.

mod column;
mod relationship;
mod table;
mod types;

pub use column::{Column, ColumnDef, ForeignKey};
pub use relationship::{LoadStrategy, Relationship, RelationshipDef};
pub use table::{Table, TableBuilder};
pub use types::ColumnType;

/// Quotes an identifier, doubling embedded quotes.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
