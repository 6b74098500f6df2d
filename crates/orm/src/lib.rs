//! Query builders and a streaming row mapper for relational databases.
//!
//! Tables are described once with [`Table::builder`]. Queries are built
//! against those definitions, compiled to SQL with named placeholders, and
//! executed through a [`Session`] wrapping any [`Connection`]. Select results
//! come back as a [`ResultStream`] that folds the fan-out of joined
//! relationships back into one [`TableRow`] per record.
//!
//! # Quick Start
//!
//! ## Define tables
//!
//! ```ignore
//! use strata_orm::{ColumnDef, ColumnType, RelationshipDef, Table};
//!
//! let posts = Table::builder("posts")
//!     .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
//!     .column(ColumnDef::new("author_id", ColumnType::Integer).foreign_key("users", "id"))
//!     .column(ColumnDef::new("title", ColumnType::Text))
//!     .build()?;
//!
//! let users = Table::builder("users")
//!     .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
//!     .column(ColumnDef::new("name", ColumnType::Text))
//!     .relationship(RelationshipDef::new("posts", "id", &posts, "author_id").joined())
//!     .build()?;
//! ```
//!
//! ## Select
//!
//! ```ignore
//! let session = Session::new(connection);
//! let name = users.column("name").unwrap();
//!
//! let mut stream = session
//!     .select(&users)
//!     .r#where(name.like("a%"))
//!     .limit(10)
//!     .all(&session)
//!     .await?;
//!
//! while let Some(user) = stream.next().await? {
//!     println!("{} wrote {} posts", user.get::<String>("name")?, user.related("posts").len());
//! }
//! ```
//!
//! ## Insert, update, delete
//!
//! ```ignore
//! let mut user = TableRow::new(&users);
//! user.set("id", 1)?;
//! user.set("name", "ann")?;
//!
//! let mut insert = session.insert().add_row(user);
//! session.run_insert(&mut insert).await?;
//!
//! let mut user = insert.rows()[0].clone();
//! user.set("name", "anne")?;
//! session.run_update(&mut session.update().add_row(user)).await?;
//! ```

mod connection;
mod error;
mod mutation;
mod operators;
mod query;
mod row;
mod schema;
mod select;
mod session;
mod stream;
mod value;

pub use connection::{Connection, Cursor, FutureResult};
pub use error::{Error, Result};
pub use mutation::{InsertQuery, RowDeleteQuery, RowUpdateQuery};
pub use operators::{Dialect, Operand, Operator, Placeholders, Predicate, SortOrder, Sorter};
pub use query::Statement;
pub use row::{ColumnHistory, TableRow};
pub use schema::{
    Column, ColumnDef, ColumnType, ForeignKey, LoadStrategy, Relationship, RelationshipDef, Table,
    TableBuilder,
};
pub use select::SelectQuery;
pub use session::Session;
pub use stream::{ResultStream, RowGrouper};
pub use value::{DataType, FetchValue, Field, Params, Row};
