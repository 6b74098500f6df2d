use std::fmt::Debug;

use futures::future::BoxFuture;

use crate::value::{Params, Row};

/// Future returned by [`Connection`] methods.
pub type FutureResult<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Database drivers implement the [`Connection`] trait to let a
/// [`Session`](crate::Session) execute compiled statements.
pub trait Connection: Debug + Send + Sync + 'static {
    /// Execute a query and return a cursor over its rows.
    ///
    /// Rows must be produced in database order, keyed by projected alias.
    fn query(&self, sql: String, params: Params) -> FutureResult<Box<dyn Cursor>>;

    /// Execute a statement that does not return rows (e.g., an `INSERT`,
    /// `UPDATE`, or `DELETE`) and return the number of affected rows.
    fn exec(&self, sql: String, params: Params) -> FutureResult<u64>;
}

/// A forward-only cursor over the rows of one query.
///
/// Rows of a joined select must arrive contiguous by the primary table's
/// primary key; the grouping in [`ResultStream`](crate::ResultStream) relies
/// on it and does not re-sort.
pub trait Cursor: Send {
    /// Fetch the next row, or `None` once the cursor is exhausted.
    fn fetch_row(&mut self) -> BoxFuture<'_, anyhow::Result<Option<Row>>>;
}
