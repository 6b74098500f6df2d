//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use strata_orm::{
    ColumnDef, ColumnType, Connection, Cursor, DataType, FutureResult, Params, RelationshipDef, Row,
    Session, Table,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Installs a test-writer subscriber filtered by `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = Registry::default().with(EnvFilter::from_default_env()).with(fmt::layer().with_test_writer()).try_init();
}

// Common test tables used across multiple test files

/// `posts(id PK, author_id -> users.id, title)`.
pub fn posts() -> Arc<Table> {
    Table::builder("posts")
        .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDef::new("author_id", ColumnType::Integer).foreign_key("users", "id"))
        .column(ColumnDef::new("title", ColumnType::Text))
        .build()
        .unwrap()
}

/// `users(id PK, name)` with no relationships.
pub fn users() -> Arc<Table> {
    Table::builder("users")
        .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDef::new("name", ColumnType::Text))
        .build()
        .unwrap()
}

/// `users(id PK, name, active)` loading `posts` with a join.
pub fn users_with_posts(posts: &Arc<Table>) -> Arc<Table> {
    Table::builder("users")
        .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDef::new("name", ColumnType::Text))
        .column(ColumnDef::new("active", ColumnType::Boolean).default(true))
        .relationship(RelationshipDef::new("posts", "id", posts, "author_id").joined())
        .build()
        .unwrap()
}

/// A physical row of the joined `users`/`posts` projection.
pub fn joined_row(user: i64, name: &str, post: Option<(i64, &str)>) -> Row {
    let (post_id, title) = match post {
        Some((id, title)) => (DataType::from(id), DataType::from(title)),
        None => (DataType::Int64(None), DataType::Str(None)),
    };
    let author_id = if post.is_some() { DataType::from(user) } else { DataType::Int64(None) };

    Row::new([
        ("t_users_id", DataType::from(user)),
        ("t_users_name", DataType::from(name)),
        ("t_users_active", DataType::from(1_i64)),
        ("t_posts_id", post_id),
        ("t_posts_author_id", author_id),
        ("t_posts_title", title),
    ])
}

/// Cursor over canned rows. An `Err` entry is returned once, in place.
pub struct VecCursor(VecDeque<anyhow::Result<Row>>);

impl VecCursor {
    pub fn boxed(rows: Vec<anyhow::Result<Row>>) -> Box<dyn Cursor> {
        Box::new(Self(rows.into()))
    }

    pub fn ok(rows: Vec<Row>) -> Box<dyn Cursor> {
        Self::boxed(rows.into_iter().map(Ok).collect())
    }
}

impl Cursor for VecCursor {
    fn fetch_row(&mut self) -> BoxFuture<'_, anyhow::Result<Option<Row>>> {
        let next = self.0.pop_front().transpose();
        Box::pin(async move { next })
    }
}

/// Connection that records every statement and answers queries with
/// queued result sets.
#[derive(Debug, Default)]
pub struct MockConnection {
    results: Mutex<VecDeque<Vec<Row>>>,
    executed: Mutex<Vec<(String, Params)>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the rows returned by the next `query`.
    pub fn push_result(&self, rows: Vec<Row>) {
        self.results.lock().push_back(rows);
    }

    /// Statements seen so far, queries and executions alike.
    pub fn executed(&self) -> Vec<(String, Params)> {
        self.executed.lock().clone()
    }

    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self) as Arc<dyn Connection>)
    }
}

impl Connection for MockConnection {
    fn query(&self, sql: String, params: Params) -> FutureResult<Box<dyn Cursor>> {
        self.executed.lock().push((sql, params));
        let rows = self.results.lock().pop_front().unwrap_or_default();
        Box::pin(async move { Ok(VecCursor::ok(rows)) })
    }

    fn exec(&self, sql: String, params: Params) -> FutureResult<u64> {
        self.executed.lock().push((sql, params));
        Box::pin(async move { Ok(1) })
    }
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and normalizing whitespace.
/// Preserves quotes inside string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' if !in_single_quote => {}
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Strips identifier quotes, normalizes whitespace, and checks that fragments
/// appear sequentially in the generated SQL.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            panic!("expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`");
        }
    }
}
