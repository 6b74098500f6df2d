//! Tests for row-based INSERT, UPDATE, and DELETE.

mod common;

use common::{MockConnection, assert_sql_contains, init_tracing, posts, users, users_with_posts};
use strata_orm::{
    ColumnDef, ColumnType, DataType, Dialect, Error, InsertQuery, Row, RowDeleteQuery, Table, TableRow,
};

fn user(id: i32, name: &str) -> TableRow {
    let mut row = TableRow::new(&users());
    row.set("id", id).unwrap();
    row.set("name", name).unwrap();
    row
}

#[test]
fn insert_fills_defaults_and_skips_unset_nullables() {
    let posts = posts();
    let users = users_with_posts(&posts);
    let mut row = TableRow::new(&users);
    row.set("id", 1).unwrap();

    let statements = InsertQuery::new().add_row(row).compile().unwrap();

    assert_eq!(statements[0].sql, r#"INSERT INTO "users" ("id", "active") VALUES (:param_0, :param_1)"#);
    assert_eq!(statements[0].params.get("param_1"), Some(&DataType::Boolean(Some(true))));
}

#[test]
fn insert_without_values_uses_defaults() {
    let notes = Table::builder("notes")
        .column(ColumnDef::new("body", ColumnType::Text))
        .build()
        .unwrap();

    let statements = InsertQuery::new().add_row(TableRow::new(&notes)).compile().unwrap();
    assert_eq!(statements[0].sql, r#"INSERT INTO "notes" DEFAULT VALUES"#);
    assert!(statements[0].params.is_empty());
}

#[test]
fn postgres_placeholders() {
    let statements = InsertQuery::new().dialect(Dialect::POSTGRES).add_row(user(1, "a")).compile().unwrap();
    assert_sql_contains(&statements[0].sql, &["VALUES ($param_0, $param_1)"]);
}

#[test]
fn delete_requires_primary_key() {
    let notes = Table::builder("notes")
        .column(ColumnDef::new("body", ColumnType::Text))
        .build()
        .unwrap();

    let err = RowDeleteQuery::new().add_row(TableRow::new(&notes)).compile().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn inserted_rows_become_updatable() {
    init_tracing();
    let connection = MockConnection::new();
    let session = connection.session();

    let mut insert = session.insert().add_rows([user(1, "ann"), user(2, "bob")]);
    let affected = session.run_insert(&mut insert).await.unwrap();
    assert_eq!(affected, 2);
    assert!(insert.rows().iter().all(TableRow::existed));

    // Fresh snapshot: nothing to write yet.
    let mut ann = insert.rows()[0].clone();
    let mut update = session.update().add_row(ann.clone());
    assert_eq!(session.run_update(&mut update).await.unwrap(), 0);

    ann.set("name", "anne").unwrap();
    let mut update = session.update().add_row(ann);
    assert_eq!(session.run_update(&mut update).await.unwrap(), 1);
    assert_eq!(session.run_update(&mut update).await.unwrap(), 0);

    let executed = connection.executed();
    assert_eq!(executed.len(), 3);
    assert_eq!(executed[1].0, r#"INSERT INTO "users" ("id", "name") VALUES (:param_2, :param_3)"#);
    assert_eq!(executed[2].0, r#"UPDATE "users" SET "name" = :param_0 WHERE ("id" = :param_1)"#);
    assert_eq!(executed[2].1.get("param_0"), Some(&DataType::from("anne")));
}

#[tokio::test]
async fn primary_key_change_targets_old_key() {
    let connection = MockConnection::new();
    let session = connection.session();

    let mut insert = session.insert().add_row(user(1, "ann"));
    session.run_insert(&mut insert).await.unwrap();

    let mut ann = insert.rows()[0].clone();
    ann.set("id", 5).unwrap();
    session.run_update(&mut session.update().add_row(ann)).await.unwrap();

    let (sql, params) = connection.executed().pop().unwrap();
    assert_eq!(sql, r#"UPDATE "users" SET "id" = :param_0 WHERE ("id" = :param_1)"#);
    assert_eq!(params.get("param_0"), Some(&DataType::Int32(Some(5))));
    assert_eq!(params.get("param_1"), Some(&DataType::Int32(Some(1))));
}

#[tokio::test]
async fn deleted_rows_are_flagged() {
    let connection = MockConnection::new();
    let session = connection.session();

    let mut delete = session.delete().add_rows([user(1, "ann"), user(2, "bob")]);
    assert_eq!(session.run_delete(&mut delete).await.unwrap(), 2);
    assert!(delete.rows().iter().all(TableRow::is_deleted));

    let executed = connection.executed();
    assert_eq!(executed[0].0, r#"DELETE FROM "users" WHERE ("users"."id" = :param_0)"#);
    assert_eq!(executed[1].0, r#"DELETE FROM "users" WHERE ("users"."id" = :param_1)"#);
    assert_eq!(executed[1].1.get("param_1"), Some(&DataType::Int32(Some(2))));
}

#[tokio::test]
async fn generated_keys_are_read_back() {
    init_tracing();
    let connection = MockConnection::new();
    connection.push_result(vec![Row::new([("id", DataType::from(7_i64))])]);
    let session = connection.session();

    let mut cat = TableRow::new(&users());
    cat.set("name", "cat").unwrap();
    let mut insert = session.insert().add_row(cat);
    assert_eq!(session.run_insert(&mut insert).await.unwrap(), 1);

    let mut cat = insert.rows()[0].clone();
    assert_eq!(cat.get::<i32>("id").unwrap(), 7);
    assert!(cat.history().iter().all(|h| !h.is_changed()));

    cat.set("name", "kit").unwrap();
    session.run_update(&mut session.update().add_row(cat)).await.unwrap();

    let executed = connection.executed();
    assert_eq!(executed[0].0, r#"INSERT INTO "users" ("name") VALUES (:param_0) RETURNING "id""#);
    assert_eq!(executed[1].0, r#"UPDATE "users" SET "name" = :param_0 WHERE ("id" = :param_1)"#);
    assert_eq!(executed[1].1.get("param_1"), Some(&DataType::Int32(Some(7))));
}

#[tokio::test]
async fn insert_without_returned_row_affects_nothing() {
    let connection = MockConnection::new();
    let session = connection.session();

    let mut insert = session.insert().add_row(TableRow::new(&users()));
    assert_eq!(session.run_insert(&mut insert).await.unwrap(), 0);
    assert_eq!(insert.rows()[0].get::<Option<i32>>("id").unwrap(), None);
}
