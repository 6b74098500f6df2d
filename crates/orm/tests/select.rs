//! Tests for SELECT compilation.

mod common;

use std::collections::HashSet;

use common::{assert_sql_contains, posts, users, users_with_posts};
use strata_orm::{DataType, Dialect, Error, SelectQuery, SortOrder};

#[test]
fn projection_aliases_every_column() {
    let posts = posts();
    let statement = SelectQuery::new().from(&posts).compile().unwrap();

    assert_sql_contains(
        &statement.sql,
        &[
            "SELECT posts.id AS t_posts_id",
            "posts.author_id AS t_posts_author_id",
            "posts.title AS t_posts_title",
            "FROM posts",
        ],
    );
    assert!(!statement.sql.contains("WHERE"));
}

#[test]
fn joined_relationship_projects_foreign_columns() {
    let posts = posts();
    let users = users_with_posts(&posts);
    let statement = SelectQuery::new().from(&users).compile().unwrap();

    assert_sql_contains(
        &statement.sql,
        &[
            "users.active AS t_users_active",
            "posts.id AS t_posts_id",
            "posts.title AS t_posts_title",
            "FROM users JOIN posts ON users.id = posts.author_id",
        ],
    );
}

#[test]
fn conditions_are_anded_in_call_order() {
    let users = users();
    let id = users.column("id").unwrap();
    let name = users.column("name").unwrap();

    let statement = SelectQuery::new()
        .from(&users)
        .r#where(name.like("a%"))
        .r#where(id.is_in([1, 2]) | id.gte(100))
        .compile()
        .unwrap();

    assert_sql_contains(
        &statement.sql,
        &[
            "WHERE users.name LIKE :param_0",
            "AND (users.id IN (:param_1, :param_2) OR users.id >= :param_3)",
        ],
    );
    assert_eq!(statement.params.get("param_0"), Some(&DataType::from("a%")));
    assert_eq!(statement.params.get("param_3"), Some(&DataType::from(100)));
}

#[test]
fn placeholders_are_unique_and_all_bound() {
    let users = users();
    let id = users.column("id").unwrap();
    let name = users.column("name").unwrap();

    let statement = SelectQuery::new()
        .from(&users)
        .where_all([id.gt(1), name.predicate_ne("x"), id.is_in([5, 6, 7])])
        .limit(10)
        .compile()
        .unwrap();

    let names: Vec<&str> = statement.params.names().collect();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), 5);
    assert_eq!(unique.len(), 5);
    for name in names {
        assert!(statement.sql.contains(&format!(":{name}")), "{name} missing from SQL");
    }
}

#[test]
fn limit_offset_precede_order_by() {
    let users = users();
    let statement = SelectQuery::new()
        .from(&users)
        .limit(0)
        .offset(0)
        .order_by_sorter(users.column("name").unwrap().desc())
        .compile()
        .unwrap();

    assert!(statement.sql.ends_with(r#" LIMIT 0 OFFSET 0 ORDER BY "t_users_name" DESC"#));
}

#[test]
fn compile_is_deterministic() {
    let users = users();
    let query = SelectQuery::new()
        .from(&users)
        .r#where(users.column("id").unwrap().predicate_eq(3))
        .order_by([users.column("id").unwrap()], SortOrder::Asc)
        .unwrap();

    assert_eq!(query.compile().unwrap(), query.compile().unwrap());
}

#[test]
fn column_comparison_binds_nothing() {
    let posts = posts();
    let users = users();
    let statement = SelectQuery::new()
        .from(&posts)
        .r#where(posts.column("author_id").unwrap().predicate_eq(users.column("id").unwrap()))
        .compile()
        .unwrap();

    assert_sql_contains(&statement.sql, &["WHERE posts.author_id = users.id"]);
    assert!(statement.params.is_empty());
}

#[test]
fn ilike_needs_dialect_support() {
    let users = users();
    let query = SelectQuery::new().from(&users).r#where(users.column("name").unwrap().ilike("A%"));

    assert!(matches!(query.compile(), Err(Error::Configuration(_))));

    let statement = query.dialect(Dialect::POSTGRES).compile().unwrap();
    assert_sql_contains(&statement.sql, &["users.name ILIKE $param_0"]);
}

#[test]
fn sort_direction_parsing() {
    let users = users();
    let name = users.column("name").unwrap();

    let statement = SelectQuery::new().from(&users).order_by_sorter(name.sort("desc").unwrap()).compile().unwrap();
    assert!(statement.sql.ends_with("DESC"));

    assert!(matches!(name.sort("sideways"), Err(Error::Configuration(_))));
}
