//! Predicates, sorters, and placeholder generation.
//!
//! A [`Predicate`] renders to a SQL fragment while binding its values into a
//! [`Params`] map. Every bound value draws exactly one name from the
//! [`Placeholders`] counter of the compilation it takes part in, so the
//! fragment and the parameter map stay aligned.

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::config_error;
use crate::error::{Error, Result};
use crate::schema::Column;
use crate::value::{DataType, Params};

/// SQL dialect details the compiler needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Sigil placed in front of named placeholders.
    pub param_prefix: char,

    /// Whether `ILIKE` is understood.
    pub supports_ilike: bool,

    /// Whether `INSERT ... RETURNING` is understood. Inserts read generated
    /// keys back through it.
    pub supports_returning: bool,
}

impl Dialect {
    /// SQLite 3.35 or later: `:param_0`, no `ILIKE`, with `RETURNING`.
    pub const SQLITE: Self = Self {
        param_prefix: ':',
        supports_ilike: false,
        supports_returning: true,
    };

    /// PostgreSQL: `$param_0`, with `ILIKE` and `RETURNING`. The driver is
    /// expected to rewrite named tokens into positional ones.
    pub const POSTGRES: Self = Self {
        param_prefix: '$',
        supports_ilike: true,
        supports_returning: true,
    };
}

impl Default for Dialect {
    fn default() -> Self {
        Self::SQLITE
    }
}

/// Placeholder name source for one compilation.
///
/// Names run `param_0`, `param_1`, ... in the order they are drawn. A fresh
/// counter is created for every `compile()` call and shared across all
/// fragments (and, for mutation queries, all rows) of that call.
#[derive(Debug, Clone)]
pub struct Placeholders {
    dialect: Dialect,
    next: usize,
}

impl Placeholders {
    /// Creates a counter starting at `param_0`.
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect, next: 0 }
    }

    /// Dialect the tokens are rendered for.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Number of names drawn so far.
    #[must_use]
    pub const fn drawn(&self) -> usize {
        self.next
    }

    /// Draws the next placeholder name.
    pub fn next_name(&mut self) -> String {
        let name = format!("param_{}", self.next);
        self.next += 1;
        name
    }

    /// Renders the in-SQL token for a placeholder name.
    #[must_use]
    pub fn token(&self, name: &str) -> String {
        format!("{}{name}", self.dialect.param_prefix)
    }

    /// Draws a name, binds `value` under it, and returns the token to embed.
    pub fn bind(&mut self, params: &mut Params, value: DataType) -> String {
        let name = self.next_name();
        let token = self.token(&name);
        params.push(name, value);
        token
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
    /// `ILIKE`
    ILike,
}

impl Operator {
    /// The SQL token.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal, bound as a parameter.
    Value(DataType),

    /// Another column, rendered inline.
    Column(Column),
}

impl From<&Column> for Operand {
    fn from(column: &Column) -> Self {
        Self::Column(column.clone())
    }
}

impl From<Column> for Operand {
    fn from(column: Column) -> Self {
        Self::Column(column)
    }
}

impl From<DataType> for Operand {
    fn from(value: DataType) -> Self {
        Self::Value(value)
    }
}

macro_rules! impl_operand_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Self::Value(value.into())
                }
            }
        )*
    };
}

impl_operand_from! {
    bool, i32, i64, u32, u64, f32, f64, String, &str, Vec<u8>,
    DateTime<Utc>, NaiveDateTime, NaiveDate, NaiveTime,
    Option<bool>, Option<i32>, Option<i64>, Option<u32>, Option<u64>,
    Option<f32>, Option<f64>, Option<String>, Option<&str>,
}

/// A boolean SQL condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> operand`
    Comparison {
        /// Left-hand column.
        column: Column,
        /// Operator.
        operator: Operator,
        /// Right-hand side.
        operand: Operand,
    },

    /// `column IN (v1, v2, ...)`
    In {
        /// Tested column.
        column: Column,
        /// Candidate values, one placeholder each.
        values: Vec<DataType>,
    },

    /// All of the inner predicates.
    And(Vec<Self>),

    /// Any of the inner predicates.
    Or(Vec<Self>),
}

impl Predicate {
    /// Combines with `other` under `AND`, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            }
            (left, Self::And(mut right)) => {
                right.insert(0, left);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Combines with `other` under `OR`, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            }
            (left, Self::Or(mut right)) => {
                right.insert(0, left);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    /// Renders the predicate, binding values into `params`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the predicate uses an operator the
    /// dialect does not support.
    pub fn to_sql(&self, placeholders: &mut Placeholders, params: &mut Params) -> Result<String> {
        match self {
            Self::Comparison {
                column,
                operator,
                operand,
            } => {
                if *operator == Operator::ILike && !placeholders.dialect().supports_ilike {
                    return Err(config_error!(
                        "ILIKE is not supported by this dialect (on {})",
                        column.quoted_fullname()
                    ));
                }

                let rhs = match operand {
                    Operand::Column(other) => other.quoted_fullname(),
                    Operand::Value(value) => placeholders.bind(params, value.clone()),
                };
                Ok(format!("{} {} {rhs}", column.quoted_fullname(), operator.as_sql()))
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    return Ok("1 = 0".to_string());
                }

                let tokens: Vec<String> =
                    values.iter().map(|value| placeholders.bind(params, value.clone())).collect();
                Ok(format!("{} IN ({})", column.quoted_fullname(), tokens.join(", ")))
            }
            Self::And(inner) => join_all(inner, " AND ", "1 = 1", placeholders, params),
            Self::Or(inner) => join_all(inner, " OR ", "1 = 0", placeholders, params),
        }
    }
}

fn join_all(
    inner: &[Predicate], separator: &str, empty: &str, placeholders: &mut Placeholders,
    params: &mut Params,
) -> Result<String> {
    if inner.is_empty() {
        return Ok(empty.to_string());
    }

    let parts = inner
        .iter()
        .map(|predicate| predicate.to_sql(placeholders, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", parts.join(separator)))
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// `ASC`
    #[default]
    Asc,
    /// `DESC`
    Desc,
}

impl SortOrder {
    /// The SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(config_error!("unknown sort order '{}', expected 'asc' or 'desc'", s))
        }
    }
}

/// An `ORDER BY` term over one or more columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Sorter {
    columns: Vec<Column>,
    order: SortOrder,
}

impl Sorter {
    /// Sorts by `columns` in `order`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `columns` is empty.
    pub fn new(columns: impl IntoIterator<Item = Column>, order: SortOrder) -> Result<Self> {
        let columns: Vec<Column> = columns.into_iter().collect();
        if columns.is_empty() {
            return Err(config_error!("order_by requires at least one column"));
        }
        Ok(Self { columns, order })
    }

    pub(crate) fn single(column: Column, order: SortOrder) -> Self {
        Self {
            columns: vec![column],
            order,
        }
    }

    /// Sorted columns.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Direction.
    #[must_use]
    pub const fn order(&self) -> SortOrder {
        self.order
    }

    /// Renders `"alias", "alias" ASC`. Sorters take part in a compilation
    /// like predicates do but never draw a placeholder.
    #[must_use]
    pub fn to_sql(&self, _placeholders: &mut Placeholders) -> String {
        let columns: Vec<String> = self.columns.iter().map(Column::quoted_alias_name).collect();
        format!("{} {}", columns.join(", "), self.order)
    }
}
