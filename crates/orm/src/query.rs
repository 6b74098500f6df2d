use crate::value::Params;

/// A compiled statement: SQL text plus the parameters its placeholders name.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with dialect placeholder tokens.
    pub sql: String,

    /// Values keyed by placeholder name, in emission order.
    pub params: Params,

    /// Columns the statement reads back, by name. Only inserts that leave
    /// key columns to the database return anything.
    pub returning: Vec<String>,
}

impl Statement {
    pub(crate) const fn new(sql: String, params: Params) -> Self {
        Self {
            sql,
            params,
            returning: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_returning(mut self, columns: Vec<String>) -> Self {
        self.returning = columns;
        self
    }
}
