//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, compiling, or streaming queries.
#[derive(Error, Debug)]
pub enum Error {
    /// The query or builder was used incorrectly. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A fetched row could not be mapped onto the table's row type.
    #[error("cannot map row for table '{table}' (columns: {}): {reason}", columns.join(", "))]
    Mapping {
        /// Table the row was being mapped onto.
        table: String,
        /// Offending column or alias names.
        columns: Vec<String>,
        /// Why the columns were rejected.
        reason: String,
    },

    /// A table definition is invalid.
    #[error("schema error: {0}")]
    Schema(String),

    /// A stored value could not be converted to the requested Rust type.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The connection or cursor collaborator failed.
    #[error(transparent)]
    Cursor(#[from] anyhow::Error),
}

/// Builds an [`Error::Configuration`] from a format string.
#[macro_export]
macro_rules! config_error {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Configuration(format!($fmt, $($arg)*))
    };
    ($desc:expr $(,)?) => {
        $crate::Error::Configuration(format!($desc))
    };
}
