use crate::value::DataType;

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// SMALLINT
    SmallInt,
    /// INTEGER
    Integer,
    /// BIGINT
    BigInt,
    /// REAL
    Real,
    /// DOUBLE PRECISION
    Double,
    /// BOOLEAN
    Boolean,
    /// VARCHAR with an optional maximum length
    String(Option<u32>),
    /// TEXT
    Text,
    /// BLOB / BYTEA
    Binary,
    /// DATE
    Date,
    /// TIME
    Time,
    /// TIMESTAMP
    Timestamp,
}

impl ColumnType {
    /// DDL name of the type.
    #[must_use]
    pub fn sql_name(&self) -> String {
        match self {
            Self::SmallInt => "SMALLINT".to_string(),
            Self::Integer => "INTEGER".to_string(),
            Self::BigInt => "BIGINT".to_string(),
            Self::Real => "REAL".to_string(),
            Self::Double => "DOUBLE PRECISION".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::String(Some(size)) => format!("VARCHAR({size})"),
            Self::String(None) => "VARCHAR".to_string(),
            Self::Text => "TEXT".to_string(),
            Self::Binary => "BLOB".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Time => "TIME".to_string(),
            Self::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    /// The typed `NULL` for this column type.
    #[must_use]
    pub const fn null_value(&self) -> DataType {
        match self {
            Self::SmallInt | Self::Integer => DataType::Int32(None),
            Self::BigInt => DataType::Int64(None),
            Self::Real => DataType::Float(None),
            Self::Double => DataType::Double(None),
            Self::Boolean => DataType::Boolean(None),
            Self::String(_) | Self::Text => DataType::Str(None),
            Self::Binary => DataType::Binary(None),
            Self::Date => DataType::Date(None),
            Self::Time => DataType::Time(None),
            Self::Timestamp => DataType::Timestamp(None),
        }
    }

    /// Normalises a driver value into the representation this type stores.
    ///
    /// Drivers that only know 64-bit integers (SQLite) hand back `Int64` for
    /// every integer column; such values are narrowed when they fit.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the value cannot be held by
    /// this type.
    #[allow(clippy::cast_possible_truncation)]
    pub fn coerce(&self, value: DataType) -> Result<DataType, String> {
        if value.is_null() {
            return Ok(self.null_value());
        }

        let coerced = match (self, value) {
            (Self::SmallInt | Self::Integer, DataType::Int32(v)) => DataType::Int32(v),
            (Self::SmallInt | Self::Integer, DataType::Int64(Some(v))) => {
                let narrowed = i32::try_from(v).map_err(|e| format!("{v} out of range for {}: {e}", self.sql_name()))?;
                DataType::Int32(Some(narrowed))
            }
            (Self::SmallInt | Self::Integer, DataType::Uint32(Some(v))) => {
                let narrowed = i32::try_from(v).map_err(|e| format!("{v} out of range for {}: {e}", self.sql_name()))?;
                DataType::Int32(Some(narrowed))
            }

            (Self::BigInt, DataType::Int64(v)) => DataType::Int64(v),
            (Self::BigInt, DataType::Int32(Some(v))) => DataType::Int64(Some(i64::from(v))),
            (Self::BigInt, DataType::Uint32(Some(v))) => DataType::Int64(Some(i64::from(v))),
            (Self::BigInt, DataType::Uint64(Some(v))) => {
                let narrowed = i64::try_from(v).map_err(|e| format!("{v} out of range for BIGINT: {e}"))?;
                DataType::Int64(Some(narrowed))
            }

            (Self::Real, DataType::Float(v)) => DataType::Float(v),
            (Self::Real, DataType::Double(Some(v))) => DataType::Float(Some(v as f32)),
            (Self::Double, DataType::Double(v)) => DataType::Double(v),
            (Self::Double, DataType::Float(Some(v))) => DataType::Double(Some(f64::from(v))),
            (Self::Real | Self::Double, DataType::Int32(Some(v))) => {
                self.coerce(DataType::Double(Some(f64::from(v))))?
            }

            (Self::Boolean, DataType::Boolean(v)) => DataType::Boolean(v),
            (Self::Boolean, DataType::Int64(Some(v @ (0 | 1)))) => DataType::Boolean(Some(v == 1)),
            (Self::Boolean, DataType::Int32(Some(v @ (0 | 1)))) => DataType::Boolean(Some(v == 1)),

            (Self::String(_) | Self::Text, DataType::Str(v)) => DataType::Str(v),
            (Self::Binary, DataType::Binary(v)) => DataType::Binary(v),

            (Self::Date, DataType::Date(v) | DataType::Str(v)) => DataType::Date(v),
            (Self::Time, DataType::Time(v) | DataType::Str(v)) => DataType::Time(v),
            (Self::Timestamp, DataType::Timestamp(v) | DataType::Str(v)) => DataType::Timestamp(v),

            (_, other) => {
                return Err(format!("{other:?} is not compatible with {}", self.sql_name()));
            }
        };

        Ok(coerced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_narrowing() {
        assert_eq!(ColumnType::Integer.coerce(DataType::Int64(Some(5))), Ok(DataType::Int32(Some(5))));
        assert!(ColumnType::Integer.coerce(DataType::Int64(Some(i64::MAX))).is_err());
        assert_eq!(ColumnType::BigInt.coerce(DataType::Int32(Some(5))), Ok(DataType::Int64(Some(5))));
    }

    #[test]
    fn boolean_from_integer() {
        assert_eq!(ColumnType::Boolean.coerce(DataType::Int64(Some(1))), Ok(DataType::Boolean(Some(true))));
        assert_eq!(ColumnType::Boolean.coerce(DataType::Int64(Some(0))), Ok(DataType::Boolean(Some(false))));
        assert!(ColumnType::Boolean.coerce(DataType::Int64(Some(2))).is_err());
    }

    #[test]
    fn null_takes_column_type() {
        assert_eq!(ColumnType::Text.coerce(DataType::Int64(None)), Ok(DataType::Str(None)));
        assert_eq!(ColumnType::BigInt.coerce(DataType::NULL), Ok(DataType::Int64(None)));
    }

    #[test]
    fn incompatible_values() {
        let err = ColumnType::Integer.coerce(DataType::from("abc")).unwrap_err();
        assert!(err.contains("INTEGER"));
        assert!(ColumnType::Binary.coerce(DataType::from(1)).is_err());
    }

    #[test]
    fn sql_names() {
        assert_eq!(ColumnType::String(Some(64)).sql_name(), "VARCHAR(64)");
        assert_eq!(ColumnType::Double.sql_name(), "DOUBLE PRECISION");
    }
}
