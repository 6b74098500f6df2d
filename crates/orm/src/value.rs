//! Values exchanged with the cursor collaborator.
//!
//! [`DataType`] is the driver-facing value representation: every variant
//! carries an `Option` so a SQL `NULL` keeps its type. Query parameters are
//! gathered into [`Params`], and rows come back from a cursor as [`Row`]s
//! keyed by projected alias.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::row::TableRow;

/// A single typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// BOOLEAN
    Boolean(Option<bool>),
    /// 32-bit signed integer
    Int32(Option<i32>),
    /// 64-bit signed integer
    Int64(Option<i64>),
    /// 32-bit unsigned integer
    Uint32(Option<u32>),
    /// 64-bit unsigned integer
    Uint64(Option<u64>),
    /// Single precision float
    Float(Option<f32>),
    /// Double precision float
    Double(Option<f64>),
    /// Text
    Str(Option<String>),
    /// Raw bytes
    Binary(Option<Vec<u8>>),
    /// Date formatted as `%Y-%m-%d`
    Date(Option<String>),
    /// Time formatted as `%H:%M:%S%.f`
    Time(Option<String>),
    /// Timestamp formatted as RFC 3339 or `%Y-%m-%d %H:%M:%S%.f`
    Timestamp(Option<String>),
}

impl DataType {
    /// An untyped SQL `NULL`.
    pub const NULL: Self = Self::Str(None);

    /// Returns `true` if this value is SQL `NULL`, whatever its type.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Boolean(None)
                | Self::Int32(None)
                | Self::Int64(None)
                | Self::Uint32(None)
                | Self::Uint64(None)
                | Self::Float(None)
                | Self::Double(None)
                | Self::Str(None)
                | Self::Binary(None)
                | Self::Date(None)
                | Self::Time(None)
                | Self::Timestamp(None)
        )
    }

    /// Renders the value as JSON. Binary values are base64 encoded.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Boolean(Some(v)) => Value::Bool(*v),
            Self::Int32(Some(v)) => Value::Number((*v).into()),
            Self::Int64(Some(v)) => Value::Number((*v).into()),
            Self::Uint32(Some(v)) => Value::Number((*v).into()),
            Self::Uint64(Some(v)) => Value::Number((*v).into()),
            Self::Float(Some(v)) => {
                serde_json::Number::from_f64(f64::from(*v)).map_or(Value::Null, Value::Number)
            }
            Self::Double(Some(v)) => {
                serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number)
            }
            Self::Str(Some(v))
            | Self::Date(Some(v))
            | Self::Time(Some(v))
            | Self::Timestamp(Some(v)) => Value::String(v.clone()),
            Self::Binary(Some(v)) => Value::String(Base64::encode_string(v)),
            _ => Value::Null,
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DataType {
                fn from(value: $ty) -> Self {
                    Self::$variant(Some(value))
                }
            }

            impl From<Option<$ty>> for DataType {
                fn from(value: Option<$ty>) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float,
    f64 => Double,
    String => Str,
    Vec<u8> => Binary,
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        Self::Str(Some(value.to_string()))
    }
}

impl From<Option<&str>> for DataType {
    fn from(value: Option<&str>) -> Self {
        Self::Str(value.map(ToString::to_string))
    }
}

impl From<DateTime<Utc>> for DataType {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(Some(value.to_rfc3339()))
    }
}

impl From<NaiveDateTime> for DataType {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(Some(value.to_string()))
    }
}

impl From<NaiveDate> for DataType {
    fn from(value: NaiveDate) -> Self {
        Self::Date(Some(value.to_string()))
    }
}

impl From<NaiveTime> for DataType {
    fn from(value: NaiveTime) -> Self {
        Self::Time(Some(value.to_string()))
    }
}

impl From<serde_json::Value> for DataType {
    fn from(value: serde_json::Value) -> Self {
        Self::Str(Some(value.to_string()))
    }
}

/// A named value within a [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name or projected alias.
    pub name: String,

    /// The value.
    pub value: DataType,
}

/// A single physical row fetched from a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Fields in projection order.
    pub fields: Vec<Field>,
}

impl Row {
    /// Creates a row from `(name, value)` pairs.
    pub fn new<N, V>(fields: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<DataType>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| Field {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Looks up a field value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|field| field.name == name).map(|field| &field.value)
    }

    /// Appends a field.
    pub fn push(&mut self, name: impl Into<String>, value: DataType) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }

    /// Returns `true` when the row has no fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Bound parameters of one statement, keyed by placeholder name in emission
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, DataType)>);

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Binds `value` under `name`, replacing any existing binding.
    pub fn insert(&mut self, name: impl Into<String>, value: DataType) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    /// Appends a binding whose name is known to be fresh.
    pub(crate) fn push(&mut self, name: String, value: DataType) {
        self.0.push((name, value));
    }

    /// Looks up a bound value by placeholder name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.0.iter().find(|(existing, _)| existing == name).map(|(_, value)| value)
    }

    /// Number of bound values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing is bound.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Placeholder names in emission order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates `(name, value)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataType)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for Params {
    type IntoIter = std::vec::IntoIter<(String, DataType)>;
    type Item = (String, DataType);

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Trait for types that can be extracted from a mapped [`TableRow`].
///
/// Implemented for the standard Rust types a column can hold (`i32`,
/// `String`, `DateTime<Utc>`, ...). `Option<T>` yields `None` for a missing
/// or `NULL` column.
pub trait FetchValue: Sized {
    /// Fetch a value from a row by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the value cannot be
    /// converted to the target type.
    fn fetch(row: &TableRow, column: &str) -> Result<Self>;
}

fn row_value<'a>(row: &'a TableRow, column: &str) -> Result<&'a DataType> {
    row.value(column)
        .ok_or_else(|| Error::Conversion(format!("missing value for column '{column}'")))
}

macro_rules! impl_fetch_value {
    ($ty:ty, $expected:literal, $($pattern:pat => $convert:expr),+ $(,)?) => {
        impl FetchValue for $ty {
            fn fetch(row: &TableRow, column: &str) -> Result<Self> {
                match row_value(row, column)? {
                    $($pattern => $convert,)+
                    other => Err(Error::Conversion(format!(
                        "expected {} for column '{column}', found {other:?}",
                        $expected
                    ))),
                }
            }
        }
    };
}

impl_fetch_value!(bool, "boolean",
    DataType::Boolean(Some(v)) => Ok(*v),
    DataType::Int64(Some(v)) => Ok(*v != 0),
);

impl_fetch_value!(i32, "int32",
    DataType::Int32(Some(v)) => Ok(*v),
    DataType::Int64(Some(v)) => i32::try_from(*v)
        .map_err(|e| Error::Conversion(format!("{v} does not fit in i32: {e}"))),
);

impl_fetch_value!(i64, "int64",
    DataType::Int64(Some(v)) => Ok(*v),
    DataType::Int32(Some(v)) => Ok(i64::from(*v)),
);

impl_fetch_value!(u32, "uint32",
    DataType::Uint32(Some(v)) => Ok(*v),
);

impl_fetch_value!(u64, "uint64",
    DataType::Uint64(Some(v)) => Ok(*v),
);

impl_fetch_value!(f32, "float",
    DataType::Float(Some(v)) => Ok(*v),
);

impl_fetch_value!(f64, "double",
    DataType::Double(Some(v)) => Ok(*v),
    DataType::Float(Some(v)) => Ok(f64::from(*v)),
);

impl_fetch_value!(String, "string",
    DataType::Str(Some(v)) => Ok(v.clone()),
);

impl_fetch_value!(Vec<u8>, "binary",
    DataType::Binary(Some(v)) => Ok(v.clone()),
);

impl_fetch_value!(NaiveDate, "date",
    DataType::Date(Some(raw)) | DataType::Str(Some(raw)) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::Conversion(format!("unsupported date '{raw}': {e}"))),
);

impl_fetch_value!(DateTime<Utc>, "timestamp",
    DataType::Timestamp(Some(raw)) | DataType::Str(Some(raw)) => parse_timestamp(raw),
);

impl_fetch_value!(serde_json::Value, "json compatible",
    DataType::Str(Some(raw)) => serde_json::from_str(raw)
        .map_err(|e| Error::Conversion(format!("invalid JSON: {e}"))),
    DataType::Binary(Some(bytes)) => serde_json::from_slice(bytes)
        .map_err(|e| Error::Conversion(format!("invalid JSON: {e}"))),
);

impl<T: FetchValue> FetchValue for Option<T> {
    fn fetch(row: &TableRow, column: &str) -> Result<Self> {
        match row.value(column) {
            Some(value) if !value.is_null() => Ok(Some(T::fetch(row, column)?)),
            _ => Ok(None),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
    }

    Err(Error::Conversion(format!(
        "unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format"
    )))
}
