mod compare;


use derive_more::Display;
use serde::{Deserialize, Serialize};

// re-exports
pub(crate) use compare::{TextOp, canonical_cmp, compare_eq, compare_order, text_matches};

///
/// Column
///
/// Qualified `(table, column)` reference. Appears on the left of a
/// comparison as a field reference and on the right as a join operand.
///

#[derive(Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[display("{table}.{column}")]
pub struct Column {
    pub table: String,
    pub column: String,
}

impl Column {
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

///
/// Value
/// right-hand side of a comparison, and the cell type of a raw row
///
/// Null        → SQL NULL; `Eq`/`Ne` against it render `IS [NOT] NULL`.
/// Column      → column reference, rendered unquoted (join predicates).
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    /// Ordered list of values, used as the `IN`/`NOT IN` operand.
    List(Vec<Self>),
    Column(Column),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Uint(_) | Self::Float(_))
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Non-negative integer view; digit-only text is accepted because the
    /// storage layer frequently hands back numeric columns as strings.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Text(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
                text.parse().ok()
            }
            _ => None,
        }
    }

    /// Plain textual form used inside LIKE patterns (no quoting).
    #[must_use]
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => String::from(if *v { "1" } else { "0" }),
            Self::Int(v) => v.to_string(),
            Self::Uint(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(text) => text.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_plain_text)
                .collect::<Vec<_>>()
                .join(","),
            Self::Column(column) => column.to_string(),
        }
    }

    /// Render as a storage-query literal: numbers bare, text single-quoted.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(v) => String::from(if *v { "1" } else { "0" }),
            Self::Int(v) => v.to_string(),
            Self::Uint(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(text) => quote_text(text),
            Self::List(items) => items
                .iter()
                .map(Self::to_sql_literal)
                .collect::<Vec<_>>()
                .join(","),
            Self::Column(column) => column.to_string(),
        }
    }
}

/// Single-quote text, doubling embedded quotes.
pub(crate) fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Uint(u64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Column> for Value {
    fn from(value: Column) -> Self {
        Self::Column(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}
