use crate::value::Value;
use derive_more::{Deref, IntoIterator};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// StoreError
///
/// Opaque failure reported by the storage collaborator.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("storage failed to execute query: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

///
/// Storage
///
/// The only I/O seam. Implementations execute query text and return rows;
/// they never see criteria or entities.
///

pub trait Storage {
    fn execute(&self, query: &str) -> Result<Vec<RawRow>, StoreError>;
}

///
/// RawRow
///
/// Ordered `column → value` map as handed back by storage.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
#[into_iterator(owned, ref)]
pub struct RawRow(BTreeMap<String, Value>);

impl RawRow {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_text)
    }

    #[must_use]
    pub fn u64(&self, column: &str) -> Option<u64> {
        self.0.get(column).and_then(Value::as_u64)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
