//! Static table and entity metadata.
//!
//! Everything here is `'static` and declared once per entity type; the
//! compiler, generator, identity and property layers read it but never
//! mutate it.

use crate::{
    db::{identity::Id, query::Criteria, store::RawRow},
    value::Value,
};
use thiserror::Error as ThisError;

///
/// AssertError
///
/// A row or element does not have the shape the collection declares.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum AssertError {
    #[error("expected element of type '{expected}', found '{found}'")]
    Mismatch {
        expected: &'static str,
        found: String,
    },

    #[error("row is missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' is not a valid {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },
}

///
/// ColumnAlias
/// Convenience name mapped onto one or more physical columns.
///

#[derive(Debug)]
pub struct ColumnAlias {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

///
/// JoinColumn
///

#[derive(Debug)]
pub struct JoinColumn {
    pub table: &'static str,
    pub column: &'static str,
}

///
/// JoinModel
///
/// Statically known auxiliary relation. A join may bring in a chain of
/// tables; it is used as soon as the criteria references any of them, and
/// then every table is added to FROM and every `on` pair is ANDed into WHERE
/// as `left = right`.
///

#[derive(Debug)]
pub struct JoinModel {
    pub tables: &'static [&'static str],
    pub on: &'static [(JoinColumn, JoinColumn)],
}

impl JoinModel {
    #[must_use]
    pub fn brings_in(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }
}

///
/// TableModel
///

#[derive(Debug)]
pub struct TableModel {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub aliases: &'static [ColumnAlias],
    pub joins: &'static [JoinModel],
}

impl TableModel {
    /// Physical columns for `field`: the alias target when one is declared,
    /// otherwise `None` (the name is used as-is).
    #[must_use]
    pub fn alias(&self, field: &str) -> Option<&'static [&'static str]> {
        self.aliases
            .iter()
            .find(|alias| alias.name == field)
            .map(|alias| alias.columns)
    }

    /// Declared join that brings in `table`.
    #[must_use]
    pub fn join(&self, table: &str) -> Option<&JoinModel> {
        self.joins.iter().find(|join| join.brings_in(table))
    }

    #[must_use]
    pub fn is_named(&self, table: &str) -> bool {
        self.name.eq_ignore_ascii_case(table)
    }

    /// True for the primary table and every table a join can bring in.
    #[must_use]
    pub fn knows_table(&self, table: &str) -> bool {
        self.is_named(table) || self.join(table).is_some()
    }
}

///
/// PropertyModel
/// Key/value attribute relation owned by an entity table.
///

#[derive(Debug)]
pub struct PropertyModel {
    pub table: &'static TableModel,
    pub owner_column: &'static str,
    pub key_column: &'static str,
    pub value_column: &'static str,
}

///
/// FieldAccessor
/// Named, typed read of one entity field for in-memory filtering.
///

pub struct FieldAccessor<E> {
    pub name: &'static str,
    pub read: fn(&E) -> Value,
}

impl<E> FieldAccessor<E> {
    #[must_use]
    pub const fn new(name: &'static str, read: fn(&E) -> Value) -> Self {
        Self { name, read }
    }
}

///
/// EntityKind
///
/// Static description of an entity type materialized from one table.
///

pub trait EntityKind: Sized + 'static {
    /// Fully-qualified path; also the identity-map type tag.
    const PATH: &'static str;

    const TABLE: &'static TableModel;

    /// Attribute relation primed by the property cache during hydration.
    const PROPERTIES: Option<&'static PropertyModel> = None;

    const FIELDS: &'static [FieldAccessor<Self>];

    /// Identity accessor, when the type carries one directly.
    fn id(&self) -> Option<Id> {
        None
    }

    /// Normalize a raw row into an entity.
    fn from_row(row: &RawRow) -> Result<Self, AssertError>;

    /// Validate an element before it joins a collection.
    fn assert_kind(&self) -> Result<(), AssertError> {
        Ok(())
    }

    /// Criteria merged into every repository read.
    #[must_use]
    fn default_criteria() -> Criteria {
        Criteria::null()
    }

    /// Read a field through the accessor table.
    fn field(&self, name: &str) -> Option<Value> {
        Self::FIELDS
            .iter()
            .find(|accessor| accessor.name == name)
            .map(|accessor| (accessor.read)(self))
    }
}
