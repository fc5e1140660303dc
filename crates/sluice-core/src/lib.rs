//! Core runtime for Sluice: criteria, the expression compiler and query
//! generator, lazily hydrated collections, identity maps and the property
//! cache, with the ergonomics exported via the `prelude`.

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

// re-exports
pub use error::Error;

///
/// Prelude
///
/// Prelude contains the vocabulary needed to describe entities and build
/// criteria. Stores, compilers and trace types stay one import away.
///

pub mod prelude {
    pub use crate::{
        db::{
            Session,
            collection::LazyCollection,
            identity::Id,
            model::{EntityKind, FieldAccessor, TableModel},
            query::{
                Criteria, Expression, OrderDirection, and, contains, ends_with, eq, gt, gte,
                in_list, lt, lte, ne, not_in, or, starts_with,
            },
            repository::Repository,
            scope::{Scope, Status},
        },
        value::{Column, Value},
    };
}
