//! ## Crate layout
//! - `core`: criteria, expression compiler, query generator, lazy
//!   collections, identity maps and the property cache.
//! - `config`: TOML-backed runtime configuration.
//! - `obs`: trace sink boundary and event vocabulary.
//!
//! The `prelude` module mirrors what entity definitions and read paths use
//! day to day.

pub use sluice_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use sluice_core::{Error, config, db, obs};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        config::{CountMode, SluiceConfig},
        db::{
            collection::RowSource,
            model::{AssertError, ColumnAlias, JoinColumn, JoinModel, PropertyModel},
            store::{RawRow, Storage, StoreError},
        },
        error::Error,
        prelude::*,
    };
}
