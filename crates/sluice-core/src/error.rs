use crate::{
    config::ConfigError,
    db::{
        identity::{Id, IdentityError},
        model::AssertError,
        sql::CompileError,
        store::StoreError,
    },
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Umbrella error surfaced to callers of the collection, repository and
/// generator layers. Every variant is a local, synchronous failure; nothing
/// here is retried.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    Assert(#[from] AssertError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    NotFound(#[from] NotFound),
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Compile(CompileError::MultiColumnIn { .. }) => ErrorClass::Unsupported,
            Self::Compile(_) | Self::Assert(_) | Self::Config(_) => ErrorClass::InvalidInput,
            Self::Identity(IdentityError::TypeTagConflict { .. }) => ErrorClass::Conflict,
            Self::Identity(_) => ErrorClass::InvalidInput,
            Self::Store(_) => ErrorClass::Internal,
            Self::NotFound(_) => ErrorClass::NotFound,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::Compile(_) => ErrorOrigin::Compile,
            Self::Identity(_) => ErrorOrigin::Identity,
            Self::Assert(_) => ErrorOrigin::Collection,
            Self::Store(_) => ErrorOrigin::Store,
            Self::Config(_) => ErrorOrigin::Config,
            Self::NotFound(_) => ErrorOrigin::Repository,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {self}", self.origin(), self.class())
    }
}

///
/// NotFound
///
/// A single-element lookup matched zero rows. Plural lookups never raise
/// this; they return an empty collection instead.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("expected exactly one row, found 0 (entity {entity}{})", id_suffix(.id.as_ref()))]
pub struct NotFound {
    pub entity: &'static str,
    pub id: Option<Id>,
}

impl NotFound {
    #[must_use]
    pub const fn entity(entity: &'static str) -> Self {
        Self { entity, id: None }
    }

    #[must_use]
    pub const fn with_id(entity: &'static str, id: Id) -> Self {
        Self {
            entity,
            id: Some(id),
        }
    }
}

fn id_suffix(id: Option<&Id>) -> String {
    id.map(|id| format!(", id {id}")).unwrap_or_default()
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    NotFound,
    Unsupported,
    InvalidInput,
    Conflict,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Compile,
    Identity,
    Collection,
    Store,
    Config,
    Repository,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Compile => "compile",
            Self::Identity => "identity",
            Self::Collection => "collection",
            Self::Store => "store",
            Self::Config => "config",
            Self::Repository => "repository",
        };
        write!(f, "{label}")
    }
}
