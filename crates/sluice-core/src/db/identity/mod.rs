//! Row identity: ID deduction, per-type identity maps and the session pool.

mod deduce;


use crate::value::Value;
use derive_more::Display;
use std::{any::Any, cell::RefCell, collections::BTreeMap, rc::Rc};
use thiserror::Error as ThisError;

// re-exports
pub use deduce::{IdDeducer, Strategy};

///
/// IdentityError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum IdentityError {
    #[error("could not deduce ID for element of shape '{shape}'")]
    Undeducible { shape: String },

    #[error("identity map '{tag}' is already registered for a different element type")]
    TypeTagConflict { tag: &'static str },
}

///
/// Id
/// Deduced identity key of a materialized row.
///

#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Id {
    #[display("{_0}")]
    Int(u64),

    #[display("{_0}")]
    Uuid(String),
}

impl Id {
    /// Literal form used when an ID appears in a predicate.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(id) => Value::Uint(*id),
            Self::Uuid(uuid) => Value::Text(uuid.clone()),
        }
    }
}

impl From<u64> for Id {
    fn from(id: u64) -> Self {
        Self::Int(id)
    }
}

///
/// IdentityMap
///
/// Plain `Id → V` registry with no eviction. Within one map's lifetime the
/// same ID always yields the same stored value.
///

#[derive(Debug)]
pub struct IdentityMap<V> {
    entries: BTreeMap<Id, V>,
}

impl<V> IdentityMap<V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn has(&self, id: &Id) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &Id) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn put(&mut self, id: Id, value: V) {
        self.entries.insert(id, value);
    }

    pub fn drop(&mut self, id: &Id) -> Option<V> {
        self.entries.remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> IdentityMap<V> {
    /// Return the stored value for `id`, or initialize, store and return it.
    pub fn deduplicated(&mut self, id: Id, init: impl FnOnce(&Id) -> V) -> V {
        self.entries.entry(id).or_insert_with_key(init).clone()
    }

    /// Fallible `deduplicated`; a failed initializer leaves the map unchanged.
    pub fn try_deduplicated<E>(
        &mut self,
        id: Id,
        init: impl FnOnce(&Id) -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(existing) = self.entries.get(&id) {
            return Ok(existing.clone());
        }

        let value = init(&id)?;
        self.entries.insert(id, value.clone());

        Ok(value)
    }
}

impl<V> Default for IdentityMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to one map inside a pool.
pub type SharedIdentityMap<V> = Rc<RefCell<IdentityMap<V>>>;

///
/// IdentityMapPool
///
/// One identity map per type tag, created on first request. Owned by a
/// session; never process-global.
///

#[derive(Default)]
pub struct IdentityMapPool {
    maps: RefCell<BTreeMap<&'static str, Rc<dyn Any>>>,
}

impl IdentityMapPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map registered under `tag`, creating it on first use.
    ///
    /// A tag first registered with another value type is a conflict.
    pub fn identity_map<V: 'static>(
        &self,
        tag: &'static str,
    ) -> Result<SharedIdentityMap<V>, IdentityError> {
        let mut maps = self.maps.borrow_mut();
        let entry = maps.entry(tag).or_insert_with(|| {
            let map: SharedIdentityMap<V> = Rc::new(RefCell::new(IdentityMap::new()));
            map as Rc<dyn Any>
        });

        Rc::clone(entry)
            .downcast::<RefCell<IdentityMap<V>>>()
            .map_err(|_| IdentityError::TypeTagConflict { tag })
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.maps.borrow().contains_key(tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.borrow().is_empty()
    }

    /// Drop every map; later requests start from empty maps.
    pub fn clear(&self) {
        self.maps.borrow_mut().clear();
    }
}
