use crate::{db::identity::Id, error::NotFound, value::Value};
use std::collections::BTreeMap;

/// Entity label used when a requested property key is absent.
const PROPERTY_ENTITY: &str = "property";

///
/// Property
///

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Value,
}

///
/// PropertyCollection
///
/// Key/value attributes of one owner row, in first-seen key order. A later
/// value for an existing key replaces the earlier one in place.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyCollection {
    owner: Id,
    properties: Vec<Property>,
}

impl PropertyCollection {
    #[must_use]
    pub const fn new(owner: Id) -> Self {
        Self {
            owner,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        match self.properties.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value,
            None => self.properties.push(Property { key, value }),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> &Id {
        &self.owner
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.value)
    }

    /// Property by key; absence is a not-found error.
    pub fn property(&self, key: &str) -> Result<&Property, NotFound> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .ok_or_else(|| NotFound::with_id(PROPERTY_ENTITY, self.owner.clone()))
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.iter().any(|p| p.key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.properties.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.properties
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a PropertyCollection {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
