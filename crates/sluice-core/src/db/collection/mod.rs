//! Lazily hydrated, identity-mapped entity collection.
//!
//! A collection starts `Unhydrated` over either a criteria or a pre-fetched
//! row source, and becomes `Hydrated` exactly once, on the first operation
//! that needs materialized data. Every operation that reads or mutates the
//! element list hydrates first; everything after that is in memory.

mod source;

#[cfg(test)]
mod tests;

use crate::{
    config::CountMode,
    db::{
        Session,
        identity::{Id, IdDeducer, SharedIdentityMap},
        model::{AssertError, EntityKind},
        property::{PropertyCache, PropertyCollection},
        query::{Criteria, apply_in_memory},
        scope::{Scope, Status},
        sql::QueryGenerator,
        store::RawRow,
    },
    error::Error,
    obs::{HydrationSource, QueryKind, TraceEvent},
};
use source::{Pending, State};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

// re-exports
pub use source::RowSource;

/// Column alias the count wrapper selects into.
const COUNT_COLUMN: &str = "row_count";

///
/// LazyCollection
///

pub struct LazyCollection<'s, E: EntityKind> {
    session: &'s Session,
    criteria: Criteria,
    scope: Status,
    state: RefCell<State<E>>,
    count_cache: Cell<Option<u64>>,
    property_cache: RefCell<Option<Rc<PropertyCache<'s>>>>,
}

impl<'s, E: EntityKind> LazyCollection<'s, E> {
    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    /// Fully lazy collection; the criteria executes on first access.
    #[must_use]
    pub fn from_criteria(session: &'s Session, criteria: Criteria) -> Self {
        Self::with_state(session, criteria, State::unhydrated(Pending::Criteria))
    }

    /// Collection over rows fetched elsewhere; used once, then discarded.
    #[must_use]
    pub fn from_rows(session: &'s Session, source: RowSource) -> Self {
        Self::with_state(session, Criteria::null(), State::unhydrated(Pending::Rows(source)))
    }

    /// Already-hydrated collection. Each element is validated and routed
    /// through the identity map.
    pub fn from_entities(
        session: &'s Session,
        entities: impl IntoIterator<Item = E>,
    ) -> Result<Self, Error> {
        let map = identity_map::<E>(session)?;
        let mut ids = Vec::new();
        let mut stored = Vec::new();

        for entity in entities {
            entity.assert_kind().map_err(|err| session.report(err))?;
            let id = IdDeducer::deduce(Some(&entity), None).map_err(|err| session.report(err))?;
            stored.push(dedup(session, &map, id.clone(), entity));
            ids.push(id);
        }

        session.emit(TraceEvent::Hydrate {
            entity: E::PATH,
            source: HydrationSource::Entities,
            rows: len_u64(stored.len()),
        });

        let collection = Self::with_state(session, Criteria::null(), State::hydrated(stored));
        collection.prime(ids);

        Ok(collection)
    }

    fn with_state(session: &'s Session, criteria: Criteria, state: State<E>) -> Self {
        Self {
            session,
            criteria,
            scope: Status::default(),
            state: RefCell::new(state),
            count_cache: Cell::new(None),
            property_cache: RefCell::new(None),
        }
    }

    // Same session and provenance, new hydrated contents.
    fn derive(&self, criteria: Criteria, scope: Status, entities: Vec<Rc<E>>) -> Self {
        Self {
            session: self.session,
            criteria,
            scope,
            state: RefCell::new(State::hydrated(entities)),
            count_cache: Cell::new(None),
            property_cache: RefCell::new(self.property_cache.borrow().clone()),
        }
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.state.borrow().is_hydrated()
    }

    /// Effective criteria: the base criteria merged with the active scope.
    #[must_use]
    pub fn criteria(&self) -> Criteria {
        self.criteria.merge(&self.scope.criteria())
    }

    #[must_use]
    pub const fn scope(&self) -> &Status {
        &self.scope
    }

    /// Select text this collection executes (or would have executed).
    pub fn query(&self) -> Result<String, Error> {
        self.generator().query().map_err(Error::from)
    }

    // ---------------------------------------------------------------------
    // Counting
    // ---------------------------------------------------------------------

    /// Number of elements.
    ///
    /// - hydrated: in-memory size
    /// - row source with a known total and no extra criteria: that total
    /// - criteria source under `CountMode::Subquery`: one cached COUNT(*)
    /// - otherwise: hydrate, then in-memory size
    pub fn count(&self) -> Result<u64, Error> {
        let subquery = {
            let state = self.state.borrow();
            match state.pending() {
                None => return Ok(len_u64(state.entities().len())),
                Some(Pending::Rows(source)) => match source.found_rows {
                    Some(found) if self.criteria().is_null() => return Ok(found),
                    _ => false,
                },
                Some(Pending::Criteria) => {
                    self.session.config().count_mode == CountMode::Subquery
                }
            }
        };

        if subquery {
            return self.count_subquery();
        }

        self.with_entities(|entities| len_u64(entities.len()))
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.count()? == 0)
    }

    fn count_subquery(&self) -> Result<u64, Error> {
        if let Some(count) = self.count_cache.get() {
            return Ok(count);
        }

        let query = self
            .generator()
            .count_query()
            .map_err(|err| self.session.report(err))?;
        let rows = self
            .session
            .execute(QueryKind::Count, &query)
            .map_err(|err| self.session.report(err))?;

        let count = read_count(&rows).map_err(|err| self.session.report(err))?;
        self.count_cache.set(Some(count));

        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Append an element. Hydrates first so a pending query is never lost.
    pub fn add(&mut self, element: E) -> Result<Rc<E>, Error> {
        self.hydrate()?;
        let stored = self.admit(element, None)?;
        self.entities_mut()?.push(Rc::clone(&stored));

        Ok(stored)
    }

    /// Normalize a raw row and append it.
    pub fn add_row(&mut self, row: &RawRow) -> Result<Rc<E>, Error> {
        self.hydrate()?;
        let element = E::from_row(row).map_err(|err| self.session.report(err))?;
        let stored = self.admit(element, Some(row))?;
        self.entities_mut()?.push(Rc::clone(&stored));

        Ok(stored)
    }

    /// Replace the element at `index`, or append when `index` is past the end.
    pub fn set(&mut self, index: usize, element: E) -> Result<(), Error> {
        self.hydrate()?;
        let stored = self.admit(element, None)?;
        let entities = self.entities_mut()?;
        match entities.get_mut(index) {
            Some(slot) => *slot = stored,
            None => entities.push(stored),
        }

        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Option<Rc<E>>, Error> {
        let entities = self.entities_mut()?;

        Ok((index < entities.len()).then(|| entities.remove(index)))
    }

    /// Remove the first occurrence of this exact instance.
    pub fn remove_element(&mut self, element: &Rc<E>) -> Result<bool, Error> {
        let entities = self.entities_mut()?;
        let Some(index) = entities.iter().position(|e| Rc::ptr_eq(e, element)) else {
            return Ok(false);
        };
        entities.remove(index);

        Ok(true)
    }

    /// Empty the collection without running any pending query.
    pub fn clear(&mut self) {
        *self.state.get_mut() = State::hydrated(Vec::new());
        self.count_cache.set(None);
    }

    // ---------------------------------------------------------------------
    // Access
    // ---------------------------------------------------------------------

    pub fn get(&self, index: usize) -> Result<Option<Rc<E>>, Error> {
        self.with_entities(|entities| entities.get(index).cloned())
    }

    pub fn first(&self) -> Result<Option<Rc<E>>, Error> {
        self.with_entities(|entities| entities.first().cloned())
    }

    pub fn last(&self) -> Result<Option<Rc<E>>, Error> {
        self.with_entities(|entities| entities.last().cloned())
    }

    pub fn keys(&self) -> Result<Vec<usize>, Error> {
        self.with_entities(|entities| (0..entities.len()).collect())
    }

    pub fn to_vec(&self) -> Result<Vec<Rc<E>>, Error> {
        self.with_entities(<[Rc<E>]>::to_vec)
    }

    /// Snapshot iterator over the hydrated elements.
    pub fn iter(&self) -> Result<std::vec::IntoIter<Rc<E>>, Error> {
        Ok(self.to_vec()?.into_iter())
    }

    /// Membership by instance identity.
    pub fn contains(&self, element: &Rc<E>) -> Result<bool, Error> {
        self.with_entities(|entities| entities.iter().any(|e| Rc::ptr_eq(e, element)))
    }

    /// Membership by deduced identity.
    pub fn contains_id(&self, id: &Id) -> Result<bool, Error> {
        for entity in self.to_vec()? {
            let found = IdDeducer::deduce(Some(Rc::as_ref(&entity)), None)
                .map_err(|err| self.session.report(err))?;
            if &found == id {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn index_of(&self, element: &Rc<E>) -> Result<Option<usize>, Error> {
        self.with_entities(|entities| entities.iter().position(|e| Rc::ptr_eq(e, element)))
    }

    /// Up to `length` elements starting at `offset` (all remaining when `None`).
    pub fn slice(&self, offset: usize, length: Option<usize>) -> Result<Vec<Rc<E>>, Error> {
        self.with_entities(|entities| {
            entities
                .iter()
                .skip(offset)
                .take(length.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        })
    }

    // ---------------------------------------------------------------------
    // Functional combinators (total over the hydrated set)
    // ---------------------------------------------------------------------

    /// True when `predicate(index, element)` holds for at least one element.
    pub fn exists(&self, mut predicate: impl FnMut(usize, &E) -> bool) -> Result<bool, Error> {
        self.with_entities(|entities| {
            entities
                .iter()
                .enumerate()
                .any(|(i, e)| predicate(i, Rc::as_ref(e)))
        })
    }

    /// True when `predicate(index, element)` holds for every element.
    pub fn for_all(&self, mut predicate: impl FnMut(usize, &E) -> bool) -> Result<bool, Error> {
        self.with_entities(|entities| {
            entities
                .iter()
                .enumerate()
                .all(|(i, e)| predicate(i, Rc::as_ref(e)))
        })
    }

    pub fn find_first(
        &self,
        mut predicate: impl FnMut(usize, &E) -> bool,
    ) -> Result<Option<Rc<E>>, Error> {
        self.with_entities(|entities| {
            entities
                .iter()
                .enumerate()
                .find(|(i, e)| predicate(*i, Rc::as_ref(e)))
                .map(|(_, e)| Rc::clone(e))
        })
    }

    /// New hydrated collection of the elements matching `predicate`.
    pub fn filter(&self, mut predicate: impl FnMut(&E) -> bool) -> Result<Self, Error> {
        let kept = self.with_entities(|entities| {
            entities
                .iter()
                .filter(|e| predicate(Rc::as_ref(e)))
                .cloned()
                .collect::<Vec<_>>()
        })?;

        Ok(self.derive(self.criteria.clone(), self.scope.clone(), kept))
    }

    pub fn map<T>(&self, mut f: impl FnMut(&E) -> T) -> Result<Vec<T>, Error> {
        self.with_entities(|entities| entities.iter().map(|e| f(Rc::as_ref(e))).collect())
    }

    /// Split into (matching, non-matching), both hydrated.
    pub fn partition(
        &self,
        mut predicate: impl FnMut(usize, &E) -> bool,
    ) -> Result<(Self, Self), Error> {
        let (yes, no) = self.with_entities(|entities| {
            let mut yes = Vec::new();
            let mut no = Vec::new();
            for (i, e) in entities.iter().enumerate() {
                if predicate(i, Rc::as_ref(e)) {
                    yes.push(Rc::clone(e));
                } else {
                    no.push(Rc::clone(e));
                }
            }
            (yes, no)
        })?;

        Ok((
            self.derive(self.criteria.clone(), self.scope.clone(), yes),
            self.derive(self.criteria.clone(), self.scope.clone(), no),
        ))
    }

    pub fn reduce<T>(&self, mut f: impl FnMut(T, &E) -> T, initial: T) -> Result<T, Error> {
        self.with_entities(|entities| {
            entities
                .iter()
                .fold(initial, |acc, e| f(acc, Rc::as_ref(e)))
        })
    }

    // ---------------------------------------------------------------------
    // Criteria composition
    // ---------------------------------------------------------------------

    /// New collection narrowed by `criteria`; the receiver is untouched.
    ///
    /// A hydrated receiver is filtered in memory. Otherwise the result stays
    /// lazy with the merged criteria.
    #[must_use]
    pub fn matching(&self, criteria: &Criteria) -> Self {
        self.compose(self.criteria.merge(criteria), self.scope.clone(), criteria)
    }

    /// New collection with `scope` replacing the active scope.
    ///
    /// A hydrated receiver can only be narrowed, so the new scope is applied
    /// to its elements in memory.
    #[must_use]
    pub fn with_scope(&self, scope: &Status) -> Self {
        self.compose(self.criteria.clone(), scope.clone(), &scope.criteria())
    }

    /// New collection with `scope` merged into the active scope, so the
    /// selected values accumulate.
    #[must_use]
    pub fn add_scope(&self, scope: &Status) -> Self {
        let merged = self.scope.merge_with(scope);
        let narrowing = merged.criteria();
        self.compose(self.criteria.clone(), merged, &narrowing)
    }

    fn compose(&self, criteria: Criteria, scope: Status, narrowing: &Criteria) -> Self {
        let state = self.state.borrow();
        match state.pending() {
            None => self.derive(criteria, scope, apply_in_memory(narrowing, state.entities())),
            Some(pending) => Self {
                session: self.session,
                criteria,
                scope,
                state: RefCell::new(State::unhydrated(pending.clone())),
                count_cache: Cell::new(None),
                property_cache: RefCell::new(None),
            },
        }
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    /// Attach an externally built property cache.
    #[must_use]
    pub fn with_property_cache(self, cache: Rc<PropertyCache<'s>>) -> Self {
        *self.property_cache.borrow_mut() = Some(cache);
        self
    }

    /// Property cache primed by hydration, if the entity declares properties.
    pub fn property_cache(&self) -> Result<Option<Rc<PropertyCache<'s>>>, Error> {
        self.hydrate()?;

        Ok(self.property_cache.borrow().clone())
    }

    /// Properties of the element identified by `id`.
    pub fn properties(&self, id: &Id) -> Result<Rc<PropertyCollection>, Error> {
        match self.property_cache()? {
            Some(cache) => cache.get(id),
            None => Ok(Rc::new(PropertyCollection::new(id.clone()))),
        }
    }

    // ---------------------------------------------------------------------
    // Hydration
    // ---------------------------------------------------------------------

    fn generator(&self) -> QueryGenerator<'s> {
        QueryGenerator::new(E::TABLE, self.criteria(), self.session.config())
    }

    // Run `f` over the hydrated element list.
    fn with_entities<R>(&self, f: impl FnOnce(&[Rc<E>]) -> R) -> Result<R, Error> {
        self.hydrate()?;

        Ok(f(self.state.borrow().entities()))
    }

    fn entities_mut(&mut self) -> Result<&mut Vec<Rc<E>>, Error> {
        self.hydrate()?;
        self.count_cache.set(None);

        Ok(self.state.get_mut().entities_mut())
    }

    // Idempotent; the state only changes when every row materialized.
    fn hydrate(&self) -> Result<(), Error> {
        let (entities, ids, source) = {
            let state = self.state.borrow();
            let Some(pending) = state.pending() else {
                return Ok(());
            };

            match pending {
                Pending::Criteria => {
                    let query = self
                        .generator()
                        .query()
                        .map_err(|err| self.session.report(err))?;
                    let rows = self
                        .session
                        .execute(QueryKind::Select, &query)
                        .map_err(|err| self.session.report(err))?;
                    let (entities, ids) = self.materialize(&rows)?;

                    (entities, ids, HydrationSource::Criteria)
                }
                Pending::Rows(source) => {
                    let (entities, ids) = self.materialize(&source.rows)?;
                    let criteria = self.criteria();
                    if criteria.is_null() {
                        (entities, ids, HydrationSource::Rows)
                    } else {
                        let kept = apply_in_memory(&criteria, &entities);
                        let ids = kept_ids(&kept, &entities, &ids);

                        (kept, ids, HydrationSource::Rows)
                    }
                }
            }
        };

        self.session.emit(TraceEvent::Hydrate {
            entity: E::PATH,
            source,
            rows: len_u64(entities.len()),
        });
        *self.state.borrow_mut() = State::hydrated(entities);
        self.prime(ids);

        Ok(())
    }

    // Rows → entities, each routed through the identity map.
    fn materialize(&self, rows: &[RawRow]) -> Result<(Vec<Rc<E>>, Vec<Id>), Error> {
        let session = self.session;
        let map = identity_map::<E>(session)?;
        let mut entities = Vec::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());

        for row in rows {
            let entity = E::from_row(row).map_err(|err| session.report(err))?;
            entity.assert_kind().map_err(|err| session.report(err))?;
            let id =
                IdDeducer::deduce(Some(&entity), Some(row)).map_err(|err| session.report(err))?;

            entities.push(dedup(session, &map, id.clone(), entity));
            ids.push(id);
        }

        Ok((entities, ids))
    }

    // Validate and deduplicate an element joining the collection.
    fn admit(&self, element: E, row: Option<&RawRow>) -> Result<Rc<E>, Error> {
        let session = self.session;
        element.assert_kind().map_err(|err| session.report(err))?;
        let id = IdDeducer::deduce(Some(&element), row).map_err(|err| session.report(err))?;
        let map = identity_map::<E>(session)?;

        Ok(dedup(session, &map, id, element))
    }

    // Prime a property cache over `ids` unless one is already attached.
    fn prime(&self, ids: Vec<Id>) {
        let Some(model) = E::PROPERTIES else {
            return;
        };

        let mut cache = self.property_cache.borrow_mut();
        if cache.is_none() {
            *cache = Some(Rc::new(PropertyCache::new(self.session, model, ids)));
        }
    }
}

fn identity_map<E: EntityKind>(session: &Session) -> Result<SharedIdentityMap<Rc<E>>, Error> {
    session
        .pool()
        .identity_map::<Rc<E>>(E::PATH)
        .map_err(|err| session.report(err))
}

fn dedup<E: EntityKind>(
    session: &Session,
    map: &SharedIdentityMap<Rc<E>>,
    id: Id,
    entity: E,
) -> Rc<E> {
    let mut map = map.borrow_mut();
    if map.has(&id) {
        session.emit(TraceEvent::IdentityHit { entity: E::PATH });
    }

    map.deduplicated(id, |_| Rc::new(entity))
}

// Ids of the filtered elements, in their order, matched by instance.
fn kept_ids<E>(kept: &[Rc<E>], entities: &[Rc<E>], ids: &[Id]) -> Vec<Id> {
    kept.iter()
        .filter_map(|entity| {
            entities
                .iter()
                .zip(ids)
                .find(|(candidate, _)| Rc::ptr_eq(candidate, entity))
                .map(|(_, id)| id.clone())
        })
        .collect()
}

// The count wrapper must answer with one numeric row.
fn read_count(rows: &[RawRow]) -> Result<u64, AssertError> {
    let value = rows
        .first()
        .and_then(|row| row.get(COUNT_COLUMN).or_else(|| row.values().next()))
        .ok_or_else(|| AssertError::MissingField {
            field: COUNT_COLUMN.to_string(),
        })?;

    value.as_u64().ok_or_else(|| AssertError::InvalidField {
        field: COUNT_COLUMN.to_string(),
        expected: "row count",
    })
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
