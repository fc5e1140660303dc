//! Batch-primed cache of per-row key/value attributes.

mod collection;


use crate::{
    db::{
        Session,
        identity::{Id, IdDeducer},
        model::{AssertError, PropertyModel},
        query::{Criteria, in_list},
        sql::QueryGenerator,
    },
    error::Error,
    obs::{QueryKind, TraceEvent},
    value::Value,
};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

// re-exports
pub use collection::{Property, PropertyCollection};

///
/// PropertyCache
///
/// Constructed with a batch of owner IDs and nothing fetched. The first
/// `get` for any batch ID loads the whole batch in one round trip; later
/// reads are memory reads. IDs outside the batch, or invalidated ones, are
/// fetched one at a time on demand.
///

pub struct PropertyCache<'s> {
    session: &'s Session,
    model: &'static PropertyModel,
    batch: Vec<Id>,
    batch_loaded: Cell<bool>,
    entries: RefCell<BTreeMap<Id, Rc<PropertyCollection>>>,
}

impl<'s> PropertyCache<'s> {
    #[must_use]
    pub fn new(
        session: &'s Session,
        model: &'static PropertyModel,
        ids: impl IntoIterator<Item = Id>,
    ) -> Self {
        let mut batch = Vec::new();
        for id in ids {
            if !batch.contains(&id) {
                batch.push(id);
            }
        }

        Self {
            session,
            model,
            batch,
            batch_loaded: Cell::new(false),
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn batch(&self) -> &[Id] {
        &self.batch
    }

    #[must_use]
    pub fn is_primed(&self, id: &Id) -> bool {
        self.batch.contains(id)
    }

    #[must_use]
    pub fn is_cached(&self, id: &Id) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn remember(&self, id: Id, properties: PropertyCollection) {
        self.entries.borrow_mut().insert(id, Rc::new(properties));
    }

    pub fn invalidate(&self, id: &Id) {
        self.entries.borrow_mut().remove(id);
    }

    /// Drop every entry and forget that the batch was loaded.
    pub fn flush(&self) {
        self.entries.borrow_mut().clear();
        self.batch_loaded.set(false);
    }

    /// Properties of `id`; an owner with no rows yields an empty collection.
    pub fn get(&self, id: &Id) -> Result<Rc<PropertyCollection>, Error> {
        if self.is_primed(id) && !self.batch_loaded.get() {
            self.load(&self.batch, true)?;
            self.batch_loaded.set(true);
        }

        if !self.is_cached(id) {
            self.load(std::slice::from_ref(id), false)?;
        }

        Ok(self.entries.borrow().get(id).map_or_else(
            || Rc::new(PropertyCollection::new(id.clone())),
            Rc::clone,
        ))
    }

    // Fetch and remember the properties of `ids`. Every requested ID gets an
    // entry, empty when storage returned nothing for it.
    fn load(&self, ids: &[Id], batched: bool) -> Result<(), Error> {
        if ids.is_empty() {
            return Ok(());
        }

        let criteria = Criteria::create().set_where(in_list(
            self.model.owner_column,
            ids.iter().map(Id::to_value),
        ));
        let query = QueryGenerator::new(self.model.table, criteria, self.session.config())
            .query()
            .map_err(|err| self.session.report(err))?;

        self.session.emit(TraceEvent::PropertyFetch {
            ids: u64::try_from(ids.len()).unwrap_or(u64::MAX),
            batched,
        });
        let rows = self
            .session
            .execute(QueryKind::Properties, &query)
            .map_err(|err| self.session.report(err))?;

        let mut grouped = ids
            .iter()
            .map(|id| (id.clone(), PropertyCollection::new(id.clone())))
            .collect::<BTreeMap<_, _>>();

        for row in &rows {
            let owner = row
                .get(self.model.owner_column)
                .ok_or_else(|| AssertError::MissingField {
                    field: self.model.owner_column.to_string(),
                })
                .map_err(|err| self.session.report(err))?;
            let owner = IdDeducer::deduce_value(owner).map_err(|err| self.session.report(err))?;

            let key = row
                .get(self.model.key_column)
                .map(Value::to_plain_text)
                .unwrap_or_default();
            let value = row.get(self.model.value_column).cloned().unwrap_or(Value::Null);

            grouped
                .entry(owner.clone())
                .or_insert_with(|| PropertyCollection::new(owner))
                .insert(key, value);
        }

        let mut entries = self.entries.borrow_mut();
        for (id, properties) in grouped {
            entries.insert(id, Rc::new(properties));
        }

        Ok(())
    }
}
