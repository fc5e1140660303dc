use crate::db::store::RawRow;
use std::rc::Rc;

///
/// RowSource
///
/// Rows fetched by some earlier query, optionally with the total the
/// producer reported (pagination metadata). Consumed by the first hydration.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowSource {
    pub rows: Vec<RawRow>,
    pub found_rows: Option<u64>,
}

impl RowSource {
    #[must_use]
    pub const fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            found_rows: None,
        }
    }

    #[must_use]
    pub const fn with_found_rows(mut self, found_rows: u64) -> Self {
        self.found_rows = Some(found_rows);
        self
    }
}

///
/// State
///
/// One-way lazy state machine: pending → hydrated. `entities` stays empty
/// until the pending source is consumed.
///

pub(crate) struct State<E> {
    pending: Option<Pending>,
    entities: Vec<Rc<E>>,
}

impl<E> State<E> {
    pub(crate) const fn unhydrated(pending: Pending) -> Self {
        Self {
            pending: Some(pending),
            entities: Vec::new(),
        }
    }

    pub(crate) const fn hydrated(entities: Vec<Rc<E>>) -> Self {
        Self {
            pending: None,
            entities,
        }
    }

    pub(crate) const fn is_hydrated(&self) -> bool {
        self.pending.is_none()
    }

    pub(crate) const fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub(crate) fn entities(&self) -> &[Rc<E>] {
        &self.entities
    }

    /// Element list for mutation; whatever was pending is dropped.
    pub(crate) fn entities_mut(&mut self) -> &mut Vec<Rc<E>> {
        self.pending = None;
        &mut self.entities
    }
}

///
/// Pending
/// What an unhydrated collection will execute.
///

#[derive(Clone)]
pub(crate) enum Pending {
    Criteria,
    Rows(RowSource),
}
