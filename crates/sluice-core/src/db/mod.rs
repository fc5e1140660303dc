pub mod collection;
pub mod identity;
pub mod model;
pub mod property;
pub mod query;
pub mod repository;
pub mod scope;
pub mod sql;
pub mod store;

use crate::{
    config::SluiceConfig,
    db::{
        collection::{LazyCollection, RowSource},
        identity::IdentityMapPool,
        model::EntityKind,
        query::Criteria,
        repository::Repository,
        store::{RawRow, Storage, StoreError},
    },
    error::Error,
    obs::{QueryFingerprint, QueryKind, TraceEvent, TraceSink},
};
use std::rc::Rc;

///
/// Session
///
/// Request-scoped context: storage handle, identity-map pool, config and
/// optional trace sink. Collections and repositories borrow it, so every
/// identity map lives exactly as long as the session that owns it.
///

pub struct Session {
    storage: Rc<dyn Storage>,
    pool: IdentityMapPool,
    config: SluiceConfig,
    sink: Option<Rc<dyn TraceSink>>,
}

impl Session {
    #[must_use]
    pub fn new(storage: Rc<dyn Storage>) -> Self {
        Self {
            storage,
            pool: IdentityMapPool::new(),
            config: SluiceConfig::default(),
            sink: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SluiceConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn trace_sink(mut self, sink: Rc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &SluiceConfig {
        &self.config
    }

    #[must_use]
    pub const fn pool(&self) -> &IdentityMapPool {
        &self.pool
    }

    // ---------------------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------------------

    /// Lazy collection over `criteria`; nothing executes until first access.
    #[must_use]
    pub fn collection<E: EntityKind>(&self, criteria: Criteria) -> LazyCollection<'_, E> {
        LazyCollection::from_criteria(self, criteria)
    }

    /// Lazy collection over rows that were already fetched elsewhere.
    #[must_use]
    pub fn collection_from_rows<E: EntityKind>(
        &self,
        source: RowSource,
    ) -> LazyCollection<'_, E> {
        LazyCollection::from_rows(self, source)
    }

    #[must_use]
    pub const fn repository<E: EntityKind>(&self) -> Repository<'_, E> {
        Repository::new(self)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    pub(crate) fn emit(&self, event: TraceEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(event);
        }
    }

    // Every storage round trip goes through here so it is traced once.
    pub(crate) fn execute(&self, kind: QueryKind, query: &str) -> Result<Vec<RawRow>, StoreError> {
        self.emit(TraceEvent::Query {
            kind,
            fingerprint: QueryFingerprint::of(kind, query),
        });

        self.storage.execute(query)
    }

    // Trace an error on its way out to the caller.
    pub(crate) fn report(&self, err: impl Into<Error>) -> Error {
        let err = err.into();
        self.emit(TraceEvent::Error {
            origin: err.origin(),
            class: err.class(),
        });

        err
    }
}
