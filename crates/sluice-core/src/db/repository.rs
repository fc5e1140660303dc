use crate::{
    db::{
        Session,
        collection::LazyCollection,
        identity::Id,
        model::EntityKind,
        query::{Criteria, eq},
    },
    error::{Error, NotFound},
};
use std::{marker::PhantomData, rc::Rc};

///
/// Repository
///
/// Typed finders over one entity kind. Every finder layers criteria in a
/// fixed precedence so entity defaults apply unless the caller overrides
/// them, and a bare `find_by` is paged unless a limit is given.
///

pub struct Repository<'s, E: EntityKind> {
    session: &'s Session,
    _marker: PhantomData<E>,
}

impl<'s, E: EntityKind> Repository<'s, E> {
    #[must_use]
    pub const fn new(session: &'s Session) -> Self {
        Self {
            session,
            _marker: PhantomData,
        }
    }

    /// Single element by primary key.
    pub fn find(&self, id: &Id) -> Result<Rc<E>, Error> {
        let criteria = E::default_criteria().merge(
            &Criteria::create()
                .set_where(eq(E::TABLE.primary_key, id.to_value()))
                .set_first_result(0)
                .set_max_results(1),
        );

        LazyCollection::<E>::from_criteria(self.session, criteria)
            .first()?
            .ok_or_else(|| self.session.report(NotFound::with_id(E::PATH, id.clone())))
    }

    /// Every element the entity defaults admit.
    #[must_use]
    pub fn find_all(&self) -> LazyCollection<'s, E> {
        self.find_by(&Criteria::null())
    }

    /// Lazy collection over `criteria`.
    ///
    /// Precedence, lowest first: the session fallback page (offset 0,
    /// `fallback_page_size`), the entity defaults, an unbounded limit, then
    /// the caller's criteria.
    #[must_use]
    pub fn find_by(&self, criteria: &Criteria) -> LazyCollection<'s, E> {
        let fallback = Criteria::create()
            .set_first_result(0)
            .set_max_results(self.session.config().fallback_page_size);

        let effective = fallback
            .merge(&E::default_criteria())
            .merge(&Criteria::create().set_max_results(u64::MAX))
            .merge(criteria);

        LazyCollection::from_criteria(self.session, effective)
    }

    /// First element matching `criteria` under a limit of one. A limit set
    /// by the caller still wins.
    pub fn find_one_by(&self, criteria: &Criteria) -> Result<Rc<E>, Error> {
        let effective = Criteria::create().set_max_results(1).merge(criteria);

        self.find_by(&effective)
            .first()?
            .ok_or_else(|| self.session.report(NotFound::entity(E::PATH)))
    }
}
