use super::*;
use crate::{
    config::SluiceConfig,
    db::{
        query::{OrderDirection, eq, gt},
        scope::Status,
        store::StoreError,
    },
    error::ErrorOrigin,
    test_fixtures::{Fixture, MemoryStorage, Post, meta_row, post_rows},
    value::Value,
};

fn fixture(n: u64) -> Fixture {
    Fixture::new(MemoryStorage::posts(post_rows(n), Vec::new()))
}

fn hydrating_fixture(n: u64) -> Fixture {
    Fixture::with_config(
        MemoryStorage::posts(post_rows(n), Vec::new()),
        SluiceConfig::default().with_count_mode(CountMode::Hydrate),
    )
}

fn ids(entities: &[Rc<Post>]) -> Vec<u64> {
    entities.iter().map(|p| p.id).collect()
}

//
// Laziness
//

#[test]
fn construction_runs_no_query() {
    let fixture = fixture(3);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    assert!(!posts.is_hydrated());
    assert_eq!(fixture.storage.query_count(), 0);
    assert_eq!(fixture.sink.hydrations(), 0);
}

#[test]
fn first_access_hydrates_exactly_once() {
    let fixture = hydrating_fixture(3);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    assert_eq!(posts.count().unwrap(), 3);
    assert_eq!(fixture.sink.hydrations(), 1);

    assert_eq!(posts.first().unwrap().unwrap().id, 1);
    assert_eq!(posts.last().unwrap().unwrap().id, 3);
    assert_eq!(posts.keys().unwrap(), vec![0, 1, 2]);
    assert_eq!(fixture.sink.hydrations(), 1);
    assert_eq!(fixture.storage.query_count(), 1);
}

#[test]
fn subquery_count_does_not_hydrate_and_is_cached() {
    let fixture = fixture(4);
    let criteria = Criteria::create().set_max_results(2);
    let posts = fixture.session.collection::<Post>(criteria);

    assert_eq!(posts.count().unwrap(), 2);
    assert_eq!(posts.count().unwrap(), 2);

    assert!(!posts.is_hydrated());
    assert_eq!(
        fixture.storage.queries(),
        vec![
            "SELECT COUNT(*) AS row_count FROM \
             (SELECT DISTINCT posts.* FROM posts LIMIT 2) AS counted"
        ]
    );
}

#[test]
fn subquery_count_matches_the_hydrated_window() {
    let criteria = Criteria::create().set_first_result(1).set_max_results(2);
    let lazy = fixture(4);
    let hydrated = hydrating_fixture(4);

    let counted = lazy.session.collection::<Post>(criteria.clone()).count().unwrap();
    let loaded = hydrated.session.collection::<Post>(criteria).count().unwrap();

    assert_eq!(counted, 2);
    assert_eq!(counted, loaded);
}

#[test]
fn hydrated_count_is_in_memory() {
    let fixture = fixture(2);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    posts.to_vec().unwrap();
    assert_eq!(posts.count().unwrap(), 2);
    assert!(!posts.is_empty().unwrap());
    assert_eq!(fixture.storage.query_count(), 1);
}

#[test]
fn select_text_comes_from_the_effective_criteria() {
    let fixture = fixture(0);
    let criteria = Criteria::create()
        .set_where(eq("status", "draft"))
        .order_by([("ID", OrderDirection::Desc)]);
    let posts = fixture.session.collection::<Post>(criteria);

    assert_eq!(
        posts.query().unwrap(),
        "SELECT DISTINCT posts.* FROM posts WHERE posts.post_status = 'draft' ORDER BY ID DESC"
    );
}

//
// Identity
//

#[test]
fn same_row_in_two_collections_is_one_instance() {
    let fixture = fixture(3);
    let a = fixture.session.collection::<Post>(Criteria::create());
    let b = fixture.session.collection::<Post>(Criteria::create());

    let from_a = a.get(1).unwrap().unwrap();
    let from_b = b.get(1).unwrap().unwrap();

    assert!(Rc::ptr_eq(&from_a, &from_b));
    assert_eq!(fixture.sink.identity_hits(), 3);
}

#[test]
fn added_element_with_known_id_returns_stored_instance() {
    let fixture = fixture(2);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());
    let stored = posts.first().unwrap().unwrap();

    let added = posts.add(Post::new(1, "draft", "shadow")).unwrap();

    assert!(Rc::ptr_eq(&stored, &added));
    assert_eq!(added.status, "publish");
}

#[test]
fn separate_sessions_do_not_share_instances() {
    let one = fixture(1);
    let two = fixture(1);

    let a = one.session.collection::<Post>(Criteria::create()).first().unwrap();
    let b = two.session.collection::<Post>(Criteria::create()).first().unwrap();

    assert!(!Rc::ptr_eq(&a.unwrap(), &b.unwrap()));
}

//
// Mutation
//

#[test]
fn add_hydrates_before_appending() {
    let fixture = fixture(3);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    posts.add(Post::new(10, "draft", "new")).unwrap();

    assert_eq!(fixture.storage.query_count(), 1);
    assert_eq!(ids(&posts.to_vec().unwrap()), vec![1, 2, 3, 10]);
}

#[test]
fn add_row_normalizes_and_appends() {
    let fixture = fixture(1);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    let added = posts
        .add_row(&Post::new(7, "draft", "row").row())
        .unwrap();

    assert_eq!(added.title, "row");
    assert_eq!(posts.count().unwrap(), 2);
}

#[test]
fn add_rejects_invalid_elements() {
    let fixture = fixture(1);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    let err = posts.add(Post::new(0, "draft", "bad")).unwrap_err();

    assert!(matches!(err, Error::Assert(_)));
    assert_eq!(posts.count().unwrap(), 1);
}

#[test]
fn set_replaces_or_appends() {
    let fixture = fixture(2);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    posts.set(0, Post::new(20, "draft", "x")).unwrap();
    posts.set(9, Post::new(21, "draft", "y")).unwrap();

    assert_eq!(ids(&posts.to_vec().unwrap()), vec![20, 2, 21]);
}

#[test]
fn remove_by_index_and_by_instance() {
    let fixture = fixture(3);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    let removed = posts.remove(0).unwrap().unwrap();
    assert_eq!(removed.id, 1);
    assert!(posts.remove(5).unwrap().is_none());

    let last = posts.last().unwrap().unwrap();
    assert!(posts.remove_element(&last).unwrap());
    assert!(!posts.remove_element(&last).unwrap());
    assert_eq!(ids(&posts.to_vec().unwrap()), vec![2]);
}

#[test]
fn mutating_a_pending_row_source_consumes_it_first() {
    let fixture = fixture(0);
    let mut posts = fixture
        .session
        .collection_from_rows::<Post>(RowSource::new(post_rows(2)));

    posts.set(1, Post::new(30, "draft", "swapped")).unwrap();

    assert!(posts.is_hydrated());
    assert_eq!(ids(&posts.to_vec().unwrap()), vec![1, 30]);
    assert_eq!(fixture.sink.hydrations_from(HydrationSource::Rows), 1);
}

#[test]
fn cleared_collection_accepts_new_elements() {
    let fixture = fixture(3);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    posts.clear();
    posts.add(Post::new(10, "draft", "fresh")).unwrap();

    assert_eq!(ids(&posts.to_vec().unwrap()), vec![10]);
    assert_eq!(posts.count().unwrap(), 1);
    assert_eq!(fixture.storage.query_count(), 0);
}

#[test]
fn clear_discards_pending_query() {
    let fixture = fixture(3);
    let mut posts = fixture.session.collection::<Post>(Criteria::create());

    posts.clear();

    assert!(posts.is_hydrated());
    assert_eq!(posts.count().unwrap(), 0);
    assert_eq!(fixture.storage.query_count(), 0);
}

//
// Access and combinators
//

#[test]
fn membership_and_positions() {
    let fixture = fixture(3);
    let posts = fixture.session.collection::<Post>(Criteria::create());
    let second = posts.get(1).unwrap().unwrap();
    let stranger = Rc::new(Post::new(2, "publish", "Post 2"));

    assert!(posts.contains(&second).unwrap());
    assert!(!posts.contains(&stranger).unwrap());
    assert!(posts.contains_id(&Id::Int(2)).unwrap());
    assert!(!posts.contains_id(&Id::Int(9)).unwrap());
    assert_eq!(posts.index_of(&second).unwrap(), Some(1));
    assert!(posts.get(7).unwrap().is_none());
}

#[test]
fn slice_windows_the_elements() {
    let fixture = fixture(5);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    assert_eq!(ids(&posts.slice(1, Some(2)).unwrap()), vec![2, 3]);
    assert_eq!(ids(&posts.slice(3, None).unwrap()), vec![4, 5]);
    assert!(posts.slice(9, None).unwrap().is_empty());
}

#[test]
fn predicates_see_index_and_element() {
    let fixture = fixture(4);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    assert!(posts.exists(|i, p| i == 2 && p.id == 3).unwrap());
    assert!(posts.for_all(|i, p| p.id == i as u64 + 1).unwrap());
    assert_eq!(
        posts.find_first(|_, p| p.id > 2).unwrap().map(|p| p.id),
        Some(3)
    );
}

#[test]
fn filter_and_partition_build_hydrated_collections() {
    let fixture = fixture(5);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    let odd = posts.filter(|p| p.id % 2 == 1).unwrap();
    let (low, high) = posts.partition(|_, p| p.id <= 2).unwrap();

    assert!(odd.is_hydrated());
    assert_eq!(ids(&odd.to_vec().unwrap()), vec![1, 3, 5]);
    assert_eq!(ids(&low.to_vec().unwrap()), vec![1, 2]);
    assert_eq!(ids(&high.to_vec().unwrap()), vec![3, 4, 5]);
    assert_eq!(fixture.storage.query_count(), 1);
}

#[test]
fn map_and_reduce_fold_over_elements() {
    let fixture = fixture(4);
    let posts = fixture.session.collection::<Post>(Criteria::create());

    assert_eq!(posts.map(|p| p.id * 10).unwrap(), vec![10, 20, 30, 40]);
    assert_eq!(posts.reduce(|acc, p| acc + p.id, 0).unwrap(), 10);
}

//
// Composition
//

#[test]
fn matching_on_unhydrated_collection_stays_lazy() {
    let fixture = fixture(3);
    let posts = fixture
        .session
        .collection::<Post>(Criteria::create().set_where(eq("status", "publish")));

    let narrowed = posts.matching(&Criteria::create().set_where(gt("ID", 1)));

    assert!(!narrowed.is_hydrated());
    assert_eq!(fixture.storage.query_count(), 0);
    assert_eq!(
        narrowed.query().unwrap(),
        "SELECT DISTINCT posts.* FROM posts \
         WHERE (posts.post_status = 'publish' AND posts.ID > 1)"
    );
}

#[test]
fn matching_on_hydrated_collection_filters_in_memory() {
    let fixture = fixture(4);
    let posts = fixture.session.collection::<Post>(Criteria::create());
    posts.to_vec().unwrap();

    let narrowed = posts.matching(
        &Criteria::create()
            .set_where(gt("ID", 1))
            .order_by([("ID", OrderDirection::Desc)])
            .set_max_results(2),
    );

    assert!(narrowed.is_hydrated());
    assert_eq!(ids(&narrowed.to_vec().unwrap()), vec![4, 3]);
    assert_eq!(fixture.storage.query_count(), 1);
}

#[test]
fn offset_without_limit_agrees_between_query_and_memory() {
    let fixture = fixture(5);
    let offset = Criteria::create().set_first_result(2);

    let lazy = fixture
        .session
        .collection::<Post>(Criteria::create())
        .matching(&offset);
    let loaded = fixture.session.collection::<Post>(Criteria::create());
    loaded.to_vec().unwrap();
    let narrowed = loaded.matching(&offset);

    assert_eq!(
        lazy.query().unwrap(),
        "SELECT DISTINCT posts.* FROM posts LIMIT 2, 18446744073709551615"
    );
    assert_eq!(ids(&lazy.to_vec().unwrap()), vec![3, 4, 5]);
    assert_eq!(ids(&narrowed.to_vec().unwrap()), vec![3, 4, 5]);
}

#[test]
fn scope_contributes_to_the_query() {
    let fixture = fixture(2);
    let posts = fixture.session.collection::<Post>(Criteria::create());
    let published = Status::new([Status::PUBLISH]).unwrap();
    let drafts = Status::new([Status::DRAFT]).unwrap();

    let scoped = posts.with_scope(&published).add_scope(&drafts);
    let replaced = scoped.with_scope(&drafts);

    assert_eq!(
        scoped.query().unwrap(),
        "SELECT DISTINCT posts.* FROM posts \
         WHERE posts.post_status IN ('publish','draft')"
    );
    assert_eq!(scoped.scope().selected(), &[Status::PUBLISH, Status::DRAFT]);
    assert_eq!(
        replaced.query().unwrap(),
        "SELECT DISTINCT posts.* FROM posts WHERE posts.post_status = 'draft'"
    );
}

#[test]
fn scope_on_hydrated_collection_narrows_in_memory() {
    let fixture = Fixture::new(MemoryStorage::fixed(vec![
        Post::new(1, "publish", "a").row(),
        Post::new(2, "draft", "b").row(),
    ]));
    let posts = fixture.session.collection::<Post>(Criteria::create());
    posts.to_vec().unwrap();

    let drafts = posts.with_scope(&Status::new([Status::DRAFT]).unwrap());

    assert_eq!(ids(&drafts.to_vec().unwrap()), vec![2]);
    assert_eq!(fixture.storage.query_count(), 1);
}

//
// Row sources
//

#[test]
fn found_rows_answers_count_without_hydrating() {
    let fixture = fixture(0);
    let source = RowSource::new(post_rows(3)).with_found_rows(40);
    let posts = fixture.session.collection_from_rows::<Post>(source);

    assert_eq!(posts.count().unwrap(), 40);
    assert!(!posts.is_hydrated());
    assert_eq!(posts.to_vec().unwrap().len(), 3);
    assert_eq!(fixture.sink.hydrations_from(HydrationSource::Rows), 1);
    assert_eq!(fixture.storage.query_count(), 0);
}

#[test]
fn row_source_with_criteria_is_filtered_in_memory() {
    let fixture = fixture(0);
    let rows = vec![
        Post::new(1, "publish", "a").row(),
        Post::new(2, "draft", "b").row(),
        Post::new(3, "publish", "c").row(),
    ];
    let posts = fixture
        .session
        .collection_from_rows::<Post>(RowSource::new(rows).with_found_rows(3))
        .matching(&Criteria::create().set_where(eq("status", "publish")));

    assert_eq!(posts.count().unwrap(), 2);
    assert_eq!(fixture.storage.query_count(), 0);
}

#[test]
fn filtered_row_source_primes_only_kept_ids() {
    let fixture = fixture(0);
    let rows = vec![
        Post::new(1, "publish", "a").row(),
        Post::new(2, "draft", "b").row(),
        Post::new(3, "publish", "c").row(),
    ];
    let posts = fixture
        .session
        .collection_from_rows::<Post>(RowSource::new(rows))
        .matching(&Criteria::create().set_where(eq("status", "publish")));

    let cache = posts.property_cache().unwrap().unwrap();

    assert_eq!(cache.batch(), &[Id::Int(1), Id::Int(3)]);
}

#[test]
fn from_entities_is_hydrated_and_deduplicated() {
    let fixture = fixture(0);
    let posts = LazyCollection::from_entities(
        &fixture.session,
        [
            Post::new(1, "publish", "a"),
            Post::new(1, "publish", "again"),
        ],
    )
    .unwrap();

    let elements = posts.to_vec().unwrap();
    assert!(Rc::ptr_eq(&elements[0], &elements[1]));
    assert_eq!(elements[1].title, "a");
    assert_eq!(fixture.sink.hydrations_from(HydrationSource::Entities), 1);
}

#[test]
fn from_entities_rejects_invalid_elements() {
    let fixture = fixture(0);

    let result = LazyCollection::from_entities(&fixture.session, [Post::new(0, "publish", "a")]);

    assert!(matches!(result, Err(Error::Assert(_))));
}

//
// Properties
//

#[test]
fn hydration_primes_a_batched_property_cache() {
    let fixture = Fixture::new(MemoryStorage::posts(
        post_rows(3),
        vec![meta_row(1, "color", "red"), meta_row(2, "color", "blue")],
    ));
    let posts = fixture.session.collection::<Post>(Criteria::create());

    let two = posts.properties(&Id::Int(2)).unwrap();
    let one = posts.properties(&Id::Int(1)).unwrap();

    assert_eq!(two.get("color"), Some(&Value::from("blue")));
    assert_eq!(one.get("color"), Some(&Value::from("red")));
    assert_eq!(fixture.sink.property_fetches(), vec![(3, true)]);
    assert_eq!(fixture.storage.query_count(), 2);
}

#[test]
fn derived_collections_share_the_property_cache() {
    let fixture = fixture(3);
    let posts = fixture.session.collection::<Post>(Criteria::create());
    let cache = posts.property_cache().unwrap().unwrap();

    let odd = posts.filter(|p| p.id % 2 == 1).unwrap();

    assert!(Rc::ptr_eq(&cache, &odd.property_cache().unwrap().unwrap()));
}

//
// Failures
//

#[test]
fn storage_failure_surfaces_and_leaves_collection_unhydrated() {
    let fixture = Fixture::new(MemoryStorage::new(|_| Err(StoreError::new("offline"))));
    let posts = fixture.session.collection::<Post>(Criteria::create());

    let err = posts.to_vec().unwrap_err();

    assert_eq!(err.origin(), ErrorOrigin::Store);
    assert!(!posts.is_hydrated());
}

#[test]
fn empty_count_answer_is_an_assertion_error() {
    let fixture = Fixture::new(MemoryStorage::fixed(Vec::new()));
    let posts = fixture.session.collection::<Post>(Criteria::create());

    let err = posts.count().unwrap_err();

    assert!(matches!(
        err,
        Error::Assert(AssertError::MissingField { ref field }) if field == "row_count"
    ));
    assert!(
        fixture
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Error { .. }))
    );
}

#[test]
fn non_numeric_count_is_rejected_and_not_cached() {
    let fixture = Fixture::new(MemoryStorage::fixed(vec![
        RawRow::new().with("row_count", "many"),
    ]));
    let posts = fixture.session.collection::<Post>(Criteria::create());

    let first = posts.count().unwrap_err();
    posts.count().unwrap_err();

    assert!(matches!(
        first,
        Error::Assert(AssertError::InvalidField { .. })
    ));
    assert_eq!(fixture.storage.query_count(), 2);
}

#[test]
fn malformed_row_is_an_assertion_error() {
    let fixture = Fixture::new(MemoryStorage::fixed(vec![
        RawRow::new().with("post_title", "no id"),
    ]));
    let posts = fixture.session.collection::<Post>(Criteria::create());

    let err = posts.first().unwrap_err();

    assert!(matches!(err, Error::Assert(_)));
    assert!(!posts.is_hydrated());
}
