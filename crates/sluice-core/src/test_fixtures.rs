//! Shared in-memory storage, trace recorder and a `Post` entity used across
//! the unit tests.

use crate::{
    config::SluiceConfig,
    db::{
        Session,
        identity::Id,
        model::{
            AssertError, ColumnAlias, EntityKind, FieldAccessor, JoinColumn, JoinModel,
            PropertyModel, TableModel,
        },
        query::{Criteria, OrderDirection, eq},
        store::{RawRow, Storage, StoreError},
    },
    obs::{HydrationSource, TraceEvent, TraceSink},
    value::Value,
};
use std::{cell::RefCell, rc::Rc};

///
/// MemoryStorage
///
/// Answers every query through a responder closure and logs the text it
/// was asked to execute.
///

type Responder = Box<dyn Fn(&str) -> Result<Vec<RawRow>, StoreError>>;

pub struct MemoryStorage {
    responder: Responder,
    log: RefCell<Vec<String>>,
}

impl MemoryStorage {
    pub fn new(responder: impl Fn(&str) -> Result<Vec<RawRow>, StoreError> + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            log: RefCell::new(Vec::new()),
        }
    }

    /// Storage returning the same rows for every query.
    pub fn fixed(rows: Vec<RawRow>) -> Self {
        Self::new(move |_| Ok(rows.clone()))
    }

    /// Storage that serves `SELECT` rows inside the query's `LIMIT` window,
    /// a count of that window for `COUNT(*)` wrappers and the requested
    /// owners' rows for `postmeta` selects.
    pub fn posts(posts: Vec<RawRow>, meta: Vec<RawRow>) -> Self {
        Self::new(move |query| {
            let (offset, limit) = limit_window(query);
            let window = posts.iter().skip(offset).take(limit);
            if query.starts_with("SELECT COUNT(*)") {
                let count = u64::try_from(window.count()).unwrap_or(u64::MAX);
                return Ok(vec![RawRow::new().with("row_count", count)]);
            }
            if query.contains("postmeta.*") {
                let wanted = requested_owners(query);
                return Ok(meta
                    .iter()
                    .filter(|row| row.u64("post_id").is_some_and(|id| wanted.contains(&id)))
                    .cloned()
                    .collect());
            }
            Ok(window.cloned().collect())
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn query_count(&self) -> usize {
        self.log.borrow().len()
    }
}

// Owner IDs inside the first `IN (...)` list of a property select.
fn requested_owners(query: &str) -> Vec<u64> {
    query
        .split_once("IN (")
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(list, _)| list.split(',').filter_map(|id| id.trim().parse().ok()).collect())
        .unwrap_or_default()
}

// `(offset, limit)` from the last `LIMIT` clause; unbounded when absent.
fn limit_window(query: &str) -> (usize, usize) {
    let Some((_, rest)) = query.rsplit_once("LIMIT ") else {
        return (0, usize::MAX);
    };
    let clause = rest.split(')').next().unwrap_or(rest);
    let numbers = clause
        .split(',')
        .filter_map(|n| n.trim().parse::<u64>().ok())
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
        .collect::<Vec<_>>();

    match numbers.as_slice() {
        [limit] => (0, *limit),
        [offset, limit] => (*offset, *limit),
        _ => (0, usize::MAX),
    }
}

impl Storage for MemoryStorage {
    fn execute(&self, query: &str) -> Result<Vec<RawRow>, StoreError> {
        self.log.borrow_mut().push(query.to_string());
        (self.responder)(query)
    }
}

///
/// RecordingSink
///

#[derive(Default)]
pub struct RecordingSink {
    events: RefCell<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    pub fn hydrations(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, TraceEvent::Hydrate { .. }))
            .count()
    }

    pub fn hydrations_from(&self, from: HydrationSource) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, TraceEvent::Hydrate { source, .. } if *source == from))
            .count()
    }

    pub fn property_fetches(&self) -> Vec<(u64, bool)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::PropertyFetch { ids, batched } => Some((*ids, *batched)),
                _ => None,
            })
            .collect()
    }

    pub fn identity_hits(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, TraceEvent::IdentityHit { .. }))
            .count()
    }
}

impl TraceSink for RecordingSink {
    fn on_event(&self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}

///
/// Fixture
/// A session wired to a memory storage and a recording sink.
///

pub struct Fixture {
    pub storage: Rc<MemoryStorage>,
    pub sink: Rc<RecordingSink>,
    pub session: Session,
}

impl Fixture {
    pub fn new(storage: MemoryStorage) -> Self {
        Self::with_config(storage, SluiceConfig::default())
    }

    pub fn with_config(storage: MemoryStorage, config: SluiceConfig) -> Self {
        let storage = Rc::new(storage);
        let sink = Rc::new(RecordingSink::default());
        let session = Session::new(storage.clone())
            .with_config(config)
            .trace_sink(sink.clone());

        Self {
            storage,
            sink,
            session,
        }
    }
}

///
/// Tables
///

pub const POSTMETA: TableModel = TableModel {
    name: "postmeta",
    primary_key: "meta_id",
    aliases: &[
        ColumnAlias {
            name: "id",
            columns: &["meta_id"],
        },
        ColumnAlias {
            name: "key",
            columns: &["meta_key"],
        },
        ColumnAlias {
            name: "value",
            columns: &["meta_value"],
        },
    ],
    joins: &[],
};

pub const POSTS: TableModel = TableModel {
    name: "posts",
    primary_key: "ID",
    aliases: &[
        ColumnAlias {
            name: "id",
            columns: &["ID"],
        },
        ColumnAlias {
            name: "status",
            columns: &["post_status"],
        },
        ColumnAlias {
            name: "title",
            columns: &["post_title"],
        },
        ColumnAlias {
            name: "slug",
            columns: &["post_name", "guid"],
        },
    ],
    joins: &[
        JoinModel {
            tables: &["postmeta"],
            on: &[(
                JoinColumn {
                    table: "postmeta",
                    column: "post_id",
                },
                JoinColumn {
                    table: "posts",
                    column: "ID",
                },
            )],
        },
        JoinModel {
            tables: &["term_relationships", "term_taxonomy", "terms"],
            on: &[
                (
                    JoinColumn {
                        table: "term_relationships",
                        column: "object_id",
                    },
                    JoinColumn {
                        table: "posts",
                        column: "ID",
                    },
                ),
                (
                    JoinColumn {
                        table: "term_relationships",
                        column: "term_taxonomy_id",
                    },
                    JoinColumn {
                        table: "term_taxonomy",
                        column: "term_taxonomy_id",
                    },
                ),
                (
                    JoinColumn {
                        table: "term_taxonomy",
                        column: "term_id",
                    },
                    JoinColumn {
                        table: "terms",
                        column: "term_id",
                    },
                ),
            ],
        },
    ],
};

pub const POST_PROPERTIES: PropertyModel = PropertyModel {
    table: &POSTMETA,
    owner_column: "post_id",
    key_column: "meta_key",
    value_column: "meta_value",
};

///
/// Post
///

#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub id: u64,
    pub status: String,
    pub title: String,
    pub menu_order: i64,
}

impl Post {
    pub fn new(id: u64, status: &str, title: &str) -> Self {
        Self {
            id,
            status: status.to_string(),
            title: title.to_string(),
            menu_order: 0,
        }
    }

    pub fn row(&self) -> RawRow {
        RawRow::new()
            .with("ID", self.id)
            .with("post_status", self.status.as_str())
            .with("post_title", self.title.as_str())
            .with("menu_order", self.menu_order)
    }
}

impl EntityKind for Post {
    const PATH: &'static str = "test_fixtures::Post";
    const TABLE: &'static TableModel = &POSTS;
    const PROPERTIES: Option<&'static PropertyModel> = Some(&POST_PROPERTIES);
    const FIELDS: &'static [FieldAccessor<Self>] = &[
        FieldAccessor::new("ID", |p| Value::Uint(p.id)),
        FieldAccessor::new("post_status", |p| Value::Text(p.status.clone())),
        FieldAccessor::new("post_title", |p| Value::Text(p.title.clone())),
        FieldAccessor::new("menu_order", |p| Value::Int(p.menu_order)),
    ];

    fn id(&self) -> Option<Id> {
        Some(Id::Int(self.id))
    }

    fn from_row(row: &RawRow) -> Result<Self, AssertError> {
        let id = row.u64("ID").ok_or_else(|| AssertError::MissingField {
            field: "ID".to_string(),
        })?;
        let menu_order = match row.get("menu_order") {
            Some(Value::Int(v)) => *v,
            Some(other) => other
                .as_u64()
                .and_then(|v| i64::try_from(v).ok())
                .unwrap_or_default(),
            None => 0,
        };

        Ok(Self {
            id,
            status: row.text("post_status").unwrap_or_default().to_string(),
            title: row.text("post_title").unwrap_or_default().to_string(),
            menu_order,
        })
    }

    fn assert_kind(&self) -> Result<(), AssertError> {
        if self.id == 0 {
            return Err(AssertError::InvalidField {
                field: "ID".to_string(),
                expected: "positive post ID",
            });
        }

        Ok(())
    }
}

///
/// PublishedPost
///
/// Same table as `Post` but with a default criteria, for repository
/// precedence tests.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PublishedPost(pub Post);

impl EntityKind for PublishedPost {
    const PATH: &'static str = "test_fixtures::PublishedPost";
    const TABLE: &'static TableModel = &POSTS;
    const FIELDS: &'static [FieldAccessor<Self>] = &[
        FieldAccessor::new("ID", |p| Value::Uint(p.0.id)),
        FieldAccessor::new("post_status", |p| Value::Text(p.0.status.clone())),
    ];

    fn id(&self) -> Option<Id> {
        Some(Id::Int(self.0.id))
    }

    fn from_row(row: &RawRow) -> Result<Self, AssertError> {
        Post::from_row(row).map(Self)
    }

    fn default_criteria() -> Criteria {
        Criteria::create()
            .set_where(eq("post_status", "publish"))
            .order_by([("menu_order", OrderDirection::Asc)])
    }
}

/// Rows for posts `1..=n`, all published.
pub fn post_rows(n: u64) -> Vec<RawRow> {
    (1..=n)
        .map(|id| Post::new(id, "publish", &format!("Post {id}")).row())
        .collect()
}

/// Property row for `owner`.
pub fn meta_row(owner: u64, key: &str, value: &str) -> RawRow {
    RawRow::new()
        .with("meta_id", owner * 100)
        .with("post_id", owner)
        .with("meta_key", key)
        .with("meta_value", value)
}
