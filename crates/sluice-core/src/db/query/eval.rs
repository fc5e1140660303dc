use crate::{
    db::{
        model::EntityKind,
        query::{
            criteria::{Criteria, OrderDirection},
            expr::{CompareOp, Comparison, Expression, FieldRef},
        },
    },
    value::{TextOp, Value, canonical_cmp, compare_eq, compare_order, text_matches},
};
use std::{cmp::Ordering, rc::Rc};

///
/// Evaluate an expression against a single hydrated entity.
///
/// Pure runtime evaluation through the entity's field-accessor table:
/// - bare names and aliases resolve against the entity's own table
/// - references to other tables cannot be answered in memory
///
/// Any missing field or unsupported comparison evaluates to `false`.
///
#[must_use]
pub fn eval<E: EntityKind>(entity: &E, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|child| eval(entity, child)),
        Expression::Or(children) => children.iter().any(|child| eval(entity, child)),
        Expression::Compare(cmp) => eval_compare(entity, cmp),
    }
}

fn eval_compare<E: EntityKind>(entity: &E, cmp: &Comparison) -> bool {
    let Some(columns) = resolve_columns::<E>(&cmp.field) else {
        return false;
    };

    // Composite aliases match only when every column matches.
    !columns.is_empty()
        && columns.iter().all(|column| {
            entity
                .field(column)
                .is_some_and(|actual| compare(&actual, cmp.op, &cmp.value))
        })
}

// Physical column names a field reference reads on `E`, or `None` when the
// reference points at another table.
fn resolve_columns<E: EntityKind>(field: &FieldRef) -> Option<Vec<&str>> {
    let name = match field {
        FieldRef::Name(name) => name.as_str(),
        FieldRef::Column(column) if E::TABLE.is_named(&column.table) => column.column.as_str(),
        FieldRef::Column(_) => return None,
    };

    Some(
        E::TABLE
            .alias(name)
            .map_or_else(|| vec![name], |columns| columns.to_vec()),
    )
}

// NOTE: comparison helpers return None when a comparison is invalid; eval treats that as false.
fn compare(actual: &Value, op: CompareOp, value: &Value) -> bool {
    match op {
        CompareOp::Eq => compare_eq(actual, value).unwrap_or(false),
        CompareOp::Ne => compare_eq(actual, value).is_some_and(|v| !v),

        CompareOp::Lt => compare_order(actual, value).is_some_and(Ordering::is_lt),
        CompareOp::Lte => compare_order(actual, value).is_some_and(Ordering::is_le),
        CompareOp::Gt => compare_order(actual, value).is_some_and(Ordering::is_gt),
        CompareOp::Gte => compare_order(actual, value).is_some_and(Ordering::is_ge),

        CompareOp::In => in_list(actual, value).unwrap_or(false),
        CompareOp::NotIn => in_list(actual, value).is_some_and(|matched| !matched),

        CompareOp::Contains => text_matches(actual, value, TextOp::Contains).unwrap_or(false),
        CompareOp::StartsWith => text_matches(actual, value, TextOp::StartsWith).unwrap_or(false),
        CompareOp::EndsWith => text_matches(actual, value, TextOp::EndsWith).unwrap_or(false),
    }
}

// Membership test. An empty list is a valid, never-matching list so that
// `NOT IN ()` holds for every row, as it does in storage.
fn in_list(actual: &Value, list: &Value) -> Option<bool> {
    let Value::List(items) = list else {
        return None;
    };
    if items.is_empty() {
        return Some(false);
    }

    let mut saw_valid = false;
    for item in items {
        match compare_eq(actual, item) {
            Some(true) => return Some(true),
            Some(false) => saw_valid = true,
            None => {}
        }
    }

    saw_valid.then_some(false)
}

///
/// Apply a criteria to an already-hydrated entity list.
///
/// Stable filter, then stable sort by the orderings in declaration order,
/// then the offset/limit window. A null criteria returns the input as-is.
///
#[must_use]
pub fn apply_in_memory<E: EntityKind>(criteria: &Criteria, entities: &[Rc<E>]) -> Vec<Rc<E>> {
    if criteria.is_null() {
        return entities.to_vec();
    }

    let mut matched = entities
        .iter()
        .filter(|entity| {
            criteria
                .where_expr()
                .is_none_or(|expr| eval::<E>(entity, expr))
        })
        .cloned()
        .collect::<Vec<_>>();

    if !criteria.orderings().is_empty() {
        matched.sort_by(|a, b| {
            for ordering in criteria.orderings() {
                let field = FieldRef::parse(&ordering.field);
                let ord = canonical_cmp(&sort_key::<E>(a, &field), &sort_key::<E>(b, &field));
                let ord = match ordering.direction {
                    OrderDirection::Asc => ord,
                    OrderDirection::Desc => ord.reverse(),
                };
                if ord.is_ne() {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let offset = usize::try_from(criteria.first_result().unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = if criteria.is_unbounded() {
        usize::MAX
    } else {
        criteria
            .max_results()
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX)
    };

    matched.into_iter().skip(offset).take(limit).collect()
}

// First resolved column's value; unreadable fields sort as null.
fn sort_key<E: EntityKind>(entity: &E, field: &FieldRef) -> Value {
    resolve_columns::<E>(field)
        .and_then(|columns| columns.first().and_then(|column| entity.field(column)))
        .unwrap_or(Value::Null)
}
