use crate::db::query::expr::Expression;
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum OrderDirection {
    #[default]
    #[display("ASC")]
    Asc,

    #[display("DESC")]
    Desc,
}

///
/// Ordering
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Ordering {
    pub field: String,
    pub direction: OrderDirection,
}

impl Ordering {
    #[must_use]
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

///
/// Criteria
///
/// Immutable filter description: predicate tree, orderings, offset and
/// limit. Every builder consumes `self` and returns a new value.
///
/// The null criteria is the identity element for `merge`. Building on top
/// of it yields an ordinary criteria.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Criteria {
    where_expr: Option<Expression>,
    orderings: Vec<Ordering>,
    first_result: Option<u64>,
    max_results: Option<u64>,
    null: bool,
}

impl Criteria {
    #[must_use]
    pub fn create() -> Self {
        Self::default()
    }

    /// Distinguished "no filter, no execution plan" value.
    #[must_use]
    pub fn null() -> Self {
        Self {
            null: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.null
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn where_expr(&self) -> Option<&Expression> {
        self.where_expr.as_ref()
    }

    #[must_use]
    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    #[must_use]
    pub fn ordering(&self, field: &str) -> Option<OrderDirection> {
        self.orderings
            .iter()
            .find(|o| o.field == field)
            .map(|o| o.direction)
    }

    #[must_use]
    pub const fn first_result(&self) -> Option<u64> {
        self.first_result
    }

    #[must_use]
    pub const fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    /// True when the limit is absent or `u64::MAX`.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_results.is_none_or(|limit| limit == u64::MAX)
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    #[must_use]
    pub fn set_where(mut self, expr: Expression) -> Self {
        self.null = false;
        self.where_expr = Some(expr);
        self
    }

    /// AND `expr` onto the existing root (or set it when there is none).
    #[must_use]
    pub fn and_where(mut self, expr: Expression) -> Self {
        self.null = false;
        self.where_expr = Some(match self.where_expr.take() {
            Some(existing) => Expression::And(vec![existing, expr]),
            None => expr,
        });
        self
    }

    /// OR `expr` onto the existing root (or set it when there is none).
    #[must_use]
    pub fn or_where(mut self, expr: Expression) -> Self {
        self.null = false;
        self.where_expr = Some(match self.where_expr.take() {
            Some(existing) => Expression::Or(vec![existing, expr]),
            None => expr,
        });
        self
    }

    /// Replace the orderings. Duplicate field keys collapse onto the first
    /// position with the last direction, as an ordered map would.
    #[must_use]
    pub fn order_by<I, F>(mut self, orderings: I) -> Self
    where
        I: IntoIterator<Item = (F, OrderDirection)>,
        F: Into<String>,
    {
        self.null = false;
        self.orderings.clear();
        for (field, direction) in orderings {
            upsert_ordering(&mut self.orderings, Ordering::new(field, direction));
        }
        self
    }

    #[must_use]
    pub fn set_first_result(mut self, offset: u64) -> Self {
        self.null = false;
        self.first_result = Some(offset);
        self
    }

    #[must_use]
    pub fn set_max_results(mut self, limit: u64) -> Self {
        self.null = false;
        self.max_results = Some(limit);
        self
    }

    // ------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------

    /// Combine `self` with `other` into a new criteria.
    ///
    /// - null on either side yields a clone of the other side
    /// - where-expressions AND together
    /// - `other`'s orderings overwrite duplicate keys in place, new keys append
    /// - offset/limit: `other` wins when it sets a value
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if self.null {
            return other.clone();
        }
        if other.null {
            return self.clone();
        }

        let where_expr = match (&self.where_expr, &other.where_expr) {
            (Some(a), Some(b)) => Some(Expression::And(vec![a.clone(), b.clone()])),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };

        let mut orderings = self.orderings.clone();
        for ordering in &other.orderings {
            upsert_ordering(&mut orderings, ordering.clone());
        }

        Self {
            where_expr,
            orderings,
            first_result: other.first_result.or(self.first_result),
            max_results: other.max_results.or(self.max_results),
            null: false,
        }
    }
}

fn upsert_ordering(orderings: &mut Vec<Ordering>, ordering: Ordering) {
    match orderings.iter_mut().find(|o| o.field == ordering.field) {
        Some(existing) => existing.direction = ordering.direction,
        None => orderings.push(ordering),
    }
}
