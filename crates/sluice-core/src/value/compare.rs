use crate::value::Value;
use std::cmp::Ordering;

///
/// TextOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

/// Equality with numeric widening across `Int`/`Uint`/`Float`.
///
/// Returns `None` for mismatched or non-comparable variants.
#[must_use]
pub(crate) fn compare_eq(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(true),
        (Value::Null, _) | (_, Value::Null) => Some(false),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::Text(a), Value::Text(b)) => Some(a == b),
        (Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut all = true;
            for (x, y) in a.iter().zip(b) {
                all &= compare_eq(x, y)?;
            }
            Some(all)
        }
        (Value::Column(_), _) | (_, Value::Column(_)) => None,
        _ => compare_numeric(left, right).map(Ordering::is_eq),
    }
}

/// Ordering with numeric widening; text orders lexicographically.
///
/// Returns `None` for mismatched or non-orderable variants.
#[must_use]
pub(crate) fn compare_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => compare_numeric(left, right),
    }
}

/// Text predicate over two values; non-text operands are invalid.
#[must_use]
pub(crate) fn text_matches(actual: &Value, needle: &Value, op: TextOp) -> Option<bool> {
    let Value::Text(actual) = actual else {
        return None;
    };
    let needle = match needle {
        Value::Text(text) => text.clone(),
        other if other.is_numeric() => other.to_plain_text(),
        _ => return None,
    };

    Some(match op {
        TextOp::Contains => actual.contains(&needle),
        TextOp::StartsWith => actual.starts_with(&needle),
        TextOp::EndsWith => actual.ends_with(&needle),
    })
}

/// Total comparator used for stable in-memory sorting.
///
/// Orderable pairs compare by value; everything else falls back to a fixed
/// variant rank so the sort stays deterministic.
#[must_use]
pub(crate) fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    compare_order(left, right).unwrap_or_else(|| rank(left).cmp(&rank(right)))
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Uint(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::List(_) => 4,
        Value::Column(_) => 5,
    }
}

#[expect(clippy::cast_precision_loss)]
fn compare_numeric(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Uint(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Uint(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        _ => None,
    }
}
