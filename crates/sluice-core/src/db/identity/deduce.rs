use crate::{
    db::{
        identity::{Id, IdentityError},
        model::EntityKind,
        store::RawRow,
    },
    value::Value,
};

/// Accessor and row-key names tried for an identity, in priority order.
const IDENTITY_NAMES: [&str; 3] = ["ID", "id", "Id"];

///
/// Strategy
///
/// One way of extracting an identity from an element. Strategies are tried
/// in declaration order; the first one that applies decides.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// The entity's own `id()` accessor.
    IdentityField,

    /// A field accessor named `ID`, `id` or `Id`.
    IdentityMethod,

    /// A raw row key named `ID`, `id` or `Id`.
    RawMapKey,
}

///
/// IdDeducer
///

pub struct IdDeducer;

impl IdDeducer {
    pub const STRATEGIES: [Strategy; 3] = [
        Strategy::IdentityField,
        Strategy::IdentityMethod,
        Strategy::RawMapKey,
    ];

    /// Deduce the identity of an entity, its raw row, or both.
    pub fn deduce<E: EntityKind>(
        entity: Option<&E>,
        row: Option<&RawRow>,
    ) -> Result<Id, IdentityError> {
        for strategy in Self::STRATEGIES {
            if let Some(found) = Self::attempt(strategy, entity, row) {
                return found;
            }
        }

        Err(IdentityError::Undeducible {
            shape: match (entity, row) {
                (Some(_), _) => E::PATH.to_string(),
                (None, Some(_)) => "row".to_string(),
                (None, None) => "nothing".to_string(),
            },
        })
    }

    /// Deduce the identity of a row alone.
    pub fn deduce_row(row: &RawRow) -> Result<Id, IdentityError> {
        IDENTITY_NAMES
            .iter()
            .find_map(|key| row.get(*key))
            .map_or_else(
                || {
                    Err(IdentityError::Undeducible {
                        shape: "row".to_string(),
                    })
                },
                Self::deduce_value,
            )
    }

    /// Scalars: non-negative integers and digit strings become `Int`,
    /// version-4 UUID strings become `Uuid`.
    pub fn deduce_value(value: &Value) -> Result<Id, IdentityError> {
        match value {
            Value::Uint(id) => Ok(Id::Int(*id)),
            Value::Int(id) if *id >= 0 => Ok(Id::Int(id.unsigned_abs())),
            Value::Text(text) if is_digits(text) => text
                .parse()
                .map(Id::Int)
                .map_err(|_| undeducible(value)),
            Value::Text(text) if is_uuid_v4(text) => Ok(Id::Uuid(text.clone())),
            _ => Err(undeducible(value)),
        }
    }

    // `None` when the strategy does not apply; `Some(result)` when it decides.
    fn attempt<E: EntityKind>(
        strategy: Strategy,
        entity: Option<&E>,
        row: Option<&RawRow>,
    ) -> Option<Result<Id, IdentityError>> {
        match strategy {
            Strategy::IdentityField => entity.and_then(E::id).map(Ok),
            Strategy::IdentityMethod => {
                let entity = entity?;
                IDENTITY_NAMES
                    .iter()
                    .find_map(|name| entity.field(name))
                    .map(|value| Self::deduce_value(&value))
            }
            Strategy::RawMapKey => {
                let row = row?;
                IDENTITY_NAMES
                    .iter()
                    .find_map(|key| row.get(*key))
                    .map(Self::deduce_value)
            }
        }
    }
}

fn undeducible(value: &Value) -> IdentityError {
    let shape = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Uint(_) => "uint",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::List(_) => "list",
        Value::Column(_) => "column",
    };

    IdentityError::Undeducible {
        shape: shape.to_string(),
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

// ^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$
fn is_uuid_v4(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != 36 {
        return false;
    }

    bytes.iter().enumerate().all(|(i, &b)| match i {
        8 | 13 | 18 | 23 => b == b'-',
        14 => b == b'4',
        19 => matches!(b, b'8' | b'9' | b'a' | b'b'),
        _ => matches!(b, b'0'..=b'9' | b'a'..=b'f'),
    })
}
