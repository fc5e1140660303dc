use crate::value::{Column, Value};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{BitAnd, BitOr},
};

///
/// Expression AST
///
/// Pure, storage-agnostic representation of a criteria predicate.
/// Trees are immutable once built; rendering and in-memory evaluation
/// happen in later passes:
///
/// - SQL compilation (`db::sql`)
/// - in-memory evaluation against hydrated entities (`db::query::eval`)
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0x01,
    Ne = 0x02,
    Lt = 0x03,
    Lte = 0x04,
    Gt = 0x05,
    Gte = 0x06,
    In = 0x07,
    NotIn = 0x08,
    Contains = 0x09,
    StartsWith = 0x0a,
    EndsWith = 0x0b,
}

impl CompareOp {
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    #[must_use]
    pub const fn is_like(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    /// Name used by the caller-facing DSL.
    #[must_use]
    pub const fn dsl_name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }
}

///
/// FieldRef
///
/// Either a bare field name, resolved against the query's primary table,
/// or a qualified `(table, column)` pair. `"table.column"` strings parse
/// into the qualified form; anything else stays a bare name and is
/// validated at compile time.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum FieldRef {
    Name(String),
    Column(Column),
}

impl FieldRef {
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    #[must_use]
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Column(Column::new(table, column))
    }

    /// Parse `"table.column"` into a qualified reference. Strings with no dot,
    /// several dots, or an empty side stay bare names.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((table, column))
                if !table.is_empty() && !column.is_empty() && !column.contains('.') =>
            {
                Self::qualified(table, column)
            }
            _ => Self::Name(raw.to_string()),
        }
    }

    /// Table named by a qualified reference.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Name(_) => None,
            Self::Column(column) => Some(&column.table),
        }
    }

    /// True when this reference names `table` explicitly (case-insensitive,
    /// matching how storage identifiers compare).
    #[must_use]
    pub fn references_table(&self, table: &str) -> bool {
        self.table().is_some_and(|t| t.eq_ignore_ascii_case(table))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Column(column) => write!(f, "{column}"),
        }
    }
}

impl From<&str> for FieldRef {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for FieldRef {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Column> for FieldRef {
    fn from(column: Column) -> Self {
        Self::Column(column)
    }
}

///
/// Comparison
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Comparison {
    pub field: FieldRef,
    pub op: CompareOp,
    pub value: Value,
}

impl Comparison {
    #[must_use]
    pub fn new(field: impl Into<FieldRef>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

///
/// Expression
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Expression {
    Compare(Comparison),
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl Expression {
    #[must_use]
    pub const fn and(children: Vec<Self>) -> Self {
        Self::And(children)
    }

    #[must_use]
    pub const fn or(children: Vec<Self>) -> Self {
        Self::Or(children)
    }

    /// Visit every comparison leaf in depth-first, left-to-right order.
    pub fn for_each_comparison<'a>(&'a self, f: &mut impl FnMut(&'a Comparison)) {
        match self {
            Self::Compare(cmp) => f(cmp),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.for_each_comparison(f);
                }
            }
        }
    }

    /// Flattened leaf list, used to compare predicate sets across nestings.
    #[must_use]
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.for_each_comparison(&mut |cmp| out.push(cmp));
        out
    }
}

impl From<Comparison> for Expression {
    fn from(cmp: Comparison) -> Self {
        Self::Compare(cmp)
    }
}

impl BitAnd for Expression {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitOr for Expression {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(vec![self, rhs])
    }
}

//
// DSL
//

fn compare(field: impl Into<FieldRef>, op: CompareOp, value: impl Into<Value>) -> Expression {
    Expression::Compare(Comparison::new(field, op, value))
}

#[must_use]
pub fn eq(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Eq, value)
}

#[must_use]
pub fn ne(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Ne, value)
}

#[must_use]
pub fn gt(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Gt, value)
}

#[must_use]
pub fn gte(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Gte, value)
}

#[must_use]
pub fn lt(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Lt, value)
}

#[must_use]
pub fn lte(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Lte, value)
}

#[must_use]
pub fn in_list<I, V>(field: impl Into<FieldRef>, values: I) -> Expression
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values = values.into_iter().map(Into::into).collect::<Vec<Value>>();
    compare(field, CompareOp::In, Value::List(values))
}

#[must_use]
pub fn not_in<I, V>(field: impl Into<FieldRef>, values: I) -> Expression
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values = values.into_iter().map(Into::into).collect::<Vec<Value>>();
    compare(field, CompareOp::NotIn, Value::List(values))
}

#[must_use]
pub fn contains(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::Contains, value)
}

#[must_use]
pub fn starts_with(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::StartsWith, value)
}

#[must_use]
pub fn ends_with(field: impl Into<FieldRef>, value: impl Into<Value>) -> Expression {
    compare(field, CompareOp::EndsWith, value)
}

#[must_use]
pub const fn and(children: Vec<Expression>) -> Expression {
    Expression::And(children)
}

#[must_use]
pub const fn or(children: Vec<Expression>) -> Expression {
    Expression::Or(children)
}
