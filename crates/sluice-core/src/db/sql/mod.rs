//! Query text rendering: expression compiler and clause generator.

mod compile;
mod generator;


use crate::{db::query::CompareOp, value::Value};
use thiserror::Error as ThisError;

// re-exports
pub use compile::{BindMode, Compiler, compile};
pub use generator::QueryGenerator;

///
/// CompileError
///
/// Fatal, non-retried failures while rendering an expression tree.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CompileError {
    #[error("composite expression has no children")]
    EmptyComposite,

    #[error("multi-column IN expressions are not supported (field '{field}')")]
    MultiColumnIn { field: String },

    #[error("malformed field reference '{field}'")]
    MalformedField { field: String },

    #[error("table '{table}' is neither the primary table nor a declared join")]
    UnknownTable { table: String },

    #[error("operator '{}' does not accept a list operand", .op.dsl_name())]
    InvalidListOperand { op: CompareOp },
}

///
/// Statement
///
/// Query text with `?` markers plus the values bound to them, in order.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}
