//! Filters: criteria, expression trees and in-memory evaluation.

mod criteria;
mod eval;
mod expr;


// re-exports
pub use criteria::{Criteria, OrderDirection, Ordering};
pub use eval::{apply_in_memory, eval};
pub use expr::{
    CompareOp, Comparison, Expression, FieldRef, and, contains, ends_with, eq, gt, gte, in_list,
    lt, lte, ne, not_in, or, starts_with,
};
