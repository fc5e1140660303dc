//! Observability: the trace sink abstraction and its event vocabulary.
//!
//! Core logic never formats log lines itself; it emits `TraceEvent`s through
//! the session's optional sink.

pub(crate) mod sink;

// re-exports
pub use sink::{HydrationSource, QueryFingerprint, QueryKind, TraceEvent, TraceSink};
