//! Trace sink boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! hydration, caching or query semantics.

use crate::error::{ErrorClass, ErrorOrigin};
use sha2::{Digest, Sha256};
use std::fmt;

///
/// TraceSink
///

pub trait TraceSink {
    fn on_event(&self, event: TraceEvent);
}

///
/// QueryKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryKind {
    Select,
    Count,
    Properties,
}

impl QueryKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Select => 0x01,
            Self::Count => 0x02,
            Self::Properties => 0x03,
        }
    }
}

///
/// HydrationSource
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HydrationSource {
    Criteria,
    Rows,
    Entities,
}

///
/// QueryFingerprint
///
/// Stable digest of a query kind plus its rendered text.
///

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    #[must_use]
    pub fn of(kind: QueryKind, query: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"queryfp:v1");
        hasher.update([kind.tag()]);
        let len = u32::try_from(query.len()).unwrap_or(u32::MAX);
        hasher.update(len.to_be_bytes());
        hasher.update(query.as_bytes());

        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryFingerprint(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

///
/// TraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceEvent {
    Query {
        kind: QueryKind,
        fingerprint: QueryFingerprint,
    },
    Hydrate {
        entity: &'static str,
        source: HydrationSource,
        rows: u64,
    },
    IdentityHit {
        entity: &'static str,
    },
    PropertyFetch {
        ids: u64,
        batched: bool,
    },
    Error {
        origin: ErrorOrigin,
        class: ErrorClass,
    },
}
