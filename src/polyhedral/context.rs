//! Algebra contexts.
//!
//! Every program owns a context, and every set and map records the id of
//! the context it was created in.  Mixing objects from different contexts
//! is a caller bug and is asserted, never reported as a recoverable error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a [`Context`].
///
/// Cheap to copy and embed; sets and maps carry one instead of a
/// reference to the context itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// An algebra context.  One per program.
#[derive(Debug)]
pub struct Context {
    id: ContextId,
}

impl Context {
    /// Create a fresh context with a process-unique id.
    pub fn new() -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self { id: ContextId(id) }
    }

    /// The id sets and maps created in this context carry.
    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_ids_unique() {
        let a = Context::new();
        let b = Context::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_context_id_copy() {
        let ctx = Context::new();
        let id = ctx.id();
        let id2 = id;
        assert_eq!(id, id2);
    }
}
