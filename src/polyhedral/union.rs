//! Unions of sets and maps over per-statement tuples.
//!
//! A union holds one piece per statement tuple.  Set unions may mix
//! arities (iteration domains do); unions built after schedule
//! alignment share one range arity, which the aligned constructors
//! assert.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::context::ContextId;
use super::map::Map;
use super::set::Set;

/// Union of sets with pairwise-distinct tuples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionSet {
    ctx: ContextId,
    sets: Vec<Set>,
}

impl UnionSet {
    /// Union of arbitrary pieces; arities may differ.
    pub fn from_sets(ctx: ContextId, sets: Vec<Set>) -> Self {
        for s in &sets {
            assert_eq!(s.ctx(), ctx, "set from a different context");
        }
        Self { ctx, sets }
    }

    /// Union of pieces sharing one arity.  Time-processor domains go
    /// through here; alignment is the caller's precondition.
    pub fn from_aligned_sets(ctx: ContextId, sets: Vec<Set>) -> Self {
        if let Some(first) = sets.first() {
            for s in &sets[1..] {
                assert_eq!(s.n_dim(), first.n_dim(), "union of unaligned sets");
            }
        }
        Self::from_sets(ctx, sets)
    }

    pub fn ctx(&self) -> ContextId {
        self.ctx
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Set> {
        self.sets.iter()
    }

    pub fn sets(&self) -> &[Set] {
        &self.sets
    }
}

impl fmt::Display for UnionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pieces: Vec<String> = self.sets.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", pieces.join("; "))
    }
}

/// Union of maps with pairwise-distinct input tuples and a common range
/// arity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionMap {
    ctx: ContextId,
    maps: Vec<Map>,
}

impl UnionMap {
    pub fn from_maps(ctx: ContextId, maps: Vec<Map>) -> Self {
        for m in &maps {
            assert_eq!(m.ctx(), ctx, "map from a different context");
        }
        if let Some(first) = maps.first() {
            for m in &maps[1..] {
                assert_eq!(m.n_out(), first.n_out(), "union of unaligned maps");
            }
        }
        Self { ctx, maps }
    }

    pub fn ctx(&self) -> ContextId {
        self.ctx
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Map> {
        self.maps.iter()
    }

    pub fn maps(&self) -> &[Map] {
        &self.maps
    }
}

impl fmt::Display for UnionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pieces: Vec<String> = self.maps.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", pieces.join("; "))
    }
}
