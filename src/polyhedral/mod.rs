//! Polyhedral algebra: spaces, affine expressions, constraints, integer
//! sets, affine maps, and variable elimination.
//!
//! This is the backend the scheduling layer sits on.  Everything is
//! exact integer arithmetic; projection falls back to Fourier-Motzkin
//! with gcd tightening only when no unit-coefficient equality is
//! available.

pub mod constraint;
pub mod context;
pub mod expr;
pub mod map;
pub mod set;
pub mod space;
pub mod union;

pub(crate) mod parse;
pub(crate) mod project;

pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use context::{Context, ContextId};
pub use expr::AffineExpr;
pub use map::Map;
pub use set::Set;
pub use space::Space;
pub use union::{UnionMap, UnionSet};
