//! Scheduling IR: programs, statements, invariants.

pub mod program;
pub mod statement;

pub use program::{DimTag, Invariant, Program};
pub use statement::{Statement, ValueHandle};
