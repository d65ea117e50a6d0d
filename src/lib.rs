//! # polysched
//!
//! A polyhedral scheduling core: statements with affine iteration
//! domains, affine schedules into time-processor space, schedule
//! transformations (split, interchange, tile, sequential ordering,
//! parallel/vector tagging), and generation of a totally ordered loop
//! AST.
//!
//! Domains and schedules are written in an isl-style textual form and
//! manipulated through it:
//!
//! ```
//! use polysched::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut program = Program::new("blur")?;
//! program.declare_statement(
//!     "[N] -> { S[i, j] : 0 <= i < N and 0 <= j < 10 }",
//!     ValueHandle(0),
//! )?;
//! program.statement_mut("S")?.tile(0, 1, 2, 2)?;
//! program.tag_parallel_dimension("S", 0)?;
//!
//! let ast = generate_ast(&mut program)?;
//! println!("{}", ast_to_string(&ast));
//! # Ok(())
//! # }
//! ```
//!
//! The generated AST for the example is a 4-deep loop nest over the
//! tile and intra-tile dimensions, the outermost loop marked parallel,
//! with the leaf binding `i` and `j` back to expressions over the loop
//! iterators.

pub mod codegen;
pub mod ir;
pub mod polyhedral;
pub mod text;
pub mod utils;

pub use codegen::{ast_to_string, AstNode};
pub use ir::{Program, Statement, ValueHandle};
pub use utils::errors::{PolyResult, PolyschedError};

use anyhow::Context as _;

/// Generate the loop AST for a program.
///
/// Thin wrapper over [`codegen::generate_ast`] that attaches the
/// program name to failures.
pub fn generate_ast(program: &mut Program) -> anyhow::Result<Vec<AstNode>> {
    let name = program.name().to_string();
    codegen::generate_ast(program)
        .with_context(|| format!("generating the loop AST for program `{}`", name))
}

/// Commonly used types and functions.
pub mod prelude {
    pub use crate::codegen::{ast_to_string, AccessIndex, AstBinOp, AstExpr, AstNode};
    pub use crate::generate_ast;
    pub use crate::ir::{DimTag, Invariant, Program, Statement, ValueHandle};
    pub use crate::polyhedral::{Context, ContextId, Map, Set, UnionMap, UnionSet};
    pub use crate::utils::errors::{PolyResult, PolyschedError};
}
