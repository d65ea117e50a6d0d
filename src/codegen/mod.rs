//! Loop AST generation from scheduled programs.
//!
//! The AST is a plain tree of loops, guards, and statement leaves, in
//! execution order.  Expressions use `floord`/`ceild` for the non-unit
//! strides tiling introduces.

pub mod ast_builder;

pub use ast_builder::{generate_ast, AstBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::ValueHandle;

/// Binary operators appearing in generated expressions and guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AstBinOp {
    Add,
    Sub,
    Mul,
    /// `<=`, used in guards
    Le,
    /// `>=`, used in guards
    Ge,
    /// `=`, used in guards
    Eq,
    /// Guard conjunction
    And,
}

/// An expression in the generated AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AstExpr {
    Int(i64),
    Var(String),
    Binary {
        op: AstBinOp,
        lhs: Box<AstExpr>,
        rhs: Box<AstExpr>,
    },
    Min(Box<AstExpr>, Box<AstExpr>),
    Max(Box<AstExpr>, Box<AstExpr>),
    /// `floord(lhs, rhs)`: division rounding towards minus infinity
    FloorDiv(Box<AstExpr>, Box<AstExpr>),
    /// `ceild(lhs, rhs)`: division rounding towards plus infinity
    CeilDiv(Box<AstExpr>, Box<AstExpr>),
}

fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

fn ceil_div(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}

impl AstExpr {
    pub fn binary(op: AstBinOp, lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        AstExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) => AstExpr::Int(a + b),
            (AstExpr::Int(0), _) => rhs,
            (_, AstExpr::Int(0)) => lhs,
            _ => AstExpr::binary(AstBinOp::Add, lhs, rhs),
        }
    }

    pub fn sub(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) => AstExpr::Int(a - b),
            (_, AstExpr::Int(0)) => lhs,
            _ => AstExpr::binary(AstBinOp::Sub, lhs, rhs),
        }
    }

    pub fn mul(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) => AstExpr::Int(a * b),
            (AstExpr::Int(1), _) => rhs,
            (_, AstExpr::Int(1)) => lhs,
            _ => AstExpr::binary(AstBinOp::Mul, lhs, rhs),
        }
    }

    pub fn min(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) => AstExpr::Int(*a.min(b)),
            _ if lhs == rhs => lhs,
            _ => AstExpr::Min(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn max(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) => AstExpr::Int(*a.max(b)),
            _ if lhs == rhs => lhs,
            _ => AstExpr::Max(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn floord(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) if *b != 0 => AstExpr::Int(floor_div(*a, *b)),
            (_, AstExpr::Int(1)) => lhs,
            _ => AstExpr::FloorDiv(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn ceild(lhs: AstExpr, rhs: AstExpr) -> AstExpr {
        match (&lhs, &rhs) {
            (AstExpr::Int(a), AstExpr::Int(b)) if *b != 0 => AstExpr::Int(ceil_div(*a, *b)),
            (_, AstExpr::Int(1)) => lhs,
            _ => AstExpr::CeilDiv(Box::new(lhs), Box::new(rhs)),
        }
    }
}

impl fmt::Display for AstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstExpr::Int(v) => write!(f, "{}", v),
            AstExpr::Var(name) => write!(f, "{}", name),
            AstExpr::Binary { op, lhs, rhs } => {
                let op = match op {
                    AstBinOp::Add => "+",
                    AstBinOp::Sub => "-",
                    AstBinOp::Mul => "*",
                    AstBinOp::Le => "<=",
                    AstBinOp::Ge => ">=",
                    AstBinOp::Eq => "==",
                    AstBinOp::And => "&&",
                };
                write!(f, "({} {} {})", lhs, op, rhs)
            }
            AstExpr::Min(a, b) => write!(f, "min({}, {})", a, b),
            AstExpr::Max(a, b) => write!(f, "max({}, {})", a, b),
            AstExpr::FloorDiv(a, b) => write!(f, "floord({}, {})", a, b),
            AstExpr::CeilDiv(a, b) => write!(f, "ceild({}, {})", a, b),
        }
    }
}

/// One storage access at a leaf: `buffer[indices...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIndex {
    pub buffer: String,
    pub indices: Vec<AstExpr>,
}

/// A node of the generated loop AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AstNode {
    /// A loop over `lower..=upper` (upper bound inclusive), step 1.
    For {
        iterator: String,
        lower: AstExpr,
        upper: AstExpr,
        body: Vec<AstNode>,
        is_parallel: bool,
        is_vector: bool,
    },
    /// A guard around part of a shared loop body.
    If {
        condition: AstExpr,
        body: Vec<AstNode>,
    },
    /// A statement instance: the payload plus one binding per original
    /// domain dimension, solved from the schedule.
    Stmt {
        name: String,
        payload: ValueHandle,
        bindings: Vec<(String, AstExpr)>,
        access: Option<AccessIndex>,
    },
}

/// Render an AST for debugging and tests.
pub fn ast_to_string(nodes: &[AstNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render(node, 0, &mut out);
    }
    out
}

fn render(node: &AstNode, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match node {
        AstNode::For {
            iterator,
            lower,
            upper,
            body,
            is_parallel,
            is_vector,
        } => {
            let kind = if *is_parallel {
                "parallel for"
            } else if *is_vector {
                "vector for"
            } else {
                "for"
            };
            out.push_str(&format!(
                "{}{} {} in {}..={} {{\n",
                pad, kind, iterator, lower, upper
            ));
            for n in body {
                render(n, depth + 1, out);
            }
            out.push_str(&format!("{}}}\n", pad));
        }
        AstNode::If { condition, body } => {
            out.push_str(&format!("{}if {} {{\n", pad, condition));
            for n in body {
                render(n, depth + 1, out);
            }
            out.push_str(&format!("{}}}\n", pad));
        }
        AstNode::Stmt {
            name,
            bindings,
            access,
            ..
        } => {
            let args: Vec<String> = bindings
                .iter()
                .map(|(n, e)| format!("{} = {}", n, e))
                .collect();
            out.push_str(&format!("{}{}({})", pad, name, args.join(", ")));
            if let Some(a) = access {
                let idx: Vec<String> = a.indices.iter().map(|e| e.to_string()).collect();
                out.push_str(&format!(" -> {}[{}]", a.buffer, idx.join(", ")));
            }
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding() {
        assert_eq!(
            AstExpr::add(AstExpr::Int(2), AstExpr::Int(3)),
            AstExpr::Int(5)
        );
        assert_eq!(
            AstExpr::min(AstExpr::Int(2), AstExpr::Int(3)),
            AstExpr::Int(2)
        );
        assert_eq!(
            AstExpr::floord(AstExpr::Int(-9), AstExpr::Int(2)),
            AstExpr::Int(-5)
        );
        assert_eq!(
            AstExpr::ceild(AstExpr::Int(9), AstExpr::Int(2)),
            AstExpr::Int(5)
        );
    }

    #[test]
    fn test_identity_folding() {
        let v = AstExpr::Var("c0".into());
        assert_eq!(AstExpr::add(v.clone(), AstExpr::Int(0)), v);
        assert_eq!(AstExpr::mul(AstExpr::Int(1), v.clone()), v);
        assert_eq!(AstExpr::min(v.clone(), v.clone()), v);
    }

    #[test]
    fn test_display() {
        let e = AstExpr::add(
            AstExpr::mul(AstExpr::Int(2), AstExpr::Var("c0".into())),
            AstExpr::Var("c1".into()),
        );
        assert_eq!(e.to_string(), "((2 * c0) + c1)");
    }
}
