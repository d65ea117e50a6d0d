//! Affine constraints and constraint systems.
//!
//! Every constraint is kept in the homogeneous forms `expr >= 0` or
//! `expr = 0`.  A system is a conjunction; insertion order is preserved
//! because it is observable through textual round-trips.

use serde::{Deserialize, Serialize};

use super::expr::AffineExpr;

/// The kind of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// `expr >= 0`
    Inequality,
    /// `expr = 0`
    Equality,
}

/// A single affine constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    pub expr: AffineExpr,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self {
            expr,
            kind: ConstraintKind::Inequality,
        }
    }

    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self {
            expr,
            kind: ConstraintKind::Equality,
        }
    }

    pub fn is_satisfied(&self, dims: &[i64], params: &[i64]) -> bool {
        let v = self.expr.evaluate(dims, params);
        match self.kind {
            ConstraintKind::Inequality => v >= 0,
            ConstraintKind::Equality => v == 0,
        }
    }

    /// The negation of an inequality over the integers:
    /// `not (e >= 0)` is `-e - 1 >= 0`.
    pub fn negated(&self) -> Constraint {
        debug_assert_eq!(self.kind, ConstraintKind::Inequality);
        let mut expr = self.expr.neg();
        expr.constant -= 1;
        Constraint::ge_zero(expr)
    }

    /// True when the constraint mentions no dimension and no parameter.
    pub fn is_constant(&self) -> bool {
        self.expr.is_constant()
    }

    /// A constant constraint that cannot hold.
    pub fn is_contradiction(&self) -> bool {
        match (self.kind, self.expr.as_constant()) {
            (ConstraintKind::Inequality, Some(c)) => c < 0,
            (ConstraintKind::Equality, Some(c)) => c != 0,
            _ => false,
        }
    }

    /// A constant constraint that always holds.
    pub fn is_tautology(&self) -> bool {
        match (self.kind, self.expr.as_constant()) {
            (ConstraintKind::Inequality, Some(c)) => c >= 0,
            (ConstraintKind::Equality, Some(c)) => c == 0,
            _ => false,
        }
    }

    /// Divide by the gcd of the variable coefficients, rounding the
    /// constant of an inequality towards minus infinity.  This is the
    /// integer tightening step: `g*x + k >= 0` holds over the integers
    /// iff `x + floor(k/g) >= 0` does.  An equality whose constant is
    /// not divisible by the gcd has no integer solutions and collapses
    /// to a constant contradiction.
    pub fn tightened(&self) -> Constraint {
        let g = self.expr.content();
        if g <= 1 {
            return self.clone();
        }
        match self.kind {
            ConstraintKind::Inequality => {
                Constraint::ge_zero(AffineExpr {
                    constant: self.expr.constant.div_euclid(g),
                    coeffs: self.expr.coeffs.iter().map(|c| c / g).collect(),
                    param_coeffs: self.expr.param_coeffs.iter().map(|c| c / g).collect(),
                })
            }
            ConstraintKind::Equality => {
                if self.expr.constant % g != 0 {
                    let n_dim = self.expr.n_dim();
                    let n_param = self.expr.n_param();
                    return Constraint::ge_zero(AffineExpr::constant(-1, n_dim, n_param));
                }
                Constraint::eq_zero(AffineExpr {
                    constant: self.expr.constant / g,
                    coeffs: self.expr.coeffs.iter().map(|c| c / g).collect(),
                    param_coeffs: self.expr.param_coeffs.iter().map(|c| c / g).collect(),
                })
            }
        }
    }

    /// Canonical sign for equalities: first nonzero coefficient positive.
    fn sign_normalized(&self) -> Constraint {
        if self.kind != ConstraintKind::Equality {
            return self.clone();
        }
        let first = self
            .expr
            .coeffs
            .iter()
            .chain(self.expr.param_coeffs.iter())
            .find(|&&c| c != 0);
        match first {
            Some(&c) if c < 0 => Constraint::eq_zero(self.expr.neg()),
            _ => self.clone(),
        }
    }

    /// Render as `expr >= 0` or `expr = 0` under the given names.
    pub fn display_with(&self, dim_names: &[String], param_names: &[String]) -> String {
        let op = match self.kind {
            ConstraintKind::Inequality => ">=",
            ConstraintKind::Equality => "=",
        };
        format!("{} {} 0", self.expr.display_with(dim_names, param_names), op)
    }
}

/// A conjunction of constraints over a fixed number of dimensions and
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    n_dim: usize,
    n_param: usize,
    constraints: Vec<Constraint>,
}

impl ConstraintSystem {
    pub fn new(n_dim: usize, n_param: usize) -> Self {
        Self {
            n_dim,
            n_param,
            constraints: Vec::new(),
        }
    }

    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    pub fn n_param(&self) -> usize {
        self.n_param
    }

    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.expr.n_dim(), self.n_dim);
        assert_eq!(constraint.expr.n_param(), self.n_param);
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn remove(&mut self, index: usize) -> Constraint {
        self.constraints.remove(index)
    }

    pub fn is_satisfied(&self, dims: &[i64], params: &[i64]) -> bool {
        self.constraints
            .iter()
            .all(|c| c.is_satisfied(dims, params))
    }

    /// Append all constraints of `other` (same shape required).
    pub fn merge(&mut self, other: &ConstraintSystem) {
        assert_eq!(self.n_dim, other.n_dim);
        assert_eq!(self.n_param, other.n_param);
        for c in &other.constraints {
            self.constraints.push(c.clone());
        }
    }

    /// Insert `count` fresh dimensions at variable index `at`; existing
    /// constraints get zero coefficients there.
    pub fn insert_dims(&mut self, at: usize, count: usize) {
        assert!(at <= self.n_dim);
        self.n_dim += count;
        for c in &mut self.constraints {
            c.expr.insert_dims(at, count);
        }
    }

    /// Remap parameter coefficients into a wider parameter list.
    pub fn remap_params(&mut self, remap: &[usize], new_n_param: usize) {
        self.n_param = new_n_param;
        for c in &mut self.constraints {
            c.expr.remap_params(remap, new_n_param);
        }
    }

    /// Simplify in place: gcd-tighten every constraint, canonicalize
    /// equality signs, drop tautologies, drop duplicates.  Contradictions
    /// are kept so emptiness stays observable.
    pub fn coalesce(&mut self) {
        let mut out: Vec<Constraint> = Vec::with_capacity(self.constraints.len());
        for c in &self.constraints {
            let c = c.tightened().sign_normalized();
            if c.is_tautology() {
                continue;
            }
            if !out.contains(&c) {
                out.push(c);
            }
        }
        self.constraints = out;
    }

    /// True when some constant constraint cannot hold.
    pub fn has_contradiction(&self) -> bool {
        self.constraints.iter().any(|c| c.is_contradiction())
    }
}
