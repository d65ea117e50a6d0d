//! Variable elimination.
//!
//! Projection works in two steps per variable: if some equality gives
//! the variable a unit coefficient, substitute it away (exact); otherwise
//! fall back to Fourier-Motzkin pairing with gcd tightening of every
//! derived inequality.  Unit-coefficient equalities cover every schedule
//! this crate produces, so projection is exact where it matters and an
//! integer over-approximation elsewhere.

use super::constraint::{Constraint, ConstraintKind, ConstraintSystem};
use super::expr::AffineExpr;

/// Eliminate the given variables.  The result keeps the original
/// variable layout; eliminated variables simply no longer appear in any
/// constraint.
pub(crate) fn eliminate_dims(sys: &ConstraintSystem, dims: &[usize]) -> ConstraintSystem {
    let mut current = sys.clone();
    for &v in dims {
        current = eliminate_one(&current, v);
        current.coalesce();
    }
    current
}

fn eliminate_one(sys: &ConstraintSystem, v: usize) -> ConstraintSystem {
    // Prefer exact substitution through a unit-coefficient equality.
    let unit_eq = sys.iter().position(|c| {
        c.kind == ConstraintKind::Equality && (c.expr.coeffs[v] == 1 || c.expr.coeffs[v] == -1)
    });
    if let Some(idx) = unit_eq {
        let eq = sys.constraints()[idx].clone();
        let c = eq.expr.coeffs[v];
        // c*v + rest = 0  =>  v = -c*rest  (c is +-1)
        let mut rest = eq.expr.clone();
        rest.coeffs[v] = 0;
        let replacement = rest.scale(-c);
        let mut out = ConstraintSystem::new(sys.n_dim(), sys.n_param());
        for (i, con) in sys.iter().enumerate() {
            if i == idx {
                continue;
            }
            out.add(Constraint {
                expr: con.expr.substitute_dim(v, &replacement),
                kind: con.kind,
            });
        }
        return out;
    }

    // Fourier-Motzkin.  Non-unit equalities contribute to both sides.
    let mut zeros: Vec<Constraint> = Vec::new();
    let mut lowers: Vec<AffineExpr> = Vec::new();
    let mut uppers: Vec<AffineExpr> = Vec::new();
    for con in sys.iter() {
        let coeff = con.expr.coeffs[v];
        if coeff == 0 {
            zeros.push(con.clone());
            continue;
        }
        match con.kind {
            ConstraintKind::Inequality => {
                if coeff > 0 {
                    lowers.push(con.expr.clone());
                } else {
                    uppers.push(con.expr.clone());
                }
            }
            ConstraintKind::Equality => {
                let (lo, up) = if coeff > 0 {
                    (con.expr.clone(), con.expr.neg())
                } else {
                    (con.expr.neg(), con.expr.clone())
                };
                lowers.push(lo);
                uppers.push(up);
            }
        }
    }

    let mut out = ConstraintSystem::new(sys.n_dim(), sys.n_param());
    for z in zeros {
        out.add(z);
    }
    // A side without bounds leaves the variable unconstrained; every
    // constraint involving it is then vacuous after projection.
    if lowers.is_empty() || uppers.is_empty() {
        return out;
    }
    for lo in &lowers {
        for up in &uppers {
            let a = lo.coeffs[v];
            let b = -up.coeffs[v];
            debug_assert!(a > 0 && b > 0);
            let combined = lo.scale(b).add(&up.scale(a));
            debug_assert_eq!(combined.coeffs[v], 0);
            out.add(Constraint::ge_zero(combined).tightened());
        }
    }
    out
}

/// Drop the given variables from the layout, reindexing the rest.  The
/// variables must already be eliminated.
pub(crate) fn drop_dims(sys: &ConstraintSystem, dims: &[usize]) -> ConstraintSystem {
    let keep: Vec<usize> = (0..sys.n_dim()).filter(|i| !dims.contains(i)).collect();
    let mut out = ConstraintSystem::new(keep.len(), sys.n_param());
    for con in sys.iter() {
        debug_assert!(dims.iter().all(|&d| con.expr.coeffs[d] == 0));
        let expr = AffineExpr {
            constant: con.expr.constant,
            coeffs: keep.iter().map(|&i| con.expr.coeffs[i]).collect(),
            param_coeffs: con.expr.param_coeffs.clone(),
        };
        out.add(Constraint {
            expr,
            kind: con.kind,
        });
    }
    out
}

/// Conservative emptiness test: treat parameters as unknowns, eliminate
/// everything, and look for a constant contradiction.  `true` means the
/// system is provably empty for every parameter valuation; `false` means
/// nothing.
pub(crate) fn is_certainly_empty(sys: &ConstraintSystem) -> bool {
    if sys.has_contradiction() {
        return true;
    }
    let n_dim = sys.n_dim();
    let n_param = sys.n_param();
    // Widen parameters into trailing dimensions so they get eliminated too.
    let mut widened = ConstraintSystem::new(n_dim + n_param, 0);
    for con in sys.iter() {
        let mut coeffs = con.expr.coeffs.clone();
        coeffs.extend(con.expr.param_coeffs.iter().copied());
        widened.add(Constraint {
            expr: AffineExpr {
                constant: con.expr.constant,
                coeffs,
                param_coeffs: Vec::new(),
            },
            kind: con.kind,
        });
    }
    let all: Vec<usize> = (0..n_dim + n_param).collect();
    let projected = eliminate_dims(&widened, &all);
    projected.has_contradiction()
}

/// True when `candidate` adds nothing to `rest`: its negation together
/// with `rest` is provably empty.
pub(crate) fn is_redundant(rest: &ConstraintSystem, candidate: &Constraint) -> bool {
    if candidate.kind != ConstraintKind::Inequality {
        return false;
    }
    let mut test = rest.clone();
    test.add(candidate.negated());
    is_certainly_empty(&test)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ge(coeffs: Vec<i64>, constant: i64, n_param: usize) -> Constraint {
        Constraint::ge_zero(AffineExpr {
            constant,
            param_coeffs: vec![0; n_param],
            coeffs,
        })
    }

    fn eq(coeffs: Vec<i64>, constant: i64, n_param: usize) -> Constraint {
        Constraint::eq_zero(AffineExpr {
            constant,
            param_coeffs: vec![0; n_param],
            coeffs,
        })
    }

    #[test]
    fn test_substitution_is_exact() {
        // dims (i, c0, c1): i = 4*c0 + c1, 0 <= i <= 9
        let mut sys = ConstraintSystem::new(3, 0);
        sys.add(eq(vec![1, -4, -1], 0, 0));
        sys.add(ge(vec![1, 0, 0], 0, 0));
        sys.add(ge(vec![-1, 0, 0], 9, 0));
        let out = eliminate_dims(&sys, &[0]);
        // 4*c0 + c1 >= 0 and 9 - 4*c0 - c1 >= 0
        assert!(out.iter().all(|c| c.expr.coeffs[0] == 0));
        assert!(out.is_satisfied(&[0, 2, 1], &[]));
        assert!(!out.is_satisfied(&[0, 2, 2], &[]));
    }

    #[test]
    fn test_fourier_motzkin_tightens() {
        // dims (c0, c1): 9 - 2*c0 - c1 >= 0, c1 >= 0; eliminating c1
        // yields 9 - 2*c0 >= 0, tightened to 4 - c0 >= 0.
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(ge(vec![-2, -1], 9, 0));
        sys.add(ge(vec![0, 1], 0, 0));
        let out = eliminate_dims(&sys, &[1]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.constraints()[0].expr.coeffs, vec![-1, 0]);
        assert_eq!(out.constraints()[0].expr.constant, 4);
    }

    #[test]
    fn test_drop_dims_reindexes() {
        let mut sys = ConstraintSystem::new(3, 0);
        sys.add(ge(vec![1, 0, -2], 5, 0));
        let out = drop_dims(&sys, &[1]);
        assert_eq!(out.n_dim(), 2);
        assert_eq!(out.constraints()[0].expr.coeffs, vec![1, -2]);
    }

    #[test]
    fn test_certainly_empty() {
        // x >= 5 and x <= 4
        let mut sys = ConstraintSystem::new(1, 0);
        sys.add(ge(vec![1], -5, 0));
        sys.add(ge(vec![-1], 4, 0));
        assert!(is_certainly_empty(&sys));
    }

    #[test]
    fn test_not_empty() {
        let mut sys = ConstraintSystem::new(1, 0);
        sys.add(ge(vec![1], 0, 0));
        sys.add(ge(vec![-1], 9, 0));
        assert!(!is_certainly_empty(&sys));
    }

    #[test]
    fn test_empty_under_parameters() {
        // 0 <= x < N and N <= 0
        let mut sys = ConstraintSystem::new(1, 1);
        sys.add(Constraint::ge_zero(AffineExpr {
            constant: 0,
            coeffs: vec![1],
            param_coeffs: vec![0],
        }));
        sys.add(Constraint::ge_zero(AffineExpr {
            constant: -1,
            coeffs: vec![-1],
            param_coeffs: vec![1],
        }));
        sys.add(Constraint::ge_zero(AffineExpr {
            constant: 0,
            coeffs: vec![0],
            param_coeffs: vec![-1],
        }));
        assert!(is_certainly_empty(&sys));
    }

    #[test]
    fn test_redundant_bound_detected() {
        // 2*c0 + c1 <= 9 is implied by c0 <= 4 and c1 <= 1.
        let mut rest = ConstraintSystem::new(2, 0);
        rest.add(ge(vec![1, 0], 0, 0)); // c0 >= 0
        rest.add(ge(vec![-1, 0], 4, 0)); // c0 <= 4
        rest.add(ge(vec![0, 1], 0, 0)); // c1 >= 0
        rest.add(ge(vec![0, -1], 1, 0)); // c1 <= 1
        let candidate = ge(vec![-2, -1], 9, 0); // 2*c0 + c1 <= 9
        assert!(is_redundant(&rest, &candidate));
        let tight = ge(vec![0, -1], 1, 0); // c1 <= 1 is not implied by the others
        let mut rest2 = ConstraintSystem::new(2, 0);
        rest2.add(ge(vec![1, 0], 0, 0));
        rest2.add(ge(vec![-1, 0], 4, 0));
        rest2.add(ge(vec![0, 1], 0, 0));
        rest2.add(ge(vec![-2, -1], 9, 0));
        assert!(!is_redundant(&rest2, &tight));
    }
}
