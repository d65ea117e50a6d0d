//! Affine relations between named tuples.
//!
//! A map relates an input tuple to an output tuple under affine
//! constraints, e.g. `[N] -> { S[i, j] -> [c0, j] : i = 2*c0 and ... }`.
//! Output dimensions follow the isl naming convention: a range entry
//! that is a bound identifier or an expression becomes an anonymous
//! output dimension pinned by an equality, while an unbound identifier
//! becomes a named output dimension.  Printing inverts this: anonymous
//! outputs print as the expression their defining equality solves them
//! to, which is what the textual transformation pipeline relies on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::MapParser;
use crate::utils::errors::PolyResult;

use super::constraint::{Constraint, ConstraintKind, ConstraintSystem};
use super::context::ContextId;
use super::expr::AffineExpr;
use super::parse::{self, VarEnv};
use super::project;
use super::set::Set;
use super::space::{merge_param_names, Space};

/// An affine relation in some context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    ctx: ContextId,
    space: Space,
    system: ConstraintSystem,
}

impl Map {
    /// The identity relation on a set's tuple shape (unconstrained by
    /// the set's own constraints).  All output dimensions are anonymous.
    pub fn identity(set: &Set) -> Map {
        let n = set.n_dim();
        let space = Space::map_space(
            set.name(),
            set.dims().to_vec(),
            None,
            vec![String::new(); n],
            set.space().params().to_vec(),
        );
        let mut system = ConstraintSystem::new(2 * n, space.n_param());
        for i in 0..n {
            let mut e = AffineExpr::zero(2 * n, space.n_param());
            e.coeffs[n + i] = 1;
            e.coeffs[i] = -1;
            system.add(Constraint::eq_zero(e));
        }
        Map {
            ctx: set.ctx(),
            space,
            system,
        }
    }

    /// Read a map from its textual form.
    pub fn read_from_str(ctx: ContextId, src: &str) -> PolyResult<Map> {
        Map::from_pieces(ctx, &MapParser::parse(src)?)
    }

    /// Build a map from its structured pieces (tuple names, ordered
    /// range entries, constraint strings).  This is the one place where
    /// affine text is interpreted; transformations edit pieces, never
    /// printed maps.
    pub fn from_pieces(ctx: ContextId, parser: &MapParser) -> PolyResult<Map> {
        let in_name = if parser.domain_name.is_empty() {
            None
        } else {
            Some(parser.domain_name.as_str())
        };
        let out_name = if parser.range_name.is_empty() {
            None
        } else {
            Some(parser.range_name.as_str())
        };
        let in_dims = parser.domain.dimensions.clone();
        let params = parser.parameters.clone();

        // Classify range entries: unbound identifiers become named
        // output dimensions, everything else anonymous plus an equality.
        let entries = parser.range.dimensions.clone();
        let mut out_dims: Vec<String> = Vec::with_capacity(entries.len());
        let mut pinned: Vec<Option<String>> = Vec::with_capacity(entries.len());
        for entry in &entries {
            let bound = params.iter().any(|p| p == entry)
                || in_dims.iter().any(|d| d == entry)
                || out_dims.iter().any(|d| d == entry);
            if parse::is_identifier(entry) && !bound {
                out_dims.push(entry.clone());
                pinned.push(None);
            } else {
                out_dims.push(String::new());
                pinned.push(Some(entry.clone()));
            }
        }

        let space = Space::map_space(in_name, in_dims, out_name, out_dims, params);
        let n_in = space.n_in();
        let n_dim = space.n_dim();
        let n_param = space.n_param();
        let mut system = ConstraintSystem::new(n_dim, n_param);

        // Equalities pinning anonymous outputs to their entry expression.
        // The expression may only mention inputs and parameters.
        let in_only: Vec<String> = {
            let mut v = space.in_dims().to_vec();
            v.extend(std::iter::repeat(String::new()).take(space.n_out()));
            v
        };
        let in_env = VarEnv {
            dims: &in_only,
            params: space.params(),
        };
        for (k, pin) in pinned.iter().enumerate() {
            if let Some(entry) = pin {
                let expr = parse::parse_expr(entry, &in_env)?;
                let mut e = expr.neg();
                e.coeffs[n_in + k] += 1;
                system.add(Constraint::eq_zero(e));
            }
        }

        // Explicit constraints see inputs, named outputs, and parameters.
        let dims = space.dim_names();
        let env = VarEnv {
            dims: &dims,
            params: space.params(),
        };
        let mut constraints = Vec::new();
        for c in parser.domain.constraints() {
            parse::parse_constraint(c, &env, &mut constraints)?;
        }
        for c in parser.range.constraints() {
            parse::parse_constraint(c, &env, &mut constraints)?;
        }
        for c in &parser.constraints {
            parse::parse_constraint(c, &env, &mut constraints)?;
        }
        for c in constraints {
            system.add(c);
        }
        Ok(Map { ctx, space, system })
    }

    pub fn ctx(&self) -> ContextId {
        self.ctx
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn system(&self) -> &ConstraintSystem {
        &self.system
    }

    pub fn n_in(&self) -> usize {
        self.space.n_in()
    }

    pub fn n_out(&self) -> usize {
        self.space.n_out()
    }

    pub fn n_param(&self) -> usize {
        self.space.n_param()
    }

    pub fn in_name(&self) -> Option<&str> {
        self.space.in_name()
    }

    pub fn out_name(&self) -> Option<&str> {
        self.space.out_name()
    }

    /// Rename (or anonymize) the range tuple.
    pub fn rename_range(mut self, name: Option<&str>) -> Map {
        self.space.set_out_name(name);
        self
    }

    /// Restrict the domain side to the given set.  The set's tuple must
    /// match the map's input tuple.
    pub fn intersect_domain(mut self, set: &Set) -> Map {
        assert_eq!(self.ctx, set.ctx(), "objects from different contexts");
        assert_eq!(
            self.in_name(),
            set.name(),
            "domain tuple mismatch in intersect_domain"
        );
        assert_eq!(self.n_in(), set.n_dim(), "domain arity mismatch");
        let (params, remap_m, remap_s) =
            merge_param_names(self.space.params(), set.space().params());
        self.system.remap_params(&remap_m, params.len());
        let n_dim = self.space.n_dim();
        for con in set.system().iter() {
            let mut coeffs = con.expr.coeffs.clone();
            coeffs.resize(n_dim, 0);
            let mut expr = AffineExpr {
                constant: con.expr.constant,
                coeffs,
                param_coeffs: con.expr.param_coeffs.clone(),
            };
            expr.remap_params(&remap_s, params.len());
            self.system.add(Constraint {
                expr,
                kind: con.kind,
            });
        }
        self.space.set_params(params);
        self
    }

    /// Image of `set` under this map.  The set's tuple must match the
    /// map's input tuple; the result lives in the range space.
    pub fn apply(&self, set: &Set) -> Set {
        assert_eq!(self.ctx, set.ctx(), "objects from different contexts");
        assert_eq!(self.in_name(), set.name(), "tuple mismatch in apply");
        assert_eq!(self.n_in(), set.n_dim(), "arity mismatch in apply");
        let (params, remap_m, remap_s) =
            merge_param_names(self.space.params(), set.space().params());
        let n_in = self.n_in();
        let n_dim = self.space.n_dim();
        let mut combined = self.system.clone();
        combined.remap_params(&remap_m, params.len());
        for con in set.system().iter() {
            let mut coeffs = con.expr.coeffs.clone();
            coeffs.resize(n_dim, 0);
            let mut expr = AffineExpr {
                constant: con.expr.constant,
                coeffs,
                param_coeffs: con.expr.param_coeffs.clone(),
            };
            expr.remap_params(&remap_s, params.len());
            combined.add(Constraint {
                expr,
                kind: con.kind,
            });
        }
        let ins: Vec<usize> = (0..n_in).collect();
        let projected = project::eliminate_dims(&combined, &ins);
        let system = project::drop_dims(&projected, &ins);
        let mut range = self.space.range_space();
        range.set_params(params);
        Set::from_parts(self.ctx, range, system).coalesce()
    }

    /// Membership test for a concrete input/output pair.
    pub fn contains_pair(&self, ins: &[i64], outs: &[i64], params: &[i64]) -> bool {
        assert_eq!(ins.len(), self.n_in());
        assert_eq!(outs.len(), self.n_out());
        assert_eq!(params.len(), self.n_param());
        let mut point = ins.to_vec();
        point.extend_from_slice(outs);
        self.system.is_satisfied(&point, params)
    }

    /// Simplify the constraint list.
    pub fn coalesce(mut self) -> Map {
        self.system.coalesce();
        self
    }

    /// Append `count` anonymous output dimensions pinned to zero.
    /// Schedule alignment pads with these.
    pub fn append_zero_out_dims(&mut self, count: usize) {
        let at = self.n_out();
        for _ in 0..count {
            self.insert_constant_out_dim(at, 0);
        }
    }

    /// Insert one anonymous output dimension at output position `pos`,
    /// pinned to the constant `value`.
    pub fn insert_constant_out_dim(&mut self, pos: usize, value: i64) {
        assert!(pos <= self.n_out());
        let at = self.n_in() + pos;
        self.space.insert_out_dims(pos, 1);
        self.system.insert_dims(at, 1);
        let mut e = AffineExpr::zero(self.space.n_dim(), self.space.n_param());
        e.coeffs[at] = 1;
        e.constant = -value;
        self.system.add(Constraint::eq_zero(e));
    }

    /// The constant an output dimension is pinned to, if some equality
    /// pins it without involving any other dimension or parameter.
    pub fn constant_at_out_dim(&self, pos: usize) -> Option<i64> {
        let v = self.space.out_var(pos);
        for con in self.system.iter() {
            if con.kind != ConstraintKind::Equality {
                continue;
            }
            let c = con.expr.coeffs[v];
            if c == 0 || !con.expr.is_single_dim(v) {
                continue;
            }
            if con.expr.param_coeffs.iter().any(|&p| p != 0) {
                continue;
            }
            if con.expr.constant % c == 0 {
                return Some(-con.expr.constant / c);
            }
        }
        None
    }

    /// Re-pin an output dimension to a new constant.  The dimension must
    /// currently be pinned to a constant.
    pub fn set_constant_at_out_dim(&mut self, pos: usize, value: i64) {
        let v = self.space.out_var(pos);
        for i in 0..self.system.len() {
            let con = &self.system.constraints()[i];
            if con.kind == ConstraintKind::Equality
                && con.expr.coeffs[v] != 0
                && con.expr.is_single_dim(v)
                && con.expr.param_coeffs.iter().all(|&p| p == 0)
            {
                let mut e = AffineExpr::zero(self.space.n_dim(), self.space.n_param());
                e.coeffs[v] = 1;
                e.constant = -value;
                self.system.remove(i);
                self.system.add(Constraint::eq_zero(e));
                return;
            }
        }
        panic!("output dimension {} is not pinned to a constant", pos);
    }

    /// Decompose into structured pieces: parameter names, tuple names,
    /// one range entry per output dimension (the dimension name, or the
    /// expression its defining equality solves it to), and the remaining
    /// constraints as canonical strings.  Transformations edit these
    /// pieces in memory and rebuild through [`Map::from_pieces`];
    /// serializing the pieces yields the printed form of the map.
    pub fn to_pieces(&self) -> MapParser {
        let in_names = self.space.in_dims().to_vec();

        // Fallback names keep anonymous outputs printable inside leftover
        // constraints; the usual case solves them away entirely.
        let fallback: Vec<String> = (0..self.n_out()).map(|k| format!("o{}", k)).collect();
        let mut dim_names: Vec<String> = in_names.clone();
        for (k, d) in self.space.out_dims().iter().enumerate() {
            dim_names.push(if d.is_empty() {
                fallback[k].clone()
            } else {
                d.clone()
            });
        }

        let mut consumed = vec![false; self.system.len()];
        let mut entries: Vec<String> = Vec::with_capacity(self.n_out());
        for (k, d) in self.space.out_dims().iter().enumerate() {
            if !d.is_empty() {
                entries.push(d.clone());
                continue;
            }
            match self.solve_out_dim(k) {
                Some((i, expr)) => {
                    consumed[i] = true;
                    entries.push(expr.display_with(&dim_names, self.space.params()));
                }
                None => entries.push(fallback[k].clone()),
            }
        }

        let constraints: Vec<String> = self
            .system
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed[*i])
            .map(|(_, c)| c.display_with(&dim_names, self.space.params()))
            .collect();

        MapParser {
            parameters: self.space.params().to_vec(),
            domain_name: self.in_name().unwrap_or("").to_string(),
            range_name: self.out_name().unwrap_or("").to_string(),
            domain: crate::text::SpaceParser::from_dimensions(in_names),
            range: crate::text::SpaceParser::from_dimensions(entries),
            constraints,
        }
    }

    /// Solve an anonymous output dimension to the expression over inputs
    /// and parameters its defining equality gives it.  Returns the index
    /// of the consumed constraint and the solved expression.
    fn solve_out_dim(&self, k: usize) -> Option<(usize, AffineExpr)> {
        let v = self.space.out_var(k);
        let n_in = self.n_in();
        for (i, con) in self.system.iter().enumerate() {
            if con.kind != ConstraintKind::Equality {
                continue;
            }
            let c = con.expr.coeffs[v];
            if c != 1 && c != -1 {
                continue;
            }
            let other_out = (n_in..self.space.n_dim())
                .filter(|&w| w != v)
                .any(|w| con.expr.coeffs[w] != 0);
            if other_out {
                continue;
            }
            let mut rest = con.expr.clone();
            rest.coeffs[v] = 0;
            return Some((i, rest.scale(-c)));
        }
        None
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pieces().get_str())
    }
}
