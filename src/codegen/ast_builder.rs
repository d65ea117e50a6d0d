//! Recursive loop-AST generation.
//!
//! Generation walks the aligned time-processor dimensions outermost
//! first.  At each level every live statement's domain is projected onto
//! the dimensions up to that level.  A level where every statement sits
//! at a static integer constant becomes sibling subtrees ordered by
//! constant (this is how `after` ordering is realized); any other level
//! becomes one loop shared by all statements live there, with merged
//! min/max bounds and per-statement guards where bounds differ.  Leaves
//! bind each original domain dimension to its expression over the loop
//! iterators, solved from the schedule.

use std::collections::BTreeMap;

use log::debug;

use crate::ir::Program;
use crate::polyhedral::constraint::{Constraint, ConstraintKind, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::project;
use crate::polyhedral::Map;
use crate::utils::errors::{CodegenError, CodegenErrorKind, PolyResult};

use super::{AccessIndex, AstBinOp, AstExpr, AstNode};

/// Generate the loop AST for a program.
pub fn generate_ast(program: &mut Program) -> PolyResult<Vec<AstNode>> {
    AstBuilder::new().build(program)
}

/// Builds the loop AST from aligned time-processor domains.
pub struct AstBuilder;

/// Per-statement snapshot generation works from.
struct StmtInfo {
    name: String,
    payload: crate::ir::ValueHandle,
    params: Vec<String>,
    schedule: Map,
    access: Option<Map>,
    domain_dims: Vec<String>,
    /// `(parallel, vector)` per level; padding levels are never tagged.
    tags: Vec<(bool, bool)>,
}

/// A statement still live at the current level, with the constraints
/// accumulated from enclosing levels.
struct Active {
    idx: usize,
    system: ConstraintSystem,
}

/// One statement's realization of the current loop level.
struct LevelBounds {
    lower: AstExpr,
    upper: AstExpr,
    /// Constraints to push into the subtree context.
    context: Vec<Constraint>,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        AstBuilder
    }

    pub fn build(&self, program: &mut Program) -> PolyResult<Vec<AstNode>> {
        program.align_schedules();
        program.gen_time_processor_domain();
        let n_levels = program.get_max_schedules_range_dim();

        let mut infos = Vec::new();
        let mut active = Vec::new();
        for s in program.statements() {
            let tp = s
                .time_processor_domain()
                .expect("time-processor domains were just generated");
            let tags = (0..n_levels)
                .map(|level| {
                    let eligible = level < s.pre_alignment_range_dim();
                    (
                        eligible && program.should_parallelize(s.name(), level),
                        eligible && program.should_vectorize(s.name(), level),
                    )
                })
                .collect();
            active.push(Active {
                idx: infos.len(),
                system: tp.system().clone(),
            });
            infos.push(StmtInfo {
                name: s.name().to_string(),
                payload: s.payload(),
                params: tp.space().params().to_vec(),
                schedule: s.schedule().clone(),
                access: s.access().cloned(),
                domain_dims: s.domain().dims().to_vec(),
                tags,
            });
        }
        debug!("ast generation over {} levels", n_levels);
        self.build_level(&infos, active, 0, n_levels)
    }

    fn build_level(
        &self,
        infos: &[StmtInfo],
        active: Vec<Active>,
        level: usize,
        n_levels: usize,
    ) -> PolyResult<Vec<AstNode>> {
        if level == n_levels {
            let mut leaves = Vec::new();
            for a in &active {
                leaves.push(self.make_leaf(&infos[a.idx])?);
            }
            return Ok(leaves);
        }

        // Project each live statement onto dimensions 0..=level and
        // classify the level.
        let deeper: Vec<usize> = (level + 1..n_levels).collect();
        let mut projected: Vec<(Active, ConstraintSystem, Option<i64>)> = Vec::new();
        for a in active {
            let mut proj = project::eliminate_dims(&a.system, &deeper);
            proj.coalesce();
            if project::is_certainly_empty(&proj) {
                debug!("statement {} empty at level {}", infos[a.idx].name, level);
                continue;
            }
            let value = static_value(&proj, level);
            projected.push((a, proj, value));
        }
        if projected.is_empty() {
            return Ok(Vec::new());
        }

        if projected.iter().all(|(_, _, v)| v.is_some()) {
            // Pure ordering level: sibling subtrees sorted by constant.
            let mut groups: BTreeMap<i64, Vec<Active>> = BTreeMap::new();
            for (mut a, _, value) in projected {
                let value = value.expect("all static");
                let mut pin = AffineExpr::zero(a.system.n_dim(), a.system.n_param());
                pin.coeffs[level] = 1;
                pin.constant = -value;
                a.system.add(Constraint::eq_zero(pin));
                groups.entry(value).or_default().push(a);
            }
            let mut nodes = Vec::new();
            for (_, group) in groups {
                nodes.extend(self.build_level(infos, group, level + 1, n_levels)?);
            }
            return Ok(nodes);
        }

        // Loop level.  Statements pinned to a constant participate as
        // single-iteration members with an equality guard.
        let iterator = format!("c{}", level);
        let mut members: Vec<(Active, LevelBounds)> = Vec::new();
        for (a, proj, value) in projected {
            let bounds = match value {
                Some(v) => {
                    let mut pin = AffineExpr::zero(a.system.n_dim(), a.system.n_param());
                    pin.coeffs[level] = 1;
                    pin.constant = -v;
                    LevelBounds {
                        lower: AstExpr::Int(v),
                        upper: AstExpr::Int(v),
                        context: vec![Constraint::eq_zero(pin)],
                    }
                }
                None => self.extract_bounds(&infos[a.idx], &proj, level)?,
            };
            members.push((a, bounds));
        }

        let mut lower = members[0].1.lower.clone();
        let mut upper = members[0].1.upper.clone();
        for (_, b) in &members[1..] {
            lower = AstExpr::min(lower, b.lower.clone());
            upper = AstExpr::max(upper, b.upper.clone());
        }

        let mut is_parallel = false;
        let mut is_vector = false;
        for (a, _) in &members {
            let (p, v) = infos[a.idx].tags[level];
            is_parallel |= p;
            is_vector |= v;
        }

        // Statements whose own bounds are tighter than the merged loop
        // bounds get guards; statements sharing identical guards share a
        // subtree so deeper tie-breaking still sees them together.
        let var = AstExpr::Var(iterator.clone());
        let mut classes: Vec<(Vec<AstExpr>, Vec<Active>)> = Vec::new();
        for (mut a, b) in members {
            let mut guards: Vec<AstExpr> = Vec::new();
            if b.lower != lower {
                guards.push(AstExpr::binary(
                    AstBinOp::Ge,
                    var.clone(),
                    b.lower.clone(),
                ));
            }
            if b.upper != upper {
                guards.push(AstExpr::binary(
                    AstBinOp::Le,
                    var.clone(),
                    b.upper.clone(),
                ));
            }
            for c in b.context {
                a.system.add(c);
            }
            match classes.iter_mut().find(|(g, _)| *g == guards) {
                Some((_, group)) => group.push(a),
                None => classes.push((guards, vec![a])),
            }
        }

        let mut body = Vec::new();
        for (guards, group) in classes {
            let children = self.build_level(infos, group, level + 1, n_levels)?;
            if children.is_empty() {
                continue;
            }
            if guards.is_empty() {
                body.extend(children);
            } else {
                let condition = guards
                    .into_iter()
                    .reduce(|a, b| AstExpr::binary(AstBinOp::And, a, b))
                    .expect("non-empty guard list");
                body.push(AstNode::If {
                    condition,
                    body: children,
                });
            }
        }

        Ok(vec![AstNode::For {
            iterator,
            lower,
            upper,
            body,
            is_parallel,
            is_vector,
        }])
    }

    /// Loop bounds for one statement at `level`, from its projected
    /// system: redundant inequalities are pruned against the accumulated
    /// context, the rest become ceil/floor bound expressions.
    fn extract_bounds(
        &self,
        info: &StmtInfo,
        proj: &ConstraintSystem,
        level: usize,
    ) -> PolyResult<LevelBounds> {
        let pruned = prune_redundant(proj, level);
        let mut lowers: Vec<AstExpr> = Vec::new();
        let mut uppers: Vec<AstExpr> = Vec::new();
        let mut context: Vec<Constraint> = Vec::new();
        for con in pruned.iter() {
            let c = con.expr.coeffs[level];
            if c == 0 {
                continue;
            }
            context.push(con.clone());
            // c*v + rest {>=,=} 0
            let mut rest = con.expr.clone();
            rest.coeffs[level] = 0;
            let is_lower = c > 0 || con.kind == ConstraintKind::Equality;
            let is_upper = c < 0 || con.kind == ConstraintKind::Equality;
            let magnitude = c.abs();
            // |c|*v relates to numer: >= for a lower bound, <= for an
            // upper bound, = for an equality (then both apply).
            let numer = if c > 0 { rest.neg() } else { rest };
            if is_lower {
                let e = to_ast(&numer, &info.params);
                lowers.push(AstExpr::ceild(e, AstExpr::Int(magnitude)));
            }
            if is_upper {
                let e = to_ast(&numer, &info.params);
                uppers.push(AstExpr::floord(e, AstExpr::Int(magnitude)));
            }
        }
        if lowers.is_empty() || uppers.is_empty() {
            return Err(CodegenError::new(
                CodegenErrorKind::UnboundedLoop,
                format!(
                    "statement `{}` has no finite bound at level {}",
                    info.name, level
                ),
            )
            .into());
        }
        let lower = lowers
            .into_iter()
            .reduce(AstExpr::max)
            .expect("at least one lower bound");
        let upper = uppers
            .into_iter()
            .reduce(AstExpr::min)
            .expect("at least one upper bound");
        Ok(LevelBounds {
            lower,
            upper,
            context,
        })
    }

    /// Build a statement leaf: solve each domain dimension from the
    /// schedule, then each storage index from the access relation.
    fn make_leaf(&self, info: &StmtInfo) -> PolyResult<AstNode> {
        let schedule = &info.schedule;
        let n_in = schedule.n_in();
        let mut bindings: Vec<(String, AstExpr)> = Vec::new();
        let mut binding_exprs: Vec<AffineExpr> = Vec::new();
        for d in 0..n_in {
            let solved = solve_dim(schedule, d, 0, n_in).ok_or_else(|| {
                CodegenError::new(
                    CodegenErrorKind::BindingUnsolvable,
                    format!(
                        "no binding for dimension `{}` of statement `{}`",
                        info.domain_dims[d], info.name
                    ),
                )
            })?;
            let ast = to_ast_offset(&solved, n_in, schedule.space().params());
            bindings.push((info.domain_dims[d].clone(), ast));
            binding_exprs.push(solved);
        }

        let access = match &info.access {
            None => None,
            Some(map) => {
                let mut indices = Vec::new();
                for k in 0..map.n_out() {
                    let a_in = map.n_in();
                    let solved = solve_dim(map, a_in + k, a_in, map.n_in() + map.n_out())
                        .ok_or_else(|| {
                            CodegenError::new(
                                CodegenErrorKind::AccessUnsolvable,
                                format!(
                                    "no index expression for dimension {} of the access of `{}`",
                                    k, info.name
                                ),
                            )
                        })?;
                    // solved is over the access map's inputs; rewrite the
                    // input dimensions through the schedule bindings.
                    let mut idx = AstExpr::Int(0);
                    for (d, &c) in solved.coeffs.iter().take(a_in).enumerate() {
                        if c == 0 {
                            continue;
                        }
                        let base = to_ast_offset(&binding_exprs[d], n_in, schedule.space().params());
                        idx = AstExpr::add(idx, AstExpr::mul(AstExpr::Int(c), base));
                    }
                    for (p, &c) in solved.param_coeffs.iter().enumerate() {
                        if c == 0 {
                            continue;
                        }
                        idx = AstExpr::add(
                            idx,
                            AstExpr::mul(
                                AstExpr::Int(c),
                                AstExpr::Var(map.space().params()[p].clone()),
                            ),
                        );
                    }
                    idx = AstExpr::add(idx, AstExpr::Int(solved.constant));
                    indices.push(idx);
                }
                Some(AccessIndex {
                    buffer: map.out_name().unwrap_or("").to_string(),
                    indices,
                })
            }
        };

        Ok(AstNode::Stmt {
            name: info.name.clone(),
            payload: info.payload,
            bindings,
            access,
        })
    }
}

/// The constant `level` is pinned to, if an equality pins it without
/// involving any other dimension or parameter.
fn static_value(proj: &ConstraintSystem, level: usize) -> Option<i64> {
    for con in proj.iter() {
        if con.kind != ConstraintKind::Equality {
            continue;
        }
        let c = con.expr.coeffs[level];
        if c == 0 || !con.expr.is_single_dim(level) {
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

/// Drop inequalities involving `level` that are implied by the rest of
/// the system (which includes the context accumulated from enclosing
/// loops).
fn prune_redundant(sys: &ConstraintSystem, level: usize) -> ConstraintSystem {
    let mut sys = sys.clone();
    let mut i = 0;
    while i < sys.len() {
        let candidate = sys.constraints()[i].clone();
        let involved =
            candidate.kind == ConstraintKind::Inequality && candidate.expr.coeffs[level] != 0;
        if involved {
            let mut rest = ConstraintSystem::new(sys.n_dim(), sys.n_param());
            for (j, c) in sys.iter().enumerate() {
                if j != i {
                    rest.add(c.clone());
                }
            }
            if project::is_redundant(&rest, &candidate) {
                sys.remove(i);
                continue;
            }
        }
        i += 1;
    }
    sys
}

/// Solve variable `var` of a map to an expression over the variables
/// outside `other_lo..other_hi` (its own tuple side), through a
/// unit-coefficient equality.
fn solve_dim(map: &Map, var: usize, other_lo: usize, other_hi: usize) -> Option<AffineExpr> {
    for con in map.system().iter() {
        if con.kind != ConstraintKind::Equality {
            continue;
        }
        let c = con.expr.coeffs[var];
        if c != 1 && c != -1 {
            continue;
        }
        let same_side = (other_lo..other_hi)
            .filter(|&w| w != var)
            .any(|w| con.expr.coeffs[w] != 0);
        if same_side {
            continue;
        }
        let mut rest = con.expr.clone();
        rest.coeffs[var] = 0;
        return Some(rest.scale(-c));
    }
    None
}

/// Render an affine expression over time dimensions as an AST
/// expression (`c{k}` iterator names).
fn to_ast(expr: &AffineExpr, params: &[String]) -> AstExpr {
    to_ast_offset(expr, 0, params)
}

/// Same, for expressions in a map layout where time dimensions start at
/// `offset`.
fn to_ast_offset(expr: &AffineExpr, offset: usize, params: &[String]) -> AstExpr {
    let mut acc = AstExpr::Int(0);
    for (k, &c) in expr.coeffs.iter().enumerate() {
        if c == 0 {
            continue;
        }
        debug_assert!(k >= offset, "expression mentions a non-time dimension");
        let var = AstExpr::Var(format!("c{}", k - offset));
        acc = AstExpr::add(acc, AstExpr::mul(AstExpr::Int(c), var));
    }
    for (p, &c) in expr.param_coeffs.iter().enumerate() {
        if c == 0 {
            continue;
        }
        acc = AstExpr::add(acc, AstExpr::mul(AstExpr::Int(c), AstExpr::Var(params[p].clone())));
    }
    if expr.constant < 0 {
        AstExpr::sub(acc, AstExpr::Int(-expr.constant))
    } else {
        AstExpr::add(acc, AstExpr::Int(expr.constant))
    }
}
