//! Integer sets bounded by affine constraints.
//!
//! A set is a named tuple of dimensions plus a conjunction of
//! constraints, e.g. `[N] -> { S[i, j] : 0 <= i < N and 0 <= j < 10 }`.
//! Sets print back in canonical form (`expr >= 0` / `expr = 0` pieces
//! joined by `and`) that re-parses to an equal set.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::SetParser;
use crate::utils::errors::PolyResult;

use super::constraint::ConstraintSystem;
use super::context::ContextId;
use super::parse::{self, VarEnv};
use super::project;
use super::space::{merge_param_names, Space};

/// An integer set in some context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    ctx: ContextId,
    space: Space,
    system: ConstraintSystem,
}

impl Set {
    /// Build a set from already-validated parts.
    pub(crate) fn from_parts(ctx: ContextId, space: Space, system: ConstraintSystem) -> Self {
        assert!(!space.is_map());
        assert_eq!(space.n_dim(), system.n_dim());
        assert_eq!(space.n_param(), system.n_param());
        Self { ctx, space, system }
    }

    /// Read a set from its textual form.
    pub fn read_from_str(ctx: ContextId, src: &str) -> PolyResult<Set> {
        let parser = SetParser::parse(src)?;
        let name = if parser.name.is_empty() {
            None
        } else {
            Some(parser.name.as_str())
        };
        let space = Space::set_space(name, parser.space.dimensions.clone(), parser.parameters);
        let dims = space.dim_names();
        let env = VarEnv {
            dims: &dims,
            params: space.params(),
        };
        let mut constraints = Vec::new();
        for c in parser.space.constraints() {
            parse::parse_constraint(c, &env, &mut constraints)?;
        }
        for c in &parser.constraints {
            parse::parse_constraint(c, &env, &mut constraints)?;
        }
        let mut system = ConstraintSystem::new(space.n_dim(), space.n_param());
        for c in constraints {
            system.add(c);
        }
        Ok(Set { ctx, space, system })
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

    /// Tuple name, if any.
    pub fn name(&self) -> Option<&str> {
        self.space.out_name()
    }

    pub fn n_dim(&self) -> usize {
        self.space.n_dim()
    }

    pub fn n_param(&self) -> usize {
        self.space.n_param()
    }

    pub fn dims(&self) -> &[String] {
        self.space.out_dims()
    }

    /// Rename (or anonymize) the tuple.
    pub fn rename_tuple(mut self, name: Option<&str>) -> Set {
        self.space.set_out_name(name);
        self
    }

    /// Membership test for a concrete point under concrete parameters.
    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        assert_eq!(point.len(), self.n_dim());
        assert_eq!(params.len(), self.n_param());
        self.system.is_satisfied(point, params)
    }

    /// Intersect with a set over the same tuple shape.  Parameter lists
    /// are unified by name.
    pub fn intersect(mut self, other: &Set) -> Set {
        assert_eq!(self.ctx, other.ctx, "sets from different contexts");
        assert_eq!(self.n_dim(), other.n_dim(), "tuple arity mismatch");
        let (params, remap_a, remap_b) = merge_param_names(self.space.params(), other.space.params());
        self.system.remap_params(&remap_a, params.len());
        let mut other_sys = other.system.clone();
        other_sys.remap_params(&remap_b, params.len());
        self.space.set_params(params);
        self.system.merge(&other_sys);
        self
    }

    /// Simplify the constraint list.
    pub fn coalesce(mut self) -> Set {
        self.system.coalesce();
        self
    }

    /// Conservative emptiness: `true` means provably empty for every
    /// parameter valuation.
    pub fn is_empty(&self) -> bool {
        project::is_certainly_empty(&self.system)
    }

    /// Display names for the dimensions; anonymous dimensions fall back
    /// to positional `c{i}` names.
    pub(crate) fn display_dim_names(&self) -> Vec<String> {
        self.space
            .out_dims()
            .iter()
            .enumerate()
            .map(|(i, d)| {
                if d.is_empty() {
                    format!("c{}", i)
                } else {
                    d.clone()
                }
            })
            .collect()
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.space.params().is_empty() {
            write!(f, "[{}] -> ", self.space.params().join(", "))?;
        }
        let names = self.display_dim_names();
        write!(f, "{{ {}[{}]", self.name().unwrap_or(""), names.join(", "))?;
        if !self.system.is_empty() {
            let pieces: Vec<String> = self
                .system
                .iter()
                .map(|c| c.display_with(&names, self.space.params()))
                .collect();
            write!(f, " : {}", pieces.join(" and "))?;
        }
        write!(f, " }}")
    }
}
