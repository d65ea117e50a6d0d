//! Programs: a named collection of statements under one context.
//!
//! The program owns the pieces AST generation needs across statements:
//! the ordering relation built by [`Program::after`], the
//! parallel/vector tag table, schedule alignment, and the union of
//! time-processor domains.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::polyhedral::{Context, ContextId, UnionMap, UnionSet};
use crate::utils::errors::{
    ConstructionError, ConstructionErrorKind, PolyResult, TransformError, TransformErrorKind,
};

use super::statement::{Statement, ValueHandle};

/// How a time dimension should be realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimTag {
    Parallel,
    Vector,
}

/// A named loop-invariant value (typically a size parameter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invariant {
    name: String,
    value: ValueHandle,
}

impl Invariant {
    pub fn new(name: &str, value: ValueHandle) -> PolyResult<Invariant> {
        if name.is_empty() {
            return Err(ConstructionError::new(
                ConstructionErrorKind::EmptyName,
                "invariant name must not be empty",
            )
            .into());
        }
        Ok(Invariant {
            name: name.to_string(),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> ValueHandle {
        self.value
    }
}

/// A named program: statements, invariants, ordering, tags.
#[derive(Debug)]
pub struct Program {
    name: String,
    ctx: Context,
    statements: Vec<Statement>,
    invariants: Vec<Invariant>,
    tags: HashMap<(String, usize), DimTag>,
    /// Range positions currently occupied by ordering dimensions.
    ordering_levels: BTreeSet<usize>,
}

impl Program {
    pub fn new(name: &str) -> PolyResult<Program> {
        if name.is_empty() {
            return Err(ConstructionError::new(
                ConstructionErrorKind::EmptyName,
                "program name must not be empty",
            )
            .into());
        }
        Ok(Program {
            name: name.to_string(),
            ctx: Context::new(),
            statements: Vec::new(),
            invariants: Vec::new(),
            tags: HashMap::new(),
            ordering_levels: BTreeSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ctx(&self) -> ContextId {
        self.ctx.id()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    /// Register an already-built statement.  Registration order is the
    /// tie-break order everywhere downstream.
    pub fn add_statement(&mut self, statement: Statement) {
        assert_eq!(
            statement.ctx(),
            self.ctx.id(),
            "statement from a different context"
        );
        debug!("program {}: registered statement {}", self.name, statement.name());
        self.statements.push(statement);
    }

    /// Build a statement from domain text and register it.  Returns the
    /// tuple name.
    pub fn declare_statement(&mut self, domain: &str, payload: ValueHandle) -> PolyResult<String> {
        let statement = Statement::new(self.ctx.id(), domain, payload)?;
        let name = statement.name().to_string();
        self.add_statement(statement);
        Ok(name)
    }

    pub fn add_invariant(&mut self, name: &str, value: ValueHandle) -> PolyResult<()> {
        let invariant = Invariant::new(name, value)?;
        self.invariants.push(invariant);
        Ok(())
    }

    /// Look up a statement by name; exactly one match required.
    pub fn statement(&self, name: &str) -> PolyResult<&Statement> {
        let index = self.statement_index(name)?;
        Ok(&self.statements[index])
    }

    /// Mutable lookup, same contract as [`Program::statement`].
    pub fn statement_mut(&mut self, name: &str) -> PolyResult<&mut Statement> {
        let index = self.statement_index(name)?;
        Ok(&mut self.statements[index])
    }

    fn statement_index(&self, name: &str) -> PolyResult<usize> {
        let mut found = None;
        for (i, s) in self.statements.iter().enumerate() {
            if s.name() == name {
                if found.is_some() {
                    return Err(ConstructionError::new(
                        ConstructionErrorKind::DuplicateName,
                        format!("more than one statement named `{}`", name),
                    )
                    .into());
                }
                found = Some(i);
            }
        }
        found.ok_or_else(|| {
            ConstructionError::new(
                ConstructionErrorKind::UnknownStatement,
                format!("no statement named `{}`", name),
            )
            .into()
        })
    }

    /// Order `statement` strictly after `other` at the given loop level
    /// (`Statement::ROOT_DIMENSION` orders ahead of all loops).
    ///
    /// Ordering is realized by a constant dimension inserted at the
    /// level into every registered statement (default 0); the ordered
    /// statement then takes the next free constant.  Statements created
    /// after a call to `after` do not carry the ordering dimension, so
    /// create all statements first.
    pub fn after(&mut self, statement: &str, other: &str, level: i32) -> PolyResult<()> {
        assert_ne!(statement, other, "cannot order a statement after itself");
        self.statement_index(statement)?;
        self.statement_index(other)?;
        if level < Statement::ROOT_DIMENSION {
            return Err(TransformError::new(
                TransformErrorKind::InvalidLevel,
                "after",
                format!("invalid level {}", level),
            )
            .into());
        }
        let pos = if level == Statement::ROOT_DIMENSION {
            0
        } else {
            level as usize
        };
        if !self.ordering_levels.contains(&pos) {
            for s in &self.statements {
                if pos > s.range_dim() {
                    return Err(TransformError::new(
                        TransformErrorKind::InvalidLevel,
                        "after",
                        format!(
                            "level {} exceeds the schedule range of statement `{}`",
                            pos,
                            s.name()
                        ),
                    )
                    .into());
                }
            }
            for s in &mut self.statements {
                s.insert_ordering_dim(pos, 0);
            }
            self.ordering_levels = self
                .ordering_levels
                .iter()
                .map(|&p| if p >= pos { p + 1 } else { p })
                .collect();
            self.ordering_levels.insert(pos);
        }
        let next = self
            .statements
            .iter()
            .filter_map(|s| s.ordering_constant(pos))
            .max()
            .unwrap_or(0)
            + 1;
        debug!(
            "program {}: {} after {} at level {} (constant {})",
            self.name, statement, other, level, next
        );
        let index = self.statement_index(statement)?;
        self.statements[index].set_ordering_constant(pos, next);
        Ok(())
    }

    /// Mark a statement's time dimension for parallel realization.
    pub fn tag_parallel_dimension(&mut self, statement: &str, level: usize) -> PolyResult<()> {
        self.tag_dimension(statement, level, DimTag::Parallel)
    }

    /// Mark a statement's time dimension for vector realization.
    pub fn tag_vector_dimension(&mut self, statement: &str, level: usize) -> PolyResult<()> {
        self.tag_dimension(statement, level, DimTag::Vector)
    }

    fn tag_dimension(&mut self, statement: &str, level: usize, tag: DimTag) -> PolyResult<()> {
        let index = self.statement_index(statement)?;
        if level >= self.statements[index].range_dim() {
            return Err(TransformError::new(
                TransformErrorKind::InvalidLevel,
                "tag",
                format!(
                    "level {} exceeds the schedule range of statement `{}`",
                    level, statement
                ),
            )
            .into());
        }
        let key = (statement.to_string(), level);
        if self.tags.contains_key(&key) {
            return Err(ConstructionError::new(
                ConstructionErrorKind::DoubleTag,
                format!("statement `{}` level {} is already tagged", statement, level),
            )
            .into());
        }
        self.tags.insert(key, tag);
        Ok(())
    }

    pub fn should_parallelize(&self, statement: &str, level: usize) -> bool {
        self.tags.get(&(statement.to_string(), level)) == Some(&DimTag::Parallel)
    }

    pub fn should_vectorize(&self, statement: &str, level: usize) -> bool {
        self.tags.get(&(statement.to_string(), level)) == Some(&DimTag::Vector)
    }

    /// The widest schedule range over all statements.
    pub fn get_max_schedules_range_dim(&self) -> usize {
        self.statements
            .iter()
            .map(|s| s.range_dim())
            .max()
            .unwrap_or(0)
    }

    /// Right-pad every schedule with constant-zero dimensions so all
    /// ranges share the widest arity.  Idempotent.
    pub fn align_schedules(&mut self) {
        let max = self.get_max_schedules_range_dim();
        for s in &mut self.statements {
            s.pad_schedule_to(max);
        }
    }

    /// Union of the per-statement iteration domains.  Arities may
    /// differ; domains are never aligned.
    pub fn iteration_domains(&self) -> UnionSet {
        let sets = self.statements.iter().map(|s| s.domain().clone()).collect();
        UnionSet::from_sets(self.ctx.id(), sets)
    }

    /// Union of the per-statement schedules, aligned first.
    pub fn schedules(&mut self) -> UnionMap {
        self.align_schedules();
        let maps = self
            .statements
            .iter()
            .map(|s| s.schedule().clone())
            .collect();
        UnionMap::from_maps(self.ctx.id(), maps)
    }

    /// Align schedules, then union the per-statement time-processor
    /// domains.
    pub fn gen_time_processor_domain(&mut self) -> UnionSet {
        self.align_schedules();
        let sets = self
            .statements
            .iter_mut()
            .map(|s| s.gen_time_processor_domain().clone())
            .collect();
        UnionSet::from_aligned_sets(self.ctx.id(), sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_statement_program() -> Program {
        let mut p = Program::new("prog").unwrap();
        p.declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
            .unwrap();
        p.declare_statement("{ B[i] : 0 <= i < 10 }", ValueHandle(2))
            .unwrap();
        p
    }

    #[test]
    fn test_program_name_required() {
        assert!(Program::new("").is_err());
    }

    #[test]
    fn test_statement_lookup() {
        let p = two_statement_program();
        assert_eq!(p.statement("A").unwrap().name(), "A");
        assert!(p.statement("C").is_err());
    }

    #[test]
    fn test_duplicate_lookup_is_error() {
        let mut p = two_statement_program();
        p.declare_statement("{ A[i] : 0 <= i < 3 }", ValueHandle(3))
            .unwrap();
        assert!(p.statement("A").is_err());
    }

    #[test]
    fn test_after_inserts_ordering_dimension() {
        let mut p = two_statement_program();
        p.after("B", "A", Statement::ROOT_DIMENSION).unwrap();
        let a = p.statement("A").unwrap();
        let b = p.statement("B").unwrap();
        assert_eq!(a.range_dim(), 2);
        assert_eq!(b.range_dim(), 2);
        assert!(a.schedule().contains_pair(&[3], &[0, 3], &[]));
        assert!(b.schedule().contains_pair(&[3], &[1, 3], &[]));
    }

    #[test]
    fn test_after_chain_takes_next_constant() {
        let mut p = two_statement_program();
        p.declare_statement("{ C[i] : 0 <= i < 10 }", ValueHandle(3))
            .unwrap();
        p.after("B", "A", 0).unwrap();
        p.after("C", "B", 0).unwrap();
        assert_eq!(p.statement("A").unwrap().ordering_constant(0), Some(0));
        assert_eq!(p.statement("B").unwrap().ordering_constant(0), Some(1));
        assert_eq!(p.statement("C").unwrap().ordering_constant(0), Some(2));
    }

    #[test]
    fn test_alignment_pads_with_zeros() {
        let mut p = Program::new("prog").unwrap();
        p.declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
            .unwrap();
        p.declare_statement("{ B[i, j] : 0 <= i < 4 and 0 <= j < 4 }", ValueHandle(2))
            .unwrap();
        assert_eq!(p.get_max_schedules_range_dim(), 2);
        p.align_schedules();
        let a = p.statement("A").unwrap();
        assert_eq!(a.range_dim(), 2);
        assert_eq!(a.pre_alignment_range_dim(), 1);
        assert!(a.schedule().contains_pair(&[3], &[3, 0], &[]));
        assert!(!a.schedule().contains_pair(&[3], &[3, 1], &[]));
        // B untouched
        assert_eq!(p.statement("B").unwrap().pre_alignment_range_dim(), 2);
    }

    #[test]
    fn test_iteration_domains_mix_arities() {
        let mut p = Program::new("prog").unwrap();
        p.declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
            .unwrap();
        p.declare_statement("{ B[i, j] : 0 <= i < 4 and 0 <= j < 4 }", ValueHandle(2))
            .unwrap();
        let domains = p.iteration_domains();
        assert_eq!(domains.len(), 2);
        let arities: Vec<usize> = domains.iter().map(|s| s.n_dim()).collect();
        assert_eq!(arities, vec![1, 2]);
    }

    #[test]
    fn test_time_processor_union() {
        let mut p = Program::new("prog").unwrap();
        p.declare_statement("{ A[i] : 0 <= i < 10 }", ValueHandle(1))
            .unwrap();
        p.declare_statement("{ B[i, j] : 0 <= i < 4 and 0 <= j < 4 }", ValueHandle(2))
            .unwrap();
        let union = p.gen_time_processor_domain();
        assert_eq!(union.len(), 2);
        for set in union.iter() {
            assert_eq!(set.n_dim(), 2);
        }
    }

    #[test]
    fn test_double_tag_rejected() {
        let mut p = two_statement_program();
        p.tag_parallel_dimension("A", 0).unwrap();
        assert!(p.tag_parallel_dimension("A", 0).is_err());
        assert!(p.tag_vector_dimension("A", 0).is_err());
        assert!(p.should_parallelize("A", 0));
        assert!(!p.should_vectorize("A", 0));
        assert!(!p.should_parallelize("B", 0));
    }

    #[test]
    fn test_tag_level_checked() {
        let mut p = two_statement_program();
        assert!(p.tag_parallel_dimension("A", 1).is_err());
    }
}
