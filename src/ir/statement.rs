//! Statements: the schedulable unit.
//!
//! A statement owns an iteration domain, an affine schedule into
//! time-processor space, and optionally an access relation into a
//! buffer.  Schedules start as the identity over the domain and are
//! reshaped by split / interchange / tile, all of which edit the map's
//! structured pieces: decompose into range entries and constraint
//! strings, edit in memory, rebuild, coalesce.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::polyhedral::{ContextId, Map, Set};
use crate::text::MapParser;
use crate::utils::errors::{
    ConstructionError, ConstructionErrorKind, PolyResult, TransformError, TransformErrorKind,
};

/// Opaque handle to the caller's payload (expression, closure id, ...).
/// The scheduler never interprets it; it only travels to the generated
/// AST leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueHandle(pub u64);

/// A schedulable statement.
#[derive(Debug, Clone)]
pub struct Statement {
    ctx: ContextId,
    name: String,
    domain: Set,
    schedule: Map,
    access: Option<Map>,
    time_processor_domain: Option<Set>,
    payload: ValueHandle,
    next_var: usize,
    /// Range arity before alignment padding, once padded.
    unpadded_range_dim: Option<usize>,
}

impl Statement {
    /// Level value that orders ahead of all loop dimensions in `after`.
    pub const ROOT_DIMENSION: i32 = -1;

    /// Create a statement from its iteration-domain text.  The schedule
    /// is initialized to the identity over the domain, with the range
    /// tuple anonymized.
    pub fn new(ctx: ContextId, domain: &str, payload: ValueHandle) -> PolyResult<Statement> {
        let domain = Set::read_from_str(ctx, domain)?;
        let name = domain
            .name()
            .ok_or_else(|| {
                ConstructionError::new(
                    ConstructionErrorKind::EmptyName,
                    "statement domain must have a tuple name",
                )
            })?
            .to_string();
        let schedule = Map::identity(&domain)
            .intersect_domain(&domain)
            .rename_range(None)
            .coalesce();
        debug!("statement {}: identity schedule {}", name, schedule);
        Ok(Statement {
            ctx,
            name,
            domain,
            schedule,
            access: None,
            time_processor_domain: None,
            payload,
            next_var: 0,
            unpadded_range_dim: None,
        })
    }

    pub fn ctx(&self) -> ContextId {
        self.ctx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Set {
        &self.domain
    }

    pub fn schedule(&self) -> &Map {
        &self.schedule
    }

    pub fn access(&self) -> Option<&Map> {
        self.access.as_ref()
    }

    pub fn payload(&self) -> ValueHandle {
        self.payload
    }

    pub fn time_processor_domain(&self) -> Option<&Set> {
        self.time_processor_domain.as_ref()
    }

    /// Number of time-processor dimensions of the current schedule.
    pub fn range_dim(&self) -> usize {
        self.schedule.n_out()
    }

    /// Range arity before alignment padding (equal to [`range_dim`]
    /// until the program aligns schedules).
    ///
    /// [`range_dim`]: Statement::range_dim
    pub fn pre_alignment_range_dim(&self) -> usize {
        self.unpadded_range_dim.unwrap_or_else(|| self.range_dim())
    }

    /// Replace the schedule wholesale.  The map's domain tuple must
    /// match the statement.
    pub fn set_schedule(&mut self, schedule: &str) -> PolyResult<()> {
        let map = Map::read_from_str(self.ctx, schedule)?;
        if map.in_name() != Some(self.name.as_str()) || map.n_in() != self.domain.n_dim() {
            return Err(ConstructionError::new(
                ConstructionErrorKind::TupleMismatch,
                format!(
                    "schedule domain tuple does not match statement `{}`",
                    self.name
                ),
            )
            .into());
        }
        self.install_schedule(map.coalesce());
        Ok(())
    }

    fn install_schedule(&mut self, schedule: Map) {
        debug!("statement {}: schedule now {}", self.name, schedule);
        self.schedule = schedule;
        // Any schedule change invalidates the cached image.
        self.time_processor_domain = None;
    }

    /// Split time dimension `dim` by `size`: `t` becomes the pair
    /// `(t / size, t mod size)`, widening the schedule range by one.
    pub fn split(&mut self, dim: usize, size: i64) -> PolyResult<()> {
        self.check_dim("split", dim)?;
        if size <= 0 {
            return Err(TransformError::new(
                TransformErrorKind::InvalidSize,
                "split",
                format!("size must be positive, got {}", size),
            )
            .into());
        }
        let mut pieces = self.schedule.to_pieces();
        let old = pieces.range.dimensions[dim].clone();
        let outer = self.fresh_var(&pieces);
        let inner = self.fresh_var(&pieces);
        pieces.range.replace(&old, &outer, &inner);
        pieces.add_constraint(format!("{} = {}*{} + {}", old, size, outer, inner));
        pieces.add_constraint(format!("0 <= {} < {}", inner, size));
        let map = Map::from_pieces(self.ctx, &pieces)?.coalesce();
        self.install_schedule(map);
        Ok(())
    }

    /// Swap time dimensions `dim0` and `dim1`.
    pub fn interchange(&mut self, dim0: usize, dim1: usize) -> PolyResult<()> {
        self.check_dim("interchange", dim0)?;
        self.check_dim("interchange", dim1)?;
        let mut pieces = self.schedule.to_pieces();
        pieces.range.dimensions.swap(dim0, dim1);
        let map = Map::from_pieces(self.ctx, &pieces)?.coalesce();
        self.install_schedule(map);
        Ok(())
    }

    /// Tile the adjacent time dimensions `dim0` (outer) and `dim1`
    /// (inner) with sizes `size0 x size1`.  The result replaces the pair
    /// with `(t0/size0, t1/size1, t0 mod size0, t1 mod size1)`.
    pub fn tile(&mut self, dim0: usize, dim1: usize, size0: i64, size1: i64) -> PolyResult<()> {
        self.check_dim("tile", dim0)?;
        self.check_dim("tile", dim1)?;
        if dim1 != dim0 + 1 {
            return Err(TransformError::new(
                TransformErrorKind::NonAdjacentTile,
                "tile",
                format!(
                    "dimensions must be adjacent with the outer one first, got {} and {}",
                    dim0, dim1
                ),
            )
            .into());
        }
        if size0 <= 0 || size1 <= 0 {
            return Err(TransformError::new(
                TransformErrorKind::InvalidSize,
                "tile",
                format!("sizes must be positive, got {}x{}", size0, size1),
            )
            .into());
        }
        self.split(dim0, size0)?;
        self.split(dim1 + 1, size1)?;
        self.interchange(dim0 + 1, dim0 + 2)
    }

    /// Bind the statement to a buffer through the identity access:
    /// iteration `(i, j)` touches `buffer[i, j]`.
    pub fn bind_to(&mut self, buffer: &str) -> PolyResult<()> {
        if buffer.is_empty() {
            return Err(ConstructionError::new(
                ConstructionErrorKind::EmptyName,
                "buffer name must not be empty",
            )
            .into());
        }
        let access = Map::identity(&self.domain)
            .intersect_domain(&self.domain)
            .rename_range(Some(buffer))
            .coalesce();
        debug!("statement {}: access {}", self.name, access);
        self.access = Some(access);
        Ok(())
    }

    /// Replace the access relation wholesale.  The map's domain tuple
    /// must match the statement; the range tuple names the buffer.
    pub fn set_access(&mut self, access: &str) -> PolyResult<()> {
        let map = Map::read_from_str(self.ctx, access)?;
        if map.in_name() != Some(self.name.as_str()) || map.n_in() != self.domain.n_dim() {
            return Err(ConstructionError::new(
                ConstructionErrorKind::TupleMismatch,
                format!(
                    "access domain tuple does not match statement `{}`",
                    self.name
                ),
            )
            .into());
        }
        self.access = Some(map.coalesce());
        Ok(())
    }

    /// Compute (and cache) the image of the domain under the schedule.
    pub fn gen_time_processor_domain(&mut self) -> &Set {
        if self.time_processor_domain.is_none() {
            let tp = self.schedule.apply(&self.domain);
            debug!("statement {}: time-processor domain {}", self.name, tp);
            self.time_processor_domain = Some(tp);
        }
        self.time_processor_domain.as_ref().unwrap()
    }

    /// Pad the schedule range with constant-zero dimensions up to
    /// `target` dimensions.  Remembers the pre-padding arity.
    pub(crate) fn pad_schedule_to(&mut self, target: usize) {
        let current = self.range_dim();
        if current >= target {
            return;
        }
        if self.unpadded_range_dim.is_none() {
            self.unpadded_range_dim = Some(current);
        }
        let mut schedule = self.schedule.clone();
        schedule.append_zero_out_dims(target - current);
        self.install_schedule(schedule);
    }

    /// Insert an ordering dimension pinned to `value` at range position
    /// `pos`.
    pub(crate) fn insert_ordering_dim(&mut self, pos: usize, value: i64) {
        let mut schedule = self.schedule.clone();
        schedule.insert_constant_out_dim(pos, value);
        if let Some(u) = self.unpadded_range_dim {
            if pos <= u {
                self.unpadded_range_dim = Some(u + 1);
            }
        }
        self.install_schedule(schedule);
    }

    /// Re-pin the ordering dimension at `pos` to `value`.
    pub(crate) fn set_ordering_constant(&mut self, pos: usize, value: i64) {
        let mut schedule = self.schedule.clone();
        schedule.set_constant_at_out_dim(pos, value);
        self.install_schedule(schedule);
    }

    /// The constant the schedule pins range position `pos` to, if any.
    pub(crate) fn ordering_constant(&self, pos: usize) -> Option<i64> {
        self.schedule.constant_at_out_dim(pos)
    }

    fn check_dim(&self, transform: &str, dim: usize) -> PolyResult<()> {
        if dim >= self.range_dim() {
            return Err(TransformError::new(
                TransformErrorKind::InvalidDimension,
                transform,
                format!(
                    "dimension {} out of range for a {}-dimensional schedule",
                    dim,
                    self.range_dim()
                ),
            )
            .into());
        }
        Ok(())
    }

    /// A loop-variable name unused by the schedule text at hand.
    fn fresh_var(&mut self, parser: &MapParser) -> String {
        loop {
            let candidate = format!("c{}", self.next_var);
            self.next_var += 1;
            let taken = parser.parameters.iter().any(|p| p == &candidate)
                || parser.domain.dimensions.iter().any(|d| d == &candidate)
                || parser.range.dimensions.iter().any(|d| d == &candidate);
            if !taken {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::Context;

    fn statement(ctx: ContextId) -> Statement {
        Statement::new(
            ctx,
            "[N] -> { S[i, j] : 0 <= i < N and 0 <= j < 10 }",
            ValueHandle(1),
        )
        .unwrap()
    }

    #[test]
    fn test_identity_schedule() {
        let ctx = Context::new();
        let s = statement(ctx.id());
        assert_eq!(s.name(), "S");
        assert_eq!(s.range_dim(), 2);
        assert!(s.schedule().contains_pair(&[2, 3], &[2, 3], &[5]));
        assert!(!s.schedule().contains_pair(&[2, 3], &[3, 2], &[5]));
    }

    #[test]
    fn test_split_semantics() {
        let ctx = Context::new();
        let mut s = Statement::new(ctx.id(), "{ S[i] : 0 <= i < 10 }", ValueHandle(0)).unwrap();
        s.split(0, 4).unwrap();
        assert_eq!(s.range_dim(), 2);
        // i = 4*outer + inner with 0 <= inner < 4
        for i in 0..10 {
            assert!(
                s.schedule().contains_pair(&[i], &[i / 4, i % 4], &[]),
                "i = {}",
                i
            );
            assert!(!s.schedule().contains_pair(&[i], &[i / 4 + 1, i % 4], &[]));
        }
    }

    #[test]
    fn test_interchange_swaps() {
        let ctx = Context::new();
        let mut s = statement(ctx.id());
        s.interchange(0, 1).unwrap();
        assert!(s.schedule().contains_pair(&[2, 3], &[3, 2], &[5]));
        assert!(!s.schedule().contains_pair(&[2, 3], &[2, 3], &[5]));
    }

    #[test]
    fn test_interchange_is_involutive() {
        let ctx = Context::new();
        let mut s = statement(ctx.id());
        let before = s.schedule().to_string();
        s.interchange(0, 1).unwrap();
        s.interchange(0, 1).unwrap();
        for i in 0..5 {
            for j in 0..10 {
                assert!(s.schedule().contains_pair(&[i, j], &[i, j], &[5]));
            }
        }
        assert_eq!(s.schedule().to_string(), before);
    }

    #[test]
    fn test_tile_shape() {
        let ctx = Context::new();
        let mut s = Statement::new(
            ctx.id(),
            "{ S[i, j] : 0 <= i < 10 and 0 <= j < 20 }",
            ValueHandle(0),
        )
        .unwrap();
        s.tile(0, 1, 2, 2).unwrap();
        assert_eq!(s.range_dim(), 4);
        // (i, j) -> (i/2, j/2, i%2, j%2)
        for &(i, j) in &[(0, 0), (3, 7), (9, 19)] {
            assert!(s
                .schedule()
                .contains_pair(&[i, j], &[i / 2, j / 2, i % 2, j % 2], &[]));
        }
        assert!(!s.schedule().contains_pair(&[3, 7], &[1, 3, 0, 1], &[]));
    }

    #[test]
    fn test_split_errors() {
        let ctx = Context::new();
        let mut s = statement(ctx.id());
        assert!(s.split(2, 4).is_err());
        assert!(s.split(0, 0).is_err());
        assert!(s.split(0, -2).is_err());
    }

    #[test]
    fn test_tile_requires_adjacent_dims() {
        let ctx = Context::new();
        let mut s = Statement::new(
            ctx.id(),
            "{ S[i, j, k] : 0 <= i < 4 and 0 <= j < 4 and 0 <= k < 4 }",
            ValueHandle(0),
        )
        .unwrap();
        assert!(s.tile(0, 2, 2, 2).is_err());
        assert!(s.tile(1, 0, 2, 2).is_err());
    }

    #[test]
    fn test_bind_to() {
        let ctx = Context::new();
        let mut s = statement(ctx.id());
        s.bind_to("buf").unwrap();
        let access = s.access().unwrap();
        assert_eq!(access.out_name(), Some("buf"));
        assert!(access.contains_pair(&[1, 2], &[1, 2], &[5]));
    }

    #[test]
    fn test_transform_invalidates_time_processor_domain() {
        let ctx = Context::new();
        let mut s = Statement::new(ctx.id(), "{ S[i] : 0 <= i < 10 }", ValueHandle(0)).unwrap();
        s.gen_time_processor_domain();
        assert!(s.time_processor_domain().is_some());
        s.split(0, 2).unwrap();
        assert!(s.time_processor_domain().is_none());
        let tp = s.gen_time_processor_domain().clone();
        assert_eq!(tp.n_dim(), 2);
        assert!(tp.contains(&[4, 1], &[]));
        assert!(!tp.contains(&[5, 0], &[]));
    }

    #[test]
    fn test_set_schedule_validates_tuple() {
        let ctx = Context::new();
        let mut s = statement(ctx.id());
        assert!(s
            .set_schedule("[N] -> { T[i, j] -> [i, j] : 0 <= i < N }")
            .is_err());
        assert!(s
            .set_schedule("[N] -> { S[i, j] -> [j, i] : 0 <= i < N and 0 <= j < 10 }")
            .is_ok());
        assert!(s.schedule().contains_pair(&[2, 3], &[3, 2], &[5]));
    }
}
