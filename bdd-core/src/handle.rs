//! The handle layer (component G): a value type pairing a reference-
//! counted reduced node file with an O(1) negate flag, plus the handful
//! of operator identities and ite/apply short-circuits that are cheaper
//! to resolve by comparing whole operands than by tracing through
//! product construction.
//!
//! These identity checks live on [`Handle`] rather than
//! [`crate::policy::Policy`], since they compare whole operands by handle
//! identity/sink-ness, which is information the policy layer's per-node
//! dispatch never has.

use std::collections::HashMap;
use std::rc::Rc;

use bdd_types::{Assignment, BddError, LevelInfo, Node, Ptr};

use crate::config::EngineConfig;
use crate::cursor::NodeIndex;
use crate::files::{NodeFile, NodeFileBuilder};
use crate::policy::{Op, Policy};
use crate::product::{self, ProductOutcome};
use crate::reduce::reduce;
use crate::store::Backing;

/// A function over `config.var_count` boolean variables. `negate` is
/// applied to every sink value a caller ever reads out of `file`; it is
/// never baked into `file` itself, which is why [`Handle::not_`] is O(1).
#[derive(Clone)]
pub struct Handle {
    file: Rc<NodeFile>,
    negate: bool,
    config: EngineConfig,
}

impl Handle {
    pub fn sink(value: bool, config: EngineConfig) -> Self {
        Self {
            file: Rc::new(NodeFile::single_sink(value)),
            negate: false,
            config,
        }
    }

    /// The single-variable function `x_level`.
    pub fn variable(level: u64, config: EngineConfig) -> Result<Self, BddError> {
        if level >= config.var_count {
            return Err(BddError::VariableOutOfRange {
                level,
                max_level: config.var_count.saturating_sub(1),
            });
        }
        let mut builder = NodeFileBuilder::new(Backing::Memory)?;
        let uid = Ptr::make_internal(level, 0);
        builder.push_node(Node::new(uid, Ptr::make_sink(false), Ptr::make_sink(true)))?;
        builder.record_sink_arc(false);
        builder.record_sink_arc(true);
        builder.push_level_info(LevelInfo { level, width: 1 })?;
        Ok(Self {
            file: Rc::new(builder.finish()?),
            negate: false,
            config,
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Flips the negate flag. Never touches `file` — this is the whole
    /// point of carrying the flag instead of materializing a negated
    /// copy.
    pub fn not_(&self) -> Self {
        Self {
            file: Rc::clone(&self.file),
            negate: !self.negate,
            config: self.config,
        }
    }

    /// `true` if `self` and `other` are the same node file with the same
    /// flag — an O(1) check, and strictly narrower than semantic equality
    /// (two handles over different, merely isomorphic files are *not*
    /// `is_identical`, only [`Self::equals`]). Comparing file pointers
    /// without also comparing `negate` would incorrectly alias `A` with
    /// `not A`.
    pub fn is_identical(&self, other: &Handle) -> bool {
        Rc::ptr_eq(&self.file, &other.file) && self.negate == other.negate
    }

    fn sink_value(&self) -> Option<bool> {
        if self.file.is_single_sink() {
            Some((self.file.meta.true_sink_arcs > 0) ^ self.negate)
        } else {
            None
        }
    }

    /// Structural/semantic equality: the O(1) identity check first, then
    /// cheap invariants (node count, sink-ness, variable count, level
    /// histogram), then a full streaming comparison of the node files.
    /// Two canonical files over the same variable order that
    /// represent the same function are bit-identical once Reduce's
    /// deterministic id assignment is accounted for, so the streaming
    /// pass is a lockstep zip rather than a general isomorphism search.
    pub fn equals(&self, other: &Handle) -> Result<bool, BddError> {
        if self.is_identical(other) {
            return Ok(true);
        }
        match (self.sink_value(), other.sink_value()) {
            (Some(a), Some(b)) => return Ok(a == b),
            (Some(_), None) | (None, Some(_)) => return Ok(false),
            (None, None) => {}
        }
        if self.file.meta.node_count != other.file.meta.node_count {
            return Ok(false);
        }
        if self.var_count()? != other.var_count()? {
            return Ok(false);
        }
        if !self.level_histogram_matches(other)? {
            return Ok(false);
        }
        self.streaming_eq(other)
    }

    fn level_histogram_matches(&self, other: &Handle) -> Result<bool, BddError> {
        let mut a = self.file.level_info.open()?;
        let mut b = other.file.level_info.open()?;
        loop {
            match (a.pull(), b.pull()) {
                (None, None) => return Ok(true),
                (Some(x), Some(y)) if x == y => continue,
                _ => return Ok(false),
            }
        }
    }

    fn streaming_eq(&self, other: &Handle) -> Result<bool, BddError> {
        let mut a = self.file.nodes.open()?;
        let mut b = other.file.nodes.open()?;
        loop {
            match (a.pull(), b.pull()) {
                (None, None) => return Ok(true),
                (Some(na), Some(nb)) => {
                    if na.uid != nb.uid {
                        return Ok(false);
                    }
                    let a_low = product::effective(na.low, self.negate);
                    let b_low = product::effective(nb.low, other.negate);
                    let a_high = product::effective(na.high, self.negate);
                    let b_high = product::effective(nb.high, other.negate);
                    if a_low != b_low || a_high != b_high {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
    }

    pub fn node_count(&self) -> u64 {
        self.file.meta.node_count
    }

    /// Number of distinct levels actually carrying a node in the reduced
    /// file — not `config.var_count`, which is the engine's configured
    /// ceiling, not this particular function's support.
    pub fn var_count(&self) -> Result<u64, BddError> {
        let mut reader = self.file.level_info.open()?;
        let mut count = 0u64;
        while let Some(info) = reader.pull() {
            if info.width > 0 {
                count += 1;
            }
        }
        Ok(count)
    }

    fn root(&self) -> Ptr {
        product::operand_root(&self.file, self.negate)
    }

    /// Number of root-to-leaf paths in the reduced graph, ignoring
    /// skipped levels.
    pub fn path_count(&self) -> Result<u128, BddError> {
        if self.file.is_single_sink() {
            return Ok(1);
        }
        let mut memo: HashMap<u64, u128> = HashMap::new();
        let mut reader = self.file.nodes.open()?;
        while let Some(node) = reader.pull() {
            let low = Self::child_path_count(node.low, &memo);
            let high = Self::child_path_count(node.high, &memo);
            memo.insert(node.uid.raw(), low + high);
        }
        Ok(*memo
            .get(&self.root().raw())
            .expect("root node was visited in forward order"))
    }

    fn child_path_count(child: Ptr, memo: &HashMap<u64, u128>) -> u128 {
        if child.is_sink() {
            1
        } else {
            *memo
                .get(&child.raw())
                .expect("children precede parents in forward (deepest-first) order")
        }
    }

    /// Number of satisfying assignments over `var_count` variables,
    /// accounting for every skipped level (above the root and between
    /// nodes) as a free factor of 2.
    pub fn sat_count(&self, var_count: u64) -> Result<u128, BddError> {
        if let Some(v) = self.sink_value() {
            return if v { pow2(var_count) } else { Ok(0) };
        }
        let mut memo: HashMap<u64, u128> = HashMap::new();
        let mut reader = self.file.nodes.open()?;
        while let Some(node) = reader.pull() {
            let parent_level = node.uid.level_of();
            let low = self.child_sat_count(node.low, parent_level, var_count, &memo)?;
            let high = self.child_sat_count(node.high, parent_level, var_count, &memo)?;
            let total = low.checked_add(high).ok_or(BddError::CounterOverflow)?;
            memo.insert(node.uid.raw(), total);
        }
        let root = self.root();
        let root_count = *memo
            .get(&root.raw())
            .expect("root node was visited in forward order");
        let factor = pow2(root.level_of())?;
        root_count.checked_mul(factor).ok_or(BddError::CounterOverflow)
    }

    fn child_sat_count(
        &self,
        child: Ptr,
        parent_level: u64,
        var_count: u64,
        memo: &HashMap<u64, u128>,
    ) -> Result<u128, BddError> {
        if child.is_sink() {
            if !(child.value_of() ^ self.negate) {
                return Ok(0);
            }
            let gap = var_count
                .checked_sub(parent_level + 1)
                .expect("parent level within var_count");
            return pow2(gap);
        }
        let gap = child.level_of() - parent_level - 1;
        let base = *memo
            .get(&child.raw())
            .expect("children precede parents in forward (deepest-first) order");
        let factor = pow2(gap)?;
        base.checked_mul(factor).ok_or(BddError::CounterOverflow)
    }

    /// Lexicographically smallest satisfying assignment over `var_count`
    /// variables (false preferred at every free choice).
    pub fn sat_min(&self, var_count: u64) -> Vec<Assignment> {
        self.sat_extreme(var_count, true)
    }

    /// Lexicographically largest satisfying assignment (true preferred at
    /// every free choice).
    pub fn sat_max(&self, var_count: u64) -> Vec<Assignment> {
        self.sat_extreme(var_count, false)
    }

    fn sat_extreme(&self, var_count: u64, want_min: bool) -> Vec<Assignment> {
        let default = !want_min;
        if let Some(v) = self.sink_value() {
            assert!(v, "sat_min/sat_max called on an unsatisfiable handle");
            return (0..var_count).map(|level| Assignment::new(level, default)).collect();
        }

        let target = true ^ self.negate;
        let index = NodeIndex::build(&self.file).expect("node file is readable");
        let mut memo: HashMap<u64, bool> = HashMap::new();
        let mut assignments = Vec::new();
        let mut cur = self.root();
        let mut level = 0u64;

        loop {
            if cur.is_sink() {
                assert_eq!(
                    cur.value_of(),
                    target,
                    "descended into a branch with no satisfying assignment"
                );
                break;
            }
            let node_level = cur.level_of();
            for l in level..node_level {
                assignments.push(Assignment::new(l, default));
            }
            let node = index.lookup(cur);
            let (preferred_value, preferred_child, fallback_value, fallback_child) = if want_min {
                (false, node.low, true, node.high)
            } else {
                (true, node.high, false, node.low)
            };
            if reachable(preferred_child, target, &index, &mut memo) {
                assignments.push(Assignment::new(node_level, preferred_value));
                cur = preferred_child;
            } else {
                assignments.push(Assignment::new(node_level, fallback_value));
                cur = fallback_child;
            }
            level = node_level + 1;
        }
        for l in level..var_count {
            assignments.push(Assignment::new(l, default));
        }
        assignments
    }

    /// Combines `self` and `other` with a preset boolean operator. Checks
    /// the operand-identity shortcuts (e.g. `and(A,A)=A`, `or(A,⊥)=A`)
    /// before falling back to full product construction.
    #[tracing::instrument(skip(self, other), fields(op = ?op))]
    pub fn apply(&self, op: Op, other: &Handle) -> Result<Handle, BddError> {
        assert_eq!(
            self.config, other.config,
            "apply on handles from different engine configurations"
        );

        if let Some(a) = self.sink_value() {
            if let Some(result) = op.left_shortcut(a) {
                return Ok(Handle::sink(result, self.config));
            }
            if op.left_is_identity(a) {
                return Ok(other.clone());
            }
            if op.left_is_negation(a) {
                return Ok(other.not_());
            }
        }
        if let Some(b) = other.sink_value() {
            if let Some(result) = op.right_shortcut(b) {
                return Ok(Handle::sink(result, self.config));
            }
            if op.right_is_identity(b) {
                return Ok(self.clone());
            }
            if op.right_is_negation(b) {
                return Ok(self.not_());
            }
        }
        if self.is_identical(other) {
            // op(x, x) is always one of: a constant, x itself, or not x.
            let on_false = op.eval(false, false);
            let on_true = op.eval(true, true);
            return Ok(if on_false == on_true {
                Handle::sink(on_false, self.config)
            } else if on_true {
                self.clone()
            } else {
                self.not_()
            });
        }

        tracing::debug!(lhs_nodes = self.node_count(), rhs_nodes = other.node_count(), "falling back to product construction");
        let outcome = product::apply(op, &self.file, self.negate, &other.file, other.negate, &self.config)?;
        materialize(outcome, Policy::Bdd, &self.config)
    }

    /// `ite(self, g, h)`: `g` if `self` is true, else `h`. Checks the
    /// classical Bryant-Rudell-Brace shortcuts (`ite(⊤,G,H)=G`,
    /// `ite(F,G,G)=G`, `ite(F,⊤,⊥)=F`, `ite(F,⊥,⊤)=not F`) before falling
    /// back to the full three-operand traversal.
    #[tracing::instrument(skip(self, g, h))]
    pub fn ite(&self, g: &Handle, h: &Handle) -> Result<Handle, BddError> {
        assert_eq!(self.config, g.config, "ite on handles from different engine configurations");
        assert_eq!(self.config, h.config, "ite on handles from different engine configurations");

        if let Some(f) = self.sink_value() {
            return Ok(if f { g.clone() } else { h.clone() });
        }
        if g.is_identical(h) {
            return Ok(g.clone());
        }
        if let (Some(gv), Some(hv)) = (g.sink_value(), h.sink_value()) {
            if gv && !hv {
                return Ok(self.clone());
            }
            if !gv && hv {
                return Ok(self.not_());
            }
        }

        tracing::debug!("falling back to three-operand product construction");
        let outcome = product::ite(
            &self.file,
            self.negate,
            &g.file,
            g.negate,
            &h.file,
            h.negate,
            &self.config,
        )?;
        materialize(outcome, Policy::Bdd, &self.config)
    }

    /// Fixes every level named in `assignment` to its given value.
    #[tracing::instrument(skip(self, assignment), fields(assignment_len = assignment.len()))]
    pub fn substitute(&self, assignment: &[Assignment]) -> Result<Handle, BddError> {
        let outcome = product::substitute(&self.file, self.negate, assignment, &self.config)?;
        materialize(outcome, Policy::Bdd, &self.config)
    }

    /// `restrict(level, value)`: `substitute` with a single entry.
    pub fn restrict(&self, level: u64, value: bool) -> Result<Handle, BddError> {
        self.substitute(&[Assignment::new(level, value)])
    }

    /// Alias for [`Self::restrict`] under the single-variable-fixing name.
    pub fn cofactor(&self, level: u64, value: bool) -> Result<Handle, BddError> {
        self.restrict(level, value)
    }

    /// `∃x_level. self`, via `restrict(level,⊥) ∨ restrict(level,⊤)` —
    /// composition of existing primitives rather than a fused single-pass
    /// quantifier traversal, trading a second pass over the two restricted
    /// diagrams for not needing a dedicated quantifier traversal in
    /// product construction.
    #[tracing::instrument(skip(self))]
    pub fn exists(&self, level: u64) -> Result<Handle, BddError> {
        let lo = self.restrict(level, false)?;
        let hi = self.restrict(level, true)?;
        lo.apply(Op::Or, &hi)
    }

    /// `∀x_level. self`, via `restrict(level,⊥) ∧ restrict(level,⊤)`.
    #[tracing::instrument(skip(self))]
    pub fn forall(&self, level: u64) -> Result<Handle, BddError> {
        let lo = self.restrict(level, false)?;
        let hi = self.restrict(level, true)?;
        lo.apply(Op::And, &hi)
    }
}

fn pow2(exp: u64) -> Result<u128, BddError> {
    if exp >= 128 {
        return Err(BddError::CounterOverflow);
    }
    Ok(1u128 << exp)
}

fn reachable(ptr: Ptr, target: bool, index: &NodeIndex, memo: &mut HashMap<u64, bool>) -> bool {
    if ptr.is_sink() {
        return ptr.value_of() == target;
    }
    if let Some(&cached) = memo.get(&ptr.raw()) {
        return cached;
    }
    let node = index.lookup(ptr);
    let result = reachable(node.low, target, index, memo) || reachable(node.high, target, index, memo);
    memo.insert(ptr.raw(), result);
    result
}

#[tracing::instrument(skip(outcome, config))]
fn materialize(outcome: ProductOutcome, policy: Policy, config: &EngineConfig) -> Result<Handle, BddError> {
    match outcome {
        ProductOutcome::Sink(v) => Ok(Handle::sink(v, *config)),
        ProductOutcome::Arcs(arcs) => {
            let (file, stats) = reduce(&arcs, policy, config)?;
            tracing::debug!(
                node_count = file.meta.node_count,
                rule1_removed = stats.rule1_removed,
                rule2_removed = stats.rule2_removed,
                "reduced product construction output"
            );
            Ok(Handle {
                file: Rc::new(file),
                negate: false,
                config: *config,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(var_count: u64) -> EngineConfig {
        EngineConfig::new(var_count)
    }

    #[test]
    fn not_is_a_flag_flip_not_a_new_file() {
        let cfg = cfg(1);
        let x0 = Handle::variable(0, cfg).unwrap();
        let not_x0 = x0.not_();
        assert!(Rc::ptr_eq(&x0.file, &not_x0.file));
        assert_ne!(x0.negate, not_x0.negate);
    }

    #[test]
    fn double_negation_is_identical_to_original() {
        let cfg = cfg(1);
        let x0 = Handle::variable(0, cfg).unwrap();
        let back = x0.not_().not_();
        assert!(back.is_identical(&x0));
    }

    #[test]
    fn variable_out_of_range_is_rejected() {
        let cfg = cfg(2);
        let err = Handle::variable(2, cfg).unwrap_err();
        assert_eq!(
            err,
            BddError::VariableOutOfRange {
                level: 2,
                max_level: 1
            }
        );
    }

    #[test]
    fn and_of_two_variables_has_two_nodes_and_one_model() {
        let cfg = cfg(2);
        let x0 = Handle::variable(0, cfg).unwrap();
        let x1 = Handle::variable(1, cfg).unwrap();
        let and01 = x0.apply(Op::And, &x1).unwrap();
        assert_eq!(and01.node_count(), 2);
        assert_eq!(and01.sat_count(2).unwrap(), 1);
    }

    #[test]
    fn and_is_idempotent_by_handle() {
        let cfg = cfg(1);
        let x0 = Handle::variable(0, cfg).unwrap();
        let result = x0.apply(Op::And, &x0).unwrap();
        assert!(result.is_identical(&x0));
    }

    #[test]
    fn or_with_false_is_identity() {
        let cfg = cfg(1);
        let x0 = Handle::variable(0, cfg).unwrap();
        let bottom = Handle::sink(false, cfg);
        let result = bottom.apply(Op::Or, &x0).unwrap();
        assert!(result.equals(&x0).unwrap());
    }

    #[test]
    fn xor_of_equal_operands_is_bottom() {
        let cfg = cfg(1);
        let x0 = Handle::variable(0, cfg).unwrap();
        let result = x0.apply(Op::Xor, &x0).unwrap();
        assert_eq!(result.sat_count(1).unwrap(), 0);
    }

    #[test]
    fn ite_true_g_h_returns_g() {
        let cfg = cfg(2);
        let top = Handle::sink(true, cfg);
        let g = Handle::variable(0, cfg).unwrap();
        let h = Handle::variable(1, cfg).unwrap();
        let result = top.ite(&g, &h).unwrap();
        assert!(result.is_identical(&g));
    }

    #[test]
    fn ite_f_g_g_returns_g() {
        let cfg = cfg(2);
        let f = Handle::variable(0, cfg).unwrap();
        let g = Handle::variable(1, cfg).unwrap();
        let result = f.ite(&g, &g).unwrap();
        assert!(result.is_identical(&g));
    }

    #[test]
    fn exists_over_and_yields_the_other_variable() {
        let cfg = cfg(2);
        let x0 = Handle::variable(0, cfg).unwrap();
        let x1 = Handle::variable(1, cfg).unwrap();
        let and01 = x0.apply(Op::And, &x1).unwrap();
        let result = and01.exists(1).unwrap();
        assert!(result.equals(&x0).unwrap());
    }

    #[test]
    fn sat_min_prefers_false_at_every_free_variable() {
        let cfg = cfg(2);
        let x0 = Handle::variable(0, cfg).unwrap();
        let x1 = Handle::variable(1, cfg).unwrap();
        let and01 = x0.apply(Op::And, &x1).unwrap();
        let min = and01.sat_min(2);
        assert_eq!(min, vec![Assignment::new(0, true), Assignment::new(1, true)]);
    }
}
