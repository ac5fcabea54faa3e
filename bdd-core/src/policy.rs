//! The policy layer (component F): the handful of operator-specific
//! decisions product construction and Reduce defer to, so the same
//! LPQ-driven machinery serves both the binary operator presets and (in
//! principle) a ZDD family through a different reduction rule.
//!
//! Dispatch is a closed `enum`, not a trait object — every method here
//! runs in the inner loop of product construction or Reduce.

use bdd_types::Ptr;

/// The ten binary operators exposed by `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    Imp,
    ImpBy,
    Diff,
    Less,
}

impl Op {
    pub fn eval(self, a: bool, b: bool) -> bool {
        match self {
            Op::And => a && b,
            Op::Or => a || b,
            Op::Xor => a != b,
            Op::Nand => !(a && b),
            Op::Nor => !(a || b),
            Op::Xnor => a == b,
            Op::Imp => !a || b,
            Op::ImpBy => a || !b,
            Op::Diff => a && !b,
            Op::Less => !a && b,
        }
    }

    /// If the left operand is pinned to the sink `a`, is the result
    /// independent of the right operand? When it is, returns the result
    /// value: a left sink shortcuts exactly when it makes the right
    /// operand irrelevant.
    pub fn left_shortcut(self, a: bool) -> Option<bool> {
        let with_false = self.eval(a, false);
        let with_true = self.eval(a, true);
        (with_false == with_true).then_some(with_false)
    }

    /// Mirror of [`Self::left_shortcut`] for a right operand pinned to a
    /// sink (`can_right_shortcut` / `is_left_irrelevant`).
    pub fn right_shortcut(self, b: bool) -> Option<bool> {
        let with_false = self.eval(false, b);
        let with_true = self.eval(true, b);
        (with_false == with_true).then_some(with_false)
    }

    /// Whether pinning the left operand to sink `a` leaves the result
    /// equal to the right operand unchanged (`or(⊥, B) = B`, `and(⊤, B) =
    /// B`, …). A companion to [`Self::left_shortcut`] for the case where
    /// the right operand isn't irrelevant but can be reused as-is.
    pub fn left_is_identity(self, a: bool) -> bool {
        !self.eval(a, false) && self.eval(a, true)
    }

    /// Whether pinning the left operand to sink `a` leaves the result
    /// equal to the right operand's negation (`xor(⊤, B) = not B`, …).
    pub fn left_is_negation(self, a: bool) -> bool {
        self.eval(a, false) && !self.eval(a, true)
    }

    /// Mirror of [`Self::left_is_identity`] for a right operand pinned to
    /// sink `b`.
    pub fn right_is_identity(self, b: bool) -> bool {
        !self.eval(false, b) && self.eval(true, b)
    }

    /// Mirror of [`Self::left_is_negation`] for a right operand pinned to
    /// sink `b`.
    pub fn right_is_negation(self, b: bool) -> bool {
        self.eval(false, b) && !self.eval(true, b)
    }

    /// `op ∈ {∨, ∧}` is all `quantify` needs; this validates that at
    /// construction rather than threading a third quantifier type
    /// through the product-construction generics.
    pub fn is_quantifier_combinator(self) -> bool {
        matches!(self, Op::Or | Op::And)
    }
}

/// Which decision-diagram family a product-construction/Reduce pass is
/// building for. `Zdd` is carried to keep the interface honest about the
/// family this core could extend to — a ZDD variant reuses the same core
/// via a different policy — but no ZDD-specific zero-suppression
/// semantics are exercised by any operation this crate exposes — that
/// remains a Non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Bdd,
    Zdd,
}

impl Policy {
    /// Bryant's rule 1 test: does this tentative node collapse into one
    /// of its children? Returns the pointer to redirect to, if so.
    pub fn reduction_rule(self, low: Ptr, high: Ptr) -> Option<Ptr> {
        match self {
            Policy::Bdd => (low == high).then_some(low),
            Policy::Zdd => (high == Ptr::make_sink(false)).then_some(low),
        }
    }

    /// Inverse of [`Self::reduction_rule`]: reconstructs the `(low,
    /// high)` a suppressed node would have had, given the pointer it was
    /// redirected to. Used by substitution passes that need to rebuild a
    /// two-child shape from a single forwarded child.
    pub fn reduction_rule_inv(self, child: Ptr) -> (Ptr, Ptr) {
        match self {
            Policy::Bdd => (child, child),
            Policy::Zdd => (child, Ptr::make_sink(false)),
        }
    }

    /// Opportunity for a policy to rewrite a computed `(low, high)`
    /// cofactor pair before it is used — ZDD's implicit variable
    /// presence/absence bookkeeping. A no-op for BDD.
    pub fn compute_cofactor(self, low: Ptr, high: Ptr) -> (Ptr, Ptr) {
        match self {
            Policy::Bdd => (low, high),
            Policy::Zdd => (low, high),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bdd_reduction_rule_suppresses_on_equal_children() {
        let low = Ptr::make_sink(false);
        let high = Ptr::make_sink(false);
        assert_eq!(Policy::Bdd.reduction_rule(low, high), Some(low));
        assert_eq!(Policy::Bdd.reduction_rule(low, Ptr::make_sink(true)), None);
    }

    #[test]
    fn zdd_reduction_rule_suppresses_on_false_high_child() {
        let low = Ptr::make_internal(2, 0);
        assert_eq!(
            Policy::Zdd.reduction_rule(low, Ptr::make_sink(false)),
            Some(low)
        );
        assert_eq!(
            Policy::Zdd.reduction_rule(low, Ptr::make_sink(true)),
            None
        );
    }

    #[test]
    fn zdd_compute_cofactor_is_currently_a_passthrough() {
        let low = Ptr::make_internal(0, 0);
        let high = Ptr::make_sink(true);
        assert_eq!(Policy::Zdd.compute_cofactor(low, high), (low, high));
    }

    #[test]
    fn left_is_identity_matches_or_with_false() {
        assert!(Op::Or.left_is_identity(false));
        assert!(!Op::Or.left_is_identity(true));
        assert!(Op::And.left_is_identity(true));
    }

    #[test]
    fn left_is_negation_matches_xor_with_true() {
        assert!(Op::Xor.left_is_negation(true));
        assert!(!Op::Xor.left_is_negation(false));
    }
}
