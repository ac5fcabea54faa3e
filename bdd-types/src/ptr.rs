//! Bit-packed node identifiers and sink values (component A).
//!
//! A [`Ptr`] is a 64-bit tagged value. Layout, from the most significant bit
//! down:
//!
//! ```text
//! bit 63        flag bit (arc high-child marker, ignored by ordering)
//! bit 62        sink tag (1 = sink/NIL, 0 = internal reference)
//! bits 61..=40  level            (internal only)
//! bits 39..=0   id                (internal only)
//! bits 61..=0   0=false sink, 1=true sink, 2=NIL (sink-tagged only)
//! ```
//!
//! Raw unsigned comparison of the *unflagged* value is the topological
//! order: smaller level sorts first, id breaks ties within a level, and any
//! sink-tagged value sorts after every internal reference.

use std::cmp::Ordering;
use std::fmt;

const FLAG_BIT: u64 = 1 << 63;
const SINK_BIT: u64 = 1 << 62;
const VALUE_MASK: u64 = SINK_BIT - 1;

const ID_BITS: u32 = 40;
const LEVEL_BITS: u32 = 62 - ID_BITS;
const ID_MASK: u64 = (1 << ID_BITS) - 1;

/// Largest representable variable level.
pub const MAX_LEVEL: u64 = (1 << LEVEL_BITS) - 1;
/// Largest representable id within a level.
pub const MAX_ID: u64 = (1 << ID_BITS) - 1;

const SINK_FALSE: u64 = SINK_BIT;
const SINK_TRUE: u64 = SINK_BIT | 1;
const SINK_NIL: u64 = SINK_BIT | 2;

/// A tagged pointer: an internal `(level, id)` reference, a boolean sink, or
/// the distinguished NIL value. See the module docs for the bit layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ptr(u64);

impl Ptr {
    pub const NIL: Ptr = Ptr(SINK_NIL);

    /// Builds an internal pointer `(level, id)`. Contract: `level <=
    /// MAX_LEVEL` and `id <= MAX_ID`; violating this is a programmer error.
    pub fn make_internal(level: u64, id: u64) -> Ptr {
        assert!(level <= MAX_LEVEL, "level {level} exceeds MAX_LEVEL");
        assert!(id <= MAX_ID, "id {id} exceeds MAX_ID");
        Ptr((level << ID_BITS) | id)
    }

    pub fn make_sink(value: bool) -> Ptr {
        Ptr(if value { SINK_TRUE } else { SINK_FALSE })
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self.unflag().0 == SINK_NIL
    }

    #[inline]
    pub fn is_sink(self) -> bool {
        let u = self.unflag().0;
        u == SINK_FALSE || u == SINK_TRUE
    }

    #[inline]
    pub fn is_internal(self) -> bool {
        self.unflag().0 & SINK_BIT == 0
    }

    /// The sink's boolean payload. Contract: `self.is_sink()`.
    pub fn value_of(self) -> bool {
        let u = self.unflag().0;
        assert!(u == SINK_FALSE || u == SINK_TRUE, "value_of on non-sink ptr");
        u == SINK_TRUE
    }

    /// Contract: `self.is_internal()`.
    pub fn level_of(self) -> u64 {
        let u = self.unflag().0;
        assert!(u & SINK_BIT == 0, "level_of on non-internal ptr");
        u >> ID_BITS
    }

    /// Contract: `self.is_internal()`.
    pub fn id_of(self) -> u64 {
        let u = self.unflag().0;
        assert!(u & SINK_BIT == 0, "id_of on non-internal ptr");
        u & ID_MASK
    }

    #[inline]
    pub fn flag(self) -> Ptr {
        Ptr(self.0 | FLAG_BIT)
    }

    #[inline]
    pub fn unflag(self) -> Ptr {
        Ptr(self.0 & !FLAG_BIT)
    }

    #[inline]
    pub fn is_flagged(self) -> bool {
        self.0 & FLAG_BIT != 0
    }

    /// Lexicographically smallest of two pointers, by unflagged value.
    pub fn first(a: Ptr, b: Ptr) -> Ptr {
        if a.unflag() <= b.unflag() {
            a
        } else {
            b
        }
    }

    /// Lexicographically smallest of three pointers, by unflagged value.
    pub fn second(a: Ptr, b: Ptr, c: Ptr) -> Ptr {
        let mut v = [a, b, c];
        v.sort_by_key(|p| p.unflag().0);
        v[1]
    }

    pub fn third(a: Ptr, b: Ptr, c: Ptr) -> Ptr {
        let mut v = [a, b, c];
        v.sort_by_key(|p| p.unflag().0);
        v[2]
    }

    /// The raw unflagged bits, for use as a sort/hash key where the caller
    /// already knows to ignore the flag.
    pub fn raw(self) -> u64 {
        self.unflag().0
    }

    /// The raw bits including the flag bit, for on-disk encoding of arc
    /// sources (where the flag carries the high-child marker).
    pub fn raw_with_flag(self) -> u64 {
        self.0
    }

    /// Reconstructs a pointer from bits previously produced by [`Self::raw`]
    /// (flag cleared). For store-layer decoding only.
    pub fn from_raw(bits: u64) -> Ptr {
        Ptr(bits & !FLAG_BIT)
    }

    /// Reconstructs a pointer from bits previously produced by
    /// [`Self::raw_with_flag`] (flag preserved). For store-layer decoding
    /// only.
    pub fn from_raw_with_flag(bits: u64) -> Ptr {
        Ptr(bits)
    }
}

impl PartialOrd for Ptr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ptr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.unflag().0.cmp(&other.unflag().0)
    }
}

impl fmt::Debug for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "NIL")
        } else if self.is_sink() {
            write!(f, "sink({})", self.value_of())
        } else {
            write!(
                f,
                "{}({}, {})",
                if self.is_flagged() { "flagged" } else { "ptr" },
                self.level_of(),
                self.id_of()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_ordering_follows_level_then_id() {
        let a = Ptr::make_internal(0, 5);
        let b = Ptr::make_internal(0, 6);
        let c = Ptr::make_internal(1, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn sinks_compare_greater_than_all_internals() {
        let deep = Ptr::make_internal(MAX_LEVEL, MAX_ID);
        assert!(deep < Ptr::make_sink(false));
        assert!(Ptr::make_sink(false) < Ptr::make_sink(true));
    }

    #[test]
    fn flag_bit_is_ignored_by_ordering() {
        let a = Ptr::make_internal(2, 3);
        let flagged = a.flag();
        assert_eq!(a.cmp(&flagged), Ordering::Equal);
        assert!(flagged.is_flagged());
        assert!(!flagged.unflag().is_flagged());
        assert_eq!(flagged.level_of(), 2);
        assert_eq!(flagged.id_of(), 3);
    }

    #[test]
    fn nil_is_distinguished() {
        assert!(Ptr::NIL.is_nil());
        assert!(!Ptr::NIL.is_sink());
        assert!(!Ptr::NIL.is_internal());
    }

    #[test]
    fn first_second_third_order_by_unflagged_value() {
        let a = Ptr::make_internal(3, 0);
        let b = Ptr::make_internal(1, 0);
        let c = Ptr::make_internal(2, 0);
        assert_eq!(Ptr::first(a, b), b);
        assert_eq!(Ptr::second(a, b, c), c);
        assert_eq!(Ptr::third(a, b, c), a);
    }
}
