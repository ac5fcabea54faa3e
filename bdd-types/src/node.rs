use crate::ptr::Ptr;
use serde::{Deserialize, Serialize};

/// A node `(uid, low, high)`. `uid` is an internal pointer; `low`/`high` may
/// be internal pointers or sinks. Canonical node files additionally require
/// `low != high` and per-level uniqueness of `(low, high)` — those
/// invariants are established by Reduce, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub uid: Ptr,
    pub low: Ptr,
    pub high: Ptr,
}

impl Node {
    pub fn new(uid: Ptr, low: Ptr, high: Ptr) -> Self {
        Self { uid, low, high }
    }

    /// `(low, high)`, the key Reduce's rule-2 pass merges duplicates on.
    pub fn children(&self) -> (Ptr, Ptr) {
        (self.low, self.high)
    }
}

/// Per-level record `(level, width)`: how many nodes exist at `level` in the
/// canonical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u64,
    pub width: u64,
}
