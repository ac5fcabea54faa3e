use crate::ptr::Ptr;
use serde::{Deserialize, Serialize};

/// A directed edge `source -> target`. `source`'s flag bit marks whether
/// this is the parent's high-child edge; `target` may be any pointer,
/// including a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    pub source: Ptr,
    pub target: Ptr,
}

impl Arc {
    pub fn new(source: Ptr, target: Ptr) -> Self {
        Self { source, target }
    }

    pub fn is_high(&self) -> bool {
        self.source.is_flagged()
    }
}

/// Orders arcs by unflagged target pointer, ascending — the order the
/// levelized priority queue must hand requests to a consumer within a
/// level, and the order the two sink-arc substreams are already each
/// individually sorted in before being merged.
impl PartialOrd for Arc {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Arc {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.target
            .cmp(&other.target)
            .then_with(|| self.source.raw().cmp(&other.source.raw()))
    }
}
