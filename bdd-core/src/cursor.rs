//! A per-level node lookup cache over a reduced [`NodeFile`], used by
//! product construction to resolve a pending request's target pointers
//! into `(low, high)` cofactors one level at a time.
//!
//! Node files are written root-last (descending level); product
//! construction sweeps levels root-first (ascending), so the cursor opens
//! a *reversed* read stream and buffers exactly one level's worth of
//! nodes at a time, keyed by id.

use std::collections::HashMap;

use bdd_types::{Node, Ptr};

use crate::files::NodeFile;
use crate::store::StreamReader;

pub struct NodeCursor {
    reader: StreamReader<Node>,
    current_level: Option<u64>,
    by_id: HashMap<u64, Node>,
}

impl NodeCursor {
    pub fn new(file: &NodeFile) -> std::io::Result<Self> {
        Ok(Self {
            reader: file.nodes.open_reversed()?,
            current_level: None,
            by_id: HashMap::new(),
        })
    }

    /// Buffers every node at `level`, discarding whatever the previous
    /// level held. Contract: `level` is monotonically non-decreasing
    /// across calls (the cursor never rewinds), matching the ascending
    /// sweep product construction performs.
    pub fn advance_to(&mut self, level: u64) {
        if self.current_level == Some(level) {
            return;
        }
        if let Some(cur) = self.current_level {
            assert!(
                level >= cur,
                "NodeCursor advance_to({level}) below current level {cur}"
            );
        }
        self.by_id.clear();
        self.current_level = Some(level);
        while let Some(node) = self.reader.peek() {
            if node.uid.level_of() != level {
                break;
            }
            self.reader.pull();
            self.by_id.insert(node.uid.id_of(), node);
        }
    }

    /// Looks up the node an internal pointer refers to. Contract:
    /// `ptr.is_internal()` and `self` has already been advanced to
    /// `ptr.level_of()`.
    pub fn lookup(&self, ptr: Ptr) -> Node {
        assert!(ptr.is_internal(), "lookup on non-internal pointer {ptr:?}");
        assert_eq!(
            self.current_level,
            Some(ptr.level_of()),
            "cursor not advanced to {ptr:?}'s level"
        );
        *self
            .by_id
            .get(&ptr.id_of())
            .unwrap_or_else(|| panic!("dangling reference {ptr:?}: no such node in file"))
    }
}

/// A full random-access index over a node file, for callers that need to
/// chase a chain of children across arbitrary, non-monotonic levels —
/// [`NodeCursor`]'s single-level buffer can't serve that without violating
/// its own "never rewinds" contract. Substitution's fast-forward through a
/// run of fixed variables is the motivating case; this trades an
/// up-front full read for unconstrained lookups afterward.
pub struct NodeIndex {
    by_ptr: HashMap<u64, Node>,
}

impl NodeIndex {
    pub fn build(file: &NodeFile) -> std::io::Result<Self> {
        let mut by_ptr = HashMap::new();
        let mut reader = file.nodes.open()?;
        while let Some(node) = reader.pull() {
            by_ptr.insert(node.uid.raw(), node);
        }
        Ok(Self { by_ptr })
    }

    pub fn lookup(&self, ptr: Ptr) -> Node {
        assert!(ptr.is_internal(), "lookup on non-internal pointer {ptr:?}");
        *self
            .by_ptr
            .get(&ptr.raw())
            .unwrap_or_else(|| panic!("dangling reference {ptr:?}: no such node in file"))
    }
}
