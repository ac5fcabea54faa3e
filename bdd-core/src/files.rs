//! Typed node-file and arc-file wrappers, layered on top of component B's
//! untyped [`SealedStream`]s.

use std::cmp::Reverse;

use bdd_types::{Arc, LevelInfo, Node};

use crate::store::{Backing, SealedStream, StreamWriter};

/// Trailer recorded alongside a canonical node file: counts a caller can
/// consult without opening either sub-stream, used by the handle layer's
/// cheap-invariant equality fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFileMeta {
    pub node_count: u64,
    pub false_sink_arcs: u64,
    pub true_sink_arcs: u64,
    pub max_1level_cut: u64,
    pub min_level: Option<u64>,
    pub max_level: Option<u64>,
}

/// A canonical, reduced node file: two parallel sub-streams (`nodes`,
/// `level_info`) plus the trailer. Always the output of [`crate::reduce`].
#[derive(Clone)]
pub struct NodeFile {
    pub nodes: SealedStream<Node>,
    pub level_info: SealedStream<LevelInfo>,
    pub meta: NodeFileMeta,
}

impl NodeFile {
    /// A node file with no internal nodes at all — the single-sink
    /// short-circuit output Reduce can produce directly.
    pub fn single_sink(value: bool) -> Self {
        let mut meta = NodeFileMeta::default();
        if value {
            meta.true_sink_arcs = 1;
        } else {
            meta.false_sink_arcs = 1;
        }
        Self {
            nodes: SealedStream::empty(),
            level_info: SealedStream::empty(),
            meta,
        }
    }

    pub fn is_single_sink(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Accumulates a [`NodeFile`] as Reduce emits levels largest-to-smallest.
/// Node and level-info records are pushed in that (descending-level)
/// order, matching the file's natural write order.
pub struct NodeFileBuilder {
    nodes: StreamWriter<Node>,
    level_info: StreamWriter<LevelInfo>,
    meta: NodeFileMeta,
}

impl NodeFileBuilder {
    pub fn new(backing: Backing) -> std::io::Result<Self> {
        Ok(Self {
            nodes: StreamWriter::new(backing)?,
            level_info: StreamWriter::new(backing)?,
            meta: NodeFileMeta::default(),
        })
    }

    pub fn push_node(&mut self, node: Node) -> std::io::Result<()> {
        let level = node.uid.level_of();
        self.meta.min_level = Some(self.meta.min_level.map_or(level, |m| m.min(level)));
        self.meta.max_level = Some(self.meta.max_level.map_or(level, |m| m.max(level)));
        self.meta.node_count += 1;
        self.nodes.push(node)
    }

    pub fn push_level_info(&mut self, info: LevelInfo) -> std::io::Result<()> {
        self.level_info.push(info)
    }

    pub fn record_sink_arc(&mut self, value: bool) {
        if value {
            self.meta.true_sink_arcs += 1;
        } else {
            self.meta.false_sink_arcs += 1;
        }
    }

    pub fn set_max_1level_cut(&mut self, cut: u64) {
        self.meta.max_1level_cut = self.meta.max_1level_cut.max(cut);
    }

    pub fn finish(self) -> std::io::Result<NodeFile> {
        Ok(NodeFile {
            nodes: self.nodes.seal()?,
            level_info: self.level_info.seal()?,
            meta: self.meta,
        })
    }
}

/// The unreduced arc graph product construction emits. Four sub-streams:
/// `node_arcs` (grouped by the arc's *source* level, descending — see
/// the note on [`ArcFileBuilder::finish`], since the order product
/// construction writes these in is not source-level order), the two
/// sink-arc sub-streams (already written in ascending source-level
/// order, so reading them reversed yields descending order directly),
/// and `level_info`.
///
/// `sink_arcs_out_of_order` is always empty coming out of product
/// construction in this engine: retroactive rule-1 redirects (the only
/// thing that would ever populate this sub-stream) happen entirely inside
/// Reduce's own per-level working set, never by re-opening the arc file —
/// see the note on [`crate::reduce`]. The field is kept so the type
/// matches the documented four-sub-stream layout exactly.
#[derive(Clone)]
pub struct ArcFile {
    pub node_arcs: SealedStream<Arc>,
    pub sink_arcs_in_order: SealedStream<Arc>,
    pub sink_arcs_out_of_order: SealedStream<Arc>,
    pub level_info: SealedStream<LevelInfo>,
    pub max_1level_cut: u64,
}

pub struct ArcFileBuilder {
    node_arcs: StreamWriter<Arc>,
    sink_arcs_in_order: StreamWriter<Arc>,
    level_info: StreamWriter<LevelInfo>,
    max_1level_cut: u64,
}

impl ArcFileBuilder {
    pub fn new(backing: Backing) -> std::io::Result<Self> {
        Ok(Self {
            node_arcs: StreamWriter::new(backing)?,
            sink_arcs_in_order: StreamWriter::new(backing)?,
            level_info: StreamWriter::new(backing)?,
            max_1level_cut: 0,
        })
    }

    pub fn push_node_arc(&mut self, arc: Arc) -> std::io::Result<()> {
        self.node_arcs.push(arc)
    }

    pub fn push_sink_arc(&mut self, arc: Arc) -> std::io::Result<()> {
        self.sink_arcs_in_order.push(arc)
    }

    pub fn push_level_info(&mut self, info: LevelInfo) -> std::io::Result<()> {
        self.level_info.push(info)
    }

    pub fn note_1level_cut(&mut self, cut: u64) {
        self.max_1level_cut = self.max_1level_cut.max(cut);
    }

    /// Seals the builder into an [`ArcFile`]. `node_arcs` is written by the
    /// traversal in the order child nodes are discovered — each arc's
    /// `source` is the *parent*, already allocated at a shallower level
    /// than the node being written, so a node arc's write position tracks
    /// its *target*'s level, not its source's. With level-skipping arcs a
    /// shallow-source arc and a deeper-source arc to the same target level
    /// can interleave, so simply reversing the write order (as is correct
    /// for `sink_arcs_in_order`, whose source *is* the level being
    /// processed) does not give Reduce a clean per-source-level grouping.
    /// This re-sorts `node_arcs` by source level, descending, before
    /// sealing, so Reduce can read it forward and group every arc for a
    /// level together regardless of when it was written.
    pub fn finish(self, backing: Backing) -> std::io::Result<ArcFile> {
        let node_arcs = sort_by_source_level_desc(self.node_arcs.seal()?, backing)?;
        Ok(ArcFile {
            node_arcs,
            sink_arcs_in_order: self.sink_arcs_in_order.seal()?,
            sink_arcs_out_of_order: StreamWriter::<Arc>::new(backing)?.seal()?,
            level_info: self.level_info.seal()?,
            max_1level_cut: self.max_1level_cut,
        })
    }
}

/// Reads `arcs` back in full, re-sorts by `source`'s level descending
/// (stable on ties, so arcs sharing a level keep their relative write
/// order), and writes the result to a fresh stream. A full materialize-
/// sort-rewrite rather than an external merge sort, consistent with this
/// store treating real external sorting as an out-of-scope concern (see
/// the module docs on `crate::store`).
fn sort_by_source_level_desc(arcs: SealedStream<Arc>, backing: Backing) -> std::io::Result<SealedStream<Arc>> {
    let mut reader = arcs.open()?;
    let mut items: Vec<Arc> = Vec::with_capacity(arcs.len() as usize);
    while let Some(arc) = reader.pull() {
        items.push(arc);
    }
    items.sort_by_key(|arc| Reverse(arc.source.unflag().level_of()));

    let mut writer = StreamWriter::new(backing)?;
    for arc in items {
        writer.push(arc)?;
    }
    writer.seal()
}
