//! Reduce (component D): turns the unreduced arc graph product
//! construction emits into a canonical reduced node file, in one
//! bottom-up sweep applying Bryant's two reduction rules.
//!
//! **Per-level grouping.** Every uid product construction ever allocates
//! gets exactly two outgoing arcs (its low edge, unflagged, and its high
//! edge, flagged) recorded with `source` equal to that uid — this is the
//! tentative `(source, low, high)` node each arc pair represents. Reduce
//! therefore groups both arc sub-streams by `source`'s level, sweeping
//! from the deepest level down to the root. `node_arcs` arrives already
//! sorted by source level descending (see
//! [`crate::files::ArcFileBuilder::finish`], which re-sorts it — the
//! traversal's own write order tracks each arc's *target* level, not its
//! source level, and those diverge whenever a level-skipping arc is
//! involved), so it is read with `open()`. `sink_arcs_in_order`'s source
//! *is* the level being processed when each sink arc is written, so its
//! write order is already ascending by source level and `open_reversed()`
//! gives the descending order directly. Arcs whose *target* references a
//! node from a level already finalized are rewritten through a running
//! translation table as soon as they're read, so by the time a level's
//! own rule-1/rule-2 passes run, every `(low, high)` pair they see is
//! already expressed in canonical terms.
//!
//! **Id assignment.** Within a level, tentative nodes are sorted
//! ascending by `(low, high)`; canonical ids are handed out so the
//! smallest `(low, high)` gets the *largest* id and the node file is then
//! written in ascending-id order — equivalently, descending `(low,
//! high)` order — which keeps the file-layout contract
//! (ascending-id-within-descending-level) while the smallest children
//! sort first in assignment rank.

use std::collections::HashMap;

use bdd_types::{Arc, BddError, LevelInfo, Node, Ptr};
use itertools::Itertools;

use crate::config::EngineConfig;
use crate::files::{ArcFile, NodeFile, NodeFileBuilder};
use crate::policy::Policy;
use crate::store::{Backing, Record, StreamReader};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReduceStats {
    pub rule1_removed: u64,
    pub rule2_removed: u64,
}

fn next_source_level(a: &mut StreamReader<Arc>, b: &mut StreamReader<Arc>) -> Option<u64> {
    let x = a.peek().map(|arc| arc.source.unflag().level_of());
    let y = b.peek().map(|arc| arc.source.unflag().level_of());
    match (x, y) {
        (None, None) => None,
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (Some(x), Some(y)) => Some(x.max(y)),
    }
}

fn drain_level(reader: &mut StreamReader<Arc>, level: u64, out: &mut Vec<Arc>) {
    while let Some(arc) = reader.peek() {
        if arc.source.unflag().level_of() != level {
            break;
        }
        reader.pull();
        out.push(arc);
    }
}

fn translate(ptr: Ptr, canonical: &HashMap<u64, Ptr>) -> Result<Ptr, BddError> {
    if ptr.is_nil() {
        return Err(BddError::MalformedArcFile("arc target is NIL".to_string()));
    }
    if ptr.is_sink() {
        return Ok(ptr);
    }
    canonical.get(&ptr.raw()).copied().ok_or_else(|| {
        BddError::MalformedArcFile(format!("unresolved forward reference to {ptr:?}"))
    })
}

/// Runs Reduce over `arcs`, producing the canonical node file.
#[tracing::instrument(skip(arcs, config), fields(policy = ?policy))]
pub fn reduce(
    arcs: &ArcFile,
    policy: Policy,
    config: &EngineConfig,
) -> Result<(NodeFile, ReduceStats), BddError> {
    let mut node_arcs = arcs.node_arcs.open()?;
    let mut sink_arcs = arcs.sink_arcs_in_order.open_reversed()?;

    let backing = Backing::choose(arcs.node_arcs.len(), Node::SIZE, config);
    let mut builder = NodeFileBuilder::new(backing)?;
    builder.set_max_1level_cut(arcs.max_1level_cut);

    let mut canonical: HashMap<u64, Ptr> = HashMap::new();
    let mut stats = ReduceStats::default();

    while let Some(level) = next_source_level(&mut node_arcs, &mut sink_arcs) {
        let mut raw_arcs = Vec::new();
        drain_level(&mut node_arcs, level, &mut raw_arcs);
        drain_level(&mut sink_arcs, level, &mut raw_arcs);

        // Group by the tentative node's own (pre-reduction) id, pairing
        // its low (unflagged source) and high (flagged source) arcs.
        let mut pairs: HashMap<u64, (Option<Ptr>, Option<Ptr>)> = HashMap::new();
        for arc in raw_arcs {
            let id = arc.source.id_of();
            let target = translate(arc.target, &canonical)?;
            let slot = pairs.entry(id).or_insert((None, None));
            if arc.is_high() {
                if slot.1.replace(target).is_some() {
                    return Err(BddError::MalformedArcFile(format!(
                        "duplicate high source at level {level} id {id}"
                    )));
                }
            } else if slot.0.replace(target).is_some() {
                return Err(BddError::MalformedArcFile(format!(
                    "duplicate low source at level {level} id {id}"
                )));
            }
        }

        // Resolve every original id's (low, high); apply rule 1 eagerly
        // and keep the survivors alongside the original id that produced
        // them, so we can fill in the translation table once ranks (and
        // therefore canonical pointers) are known.
        let mut survivors: Vec<(u64, Ptr, Ptr)> = Vec::with_capacity(pairs.len());
        for (id, (low, high)) in pairs {
            let low = low.ok_or_else(|| {
                BddError::MalformedArcFile(format!("missing low arc at level {level} id {id}"))
            })?;
            let high = high.ok_or_else(|| {
                BddError::MalformedArcFile(format!("missing high arc at level {level} id {id}"))
            })?;
            if let Some(redirect) = policy.reduction_rule(low, high) {
                canonical.insert(Ptr::make_internal(level, id).raw(), redirect);
                stats.rule1_removed += 1;
            } else {
                survivors.push((id, low, high));
            }
        }

        // Rule 2: sort ascending by (low, high), then group consecutive
        // equal entries into a single canonical node. Smallest pair gets
        // the largest id.
        survivors.sort_unstable_by_key(|&(_, low, high)| (low.raw(), high.raw()));

        let mut distinct: Vec<(Ptr, Ptr)> = Vec::new();
        let mut rank_of_original: Vec<(u64, u64)> = Vec::with_capacity(survivors.len());
        let grouped = survivors.iter().group_by(|&&(_, low, high)| (low.raw(), high.raw()));
        for (_, group) in &grouped {
            let group: Vec<_> = group.collect();
            distinct.push((group[0].1, group[0].2));
            let rank = (distinct.len() - 1) as u64;
            stats.rule2_removed += (group.len() - 1) as u64;
            for &(id, _, _) in group {
                rank_of_original.push((id, rank));
            }
        }
        let width = distinct.len() as u64;

        for (id, rank) in rank_of_original {
            let canonical_ptr = Ptr::make_internal(level, width - 1 - rank);
            canonical.insert(Ptr::make_internal(level, id).raw(), canonical_ptr);
        }

        let mut node_list: Vec<Node> = Vec::with_capacity(width as usize);
        for (rank, &(low, high)) in distinct.iter().enumerate() {
            let id = width - 1 - rank as u64;
            let uid = Ptr::make_internal(level, id);
            node_list.push(Node::new(uid, low, high));
        }
        node_list.sort_unstable_by_key(|n| n.uid.id_of());
        for node in &node_list {
            builder.push_node(*node)?;
            if node.low.is_sink() {
                builder.record_sink_arc(node.low.value_of());
            }
            if node.high.is_sink() {
                builder.record_sink_arc(node.high.value_of());
            }
        }
        builder.push_level_info(LevelInfo { level, width })?;
        tracing::trace!(level, width, "swept level");
    }

    tracing::debug!(
        rule1_removed = stats.rule1_removed,
        rule2_removed = stats.rule2_removed,
        "reduce finished"
    );
    Ok((builder.finish()?, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::ArcFileBuilder;

    fn v(level: u64) -> Ptr {
        Ptr::make_internal(level, 0)
    }

    /// Builds the arc graph for `x0 AND x1` directly (bypassing product
    /// construction) and checks Reduce produces the two-node canonical
    /// shape from scenario 1.
    #[test]
    fn reduces_and_of_two_variables() {
        let cfg = EngineConfig::new(2);
        let mut b = ArcFileBuilder::new(Backing::Memory).unwrap();
        // root (level 0, tentative id 0): low -> sink(false), high -> new node at level 1.
        b.push_sink_arc(Arc::new(v(0), Ptr::make_sink(false))).unwrap();
        b.push_node_arc(Arc::new(v(0).flag(), v(1))).unwrap();
        // level-1 node (tentative id 0): low -> false, high -> true.
        b.push_sink_arc(Arc::new(v(1), Ptr::make_sink(false))).unwrap();
        b.push_sink_arc(Arc::new(v(1).flag(), Ptr::make_sink(true))).unwrap();
        let arcs = b.finish(Backing::Memory).unwrap();

        let (node_file, stats) = reduce(&arcs, Policy::Bdd, &cfg).unwrap();
        assert_eq!(node_file.meta.node_count, 2);
        assert_eq!(stats.rule1_removed, 0);
        assert_eq!(stats.rule2_removed, 0);

        let mut nodes = node_file.nodes.open().unwrap();
        let deep = nodes.pull().unwrap();
        assert_eq!(deep.uid.level_of(), 1);
        assert_eq!(deep.low, Ptr::make_sink(false));
        assert_eq!(deep.high, Ptr::make_sink(true));
        let root = nodes.pull().unwrap();
        assert_eq!(root.uid.level_of(), 0);
        assert_eq!(root.low, Ptr::make_sink(false));
        assert_eq!(root.high, deep.uid);
    }

    #[test]
    fn rule1_suppresses_redundant_node() {
        let cfg = EngineConfig::new(1);
        let mut b = ArcFileBuilder::new(Backing::Memory).unwrap();
        // A single tentative node at level 0 whose low and high both go
        // to the true sink: should be suppressed entirely.
        b.push_sink_arc(Arc::new(v(0), Ptr::make_sink(true))).unwrap();
        b.push_sink_arc(Arc::new(v(0).flag(), Ptr::make_sink(true))).unwrap();
        let arcs = b.finish(Backing::Memory).unwrap();

        let (node_file, stats) = reduce(&arcs, Policy::Bdd, &cfg).unwrap();
        assert_eq!(node_file.meta.node_count, 0);
        assert_eq!(stats.rule1_removed, 1);
    }

    #[test]
    fn rule2_merges_duplicate_children() {
        let cfg = EngineConfig::new(1);
        let mut b = ArcFileBuilder::new(Backing::Memory).unwrap();
        // Two tentative nodes at level 0 with identical (low, high):
        // should collapse into one canonical node; both parents'
        // incoming arcs are sinks here for simplicity, so we only verify
        // the level's own node count collapses.
        let a = Ptr::make_internal(0, 0);
        let b_id = Ptr::make_internal(0, 1);
        b.push_sink_arc(Arc::new(a, Ptr::make_sink(false))).unwrap();
        b.push_sink_arc(Arc::new(a.flag(), Ptr::make_sink(true))).unwrap();
        b.push_sink_arc(Arc::new(b_id, Ptr::make_sink(false))).unwrap();
        b.push_sink_arc(Arc::new(b_id.flag(), Ptr::make_sink(true))).unwrap();
        let arcs = b.finish(Backing::Memory).unwrap();

        let (node_file, stats) = reduce(&arcs, Policy::Bdd, &cfg).unwrap();
        assert_eq!(node_file.meta.node_count, 1);
        assert_eq!(stats.rule2_removed, 1);
    }

    /// A level-skipping arc graph shaped like `(x0 ∨ x1) ∧ x3`: `root`
    /// (level 0) has a high edge that skips straight to a level-3 node
    /// `d1`, while its low edge goes to a level-1 node `b` whose own high
    /// edge *also* skips straight to level 3 (a different tentative node
    /// `d0`, later merged with `d1` by rule 2).
    ///
    /// Product construction writes `node_arcs` in the order each target
    /// node is discovered, not grouped by source level: `b`'s high-edge
    /// arc is written while level 3 is being swept (since `d0` lives
    /// there), so if that arc is dequeued from the level-3 work before
    /// `root`'s own level-3 arc, the two end up adjacent in write order
    /// with `root.low -> b` sandwiched *after* them rather than next to
    /// `root`'s other arc. This test pushes arcs in exactly that order
    /// and checks Reduce still finds both of `b`'s edges.
    #[test]
    fn reduces_level_skipping_arcs_out_of_source_order() {
        let cfg = EngineConfig::new(4);
        let mut bld = ArcFileBuilder::new(Backing::Memory).unwrap();

        let root = v(0);
        let b = v(1);
        let d0 = Ptr::make_internal(3, 0);
        let d1 = Ptr::make_internal(3, 1);

        // Write order mirrors product construction: root's low-edge node
        // arc first (b is discovered while sweeping level 1), then b's
        // high-edge node arc (d0, discovered first while sweeping level
        // 3), then root's own high-edge node arc (d1, discovered second
        // at level 3).
        bld.push_node_arc(Arc::new(root, b)).unwrap();
        bld.push_sink_arc(Arc::new(b, Ptr::make_sink(false))).unwrap();
        bld.push_node_arc(Arc::new(b.flag(), d0)).unwrap();
        bld.push_sink_arc(Arc::new(d0, Ptr::make_sink(false))).unwrap();
        bld.push_sink_arc(Arc::new(d0.flag(), Ptr::make_sink(true))).unwrap();
        bld.push_node_arc(Arc::new(root.flag(), d1)).unwrap();
        bld.push_sink_arc(Arc::new(d1, Ptr::make_sink(false))).unwrap();
        bld.push_sink_arc(Arc::new(d1.flag(), Ptr::make_sink(true))).unwrap();

        let arcs = bld.finish(Backing::Memory).unwrap();
        let (node_file, stats) = reduce(&arcs, Policy::Bdd, &cfg).unwrap();

        // d0 and d1 have identical (low, high) and collapse via rule 2.
        assert_eq!(stats.rule2_removed, 1);
        assert_eq!(node_file.meta.node_count, 3);

        let mut nodes = node_file.nodes.open().unwrap();
        let deep = nodes.pull().unwrap();
        assert_eq!(deep.uid.level_of(), 3);
        assert_eq!(deep.low, Ptr::make_sink(false));
        assert_eq!(deep.high, Ptr::make_sink(true));

        let mid = nodes.pull().unwrap();
        assert_eq!(mid.uid.level_of(), 1);
        assert_eq!(mid.low, Ptr::make_sink(false));
        assert_eq!(mid.high, deep.uid);

        let top = nodes.pull().unwrap();
        assert_eq!(top.uid.level_of(), 0);
        assert_eq!(top.low, mid.uid);
        assert_eq!(top.high, deep.uid);
    }

    #[test]
    fn unresolved_target_is_malformed() {
        let cfg = EngineConfig::new(1);
        let mut b = ArcFileBuilder::new(Backing::Memory).unwrap();
        b.push_node_arc(Arc::new(v(0), Ptr::make_internal(1, 7)))
            .unwrap();
        b.push_sink_arc(Arc::new(v(0).flag(), Ptr::make_sink(true)))
            .unwrap();
        let arcs = b.finish(Backing::Memory).unwrap();

        let err = reduce(&arcs, Policy::Bdd, &cfg).unwrap_err();
        assert!(matches!(err, BddError::MalformedArcFile(_)));
    }
}
