//! The levelized priority queue (component C): forwards recursion requests
//! across variable levels in ascending target order within a level, while
//! requests for deeper levels wait.
//!
//! Modeled as a generic over four axes: element type (`T`), level
//! projection (the [`Leveled`] trait), ordering (`T: Ord`), and backing
//! store (`Backing`, reusing the same choice component B's streams use)
//! — monomorphized generics rather than a trait-object policy, since
//! every method here is in the inner loop of product construction and
//! Reduce.

use crate::store::{Backing, Record, SealedStream, StreamReader, StreamWriter};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Elements pushed into an [`Lpq`] must be able to report which level they
/// are destined for — the queue's sole ordering key at the bucket
/// granularity; within a level, `T: Ord` breaks ties.
pub trait Leveled {
    fn target_level(&self) -> u64;
}

/// A handful of sealed runs, each individually ascending, merged lazily.
/// Once the in-memory hot set would exceed the configured spill
/// threshold, it is drained (ascending, since `BinaryHeap<Reverse<T>>`
/// pops smallest-first) into a new sealed run via the same sorted stream
/// store component B uses for node/arc files.
struct ExternalOverflow<T: Record + Leveled + Ord> {
    hot: BinaryHeap<Reverse<T>>,
    runs: Vec<StreamReader<T>>,
    spill_threshold: usize,
    backing: Backing,
    len: u64,
}

impl<T: Record + Leveled + Ord> ExternalOverflow<T> {
    fn new(backing: Backing, spill_threshold: usize) -> Self {
        Self {
            hot: BinaryHeap::new(),
            runs: Vec::new(),
            spill_threshold,
            backing,
            len: 0,
        }
    }

    fn push(&mut self, item: T) {
        self.hot.push(Reverse(item));
        self.len += 1;
        if matches!(self.backing, Backing::Disk) && self.hot.len() > self.spill_threshold {
            self.spill();
        }
    }

    fn spill(&mut self) {
        if self.hot.is_empty() {
            return;
        }
        let mut writer = StreamWriter::<T>::new(self.backing).expect("open overflow run");
        while let Some(Reverse(item)) = self.hot.pop() {
            writer.push(item).expect("write overflow run");
        }
        let sealed: SealedStream<T> = writer.seal().expect("seal overflow run");
        let reader = sealed.open().expect("open sealed overflow run");
        self.runs.push(reader);
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn peek_min(&mut self) -> Option<T> {
        let mut best: Option<T> = self.hot.peek().map(|Reverse(t)| *t);
        for run in &mut self.runs {
            if let Some(candidate) = run.peek() {
                best = Some(match best {
                    Some(b) if b <= candidate => b,
                    _ => candidate,
                });
            }
        }
        best
    }

    fn pop_min(&mut self) -> Option<T> {
        let min = self.peek_min()?;
        if self
            .hot
            .peek()
            .map(|Reverse(t)| t == &min)
            .unwrap_or(false)
        {
            self.hot.pop();
        } else {
            for run in &mut self.runs {
                if run.peek() == Some(min) {
                    run.pull();
                    break;
                }
            }
        }
        self.len -= 1;
        Some(min)
    }
}

/// One bucket: a small sorted structure holding every pending request
/// targeted at a single level, drained in ascending order by `T: Ord`.
struct Bucket<T: Ord> {
    items: BinaryHeap<Reverse<T>>,
}

impl<T: Ord> Bucket<T> {
    fn new() -> Self {
        Self {
            items: BinaryHeap::new(),
        }
    }

    fn push(&mut self, item: T) {
        self.items.push(Reverse(item));
    }

    fn peek(&self) -> Option<&T> {
        self.items.peek().map(|Reverse(t)| t)
    }

    fn pop(&mut self) -> Option<T> {
        self.items.pop().map(|Reverse(t)| t)
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The levelized priority queue itself.
///
/// `near_window` levels (given up front, from the union of input graphs'
/// level-info streams — see [`Lpq::new`]) get a dedicated in-memory
/// [`Bucket`]; everything targeted further out than the window overflows
/// into [`ExternalOverflow`] and is promoted into a bucket as the current
/// level advances past it.
pub struct Lpq<T: Record + Leveled + Ord> {
    buckets: HashMap<u64, Bucket<T>>,
    /// Number of levels allowed a dedicated bucket at once — a small,
    /// fixed number of near-future levels. Bounded so the queue's
    /// resident footprint does not grow with the number of distinct levels
    /// ever seen.
    window_capacity: usize,
    overflow: ExternalOverflow<T>,
    current_level: Option<u64>,
    len: u64,
    max_simultaneous_size: u64,
}

impl<T: Record + Leveled + Ord> Lpq<T> {
    /// `levels` is the union of levels that actually appear across the
    /// input graphs' level-info streams — only those levels get a bucket
    /// up front; the window capacity is fixed at their count (or 1, if
    /// none are known yet) and recycled as levels drain.
    pub fn new(mut levels: Vec<u64>, backing: Backing, spill_threshold: usize) -> Self {
        levels.sort_unstable();
        levels.dedup();
        let window_capacity = levels.len().max(1);
        let mut buckets = HashMap::new();
        for &l in &levels {
            buckets.insert(l, Bucket::new());
        }
        Self {
            buckets,
            window_capacity,
            overflow: ExternalOverflow::new(backing, spill_threshold),
            current_level: None,
            len: 0,
            max_simultaneous_size: 0,
        }
    }

    /// Parameterizes the queue over the *union* of levels harvested from
    /// however many input node streams' level-info substreams are
    /// available.
    pub fn hook_meta_streams<I>(level_infos: I, backing: Backing, spill_threshold: usize) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        Self::new(level_infos.into_iter().collect(), backing, spill_threshold)
    }

    pub fn current_level(&self) -> Option<u64> {
        self.current_level
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_simultaneous_size(&self) -> u64 {
        self.max_simultaneous_size
    }

    /// Accepts a request with arbitrary target level `>= current_level`.
    /// Pushing a request below the current level is a programmer-contract
    /// violation and panics.
    pub fn push(&mut self, item: T) {
        let level = item.target_level();
        if let Some(cur) = self.current_level {
            assert!(
                level >= cur,
                "LPQ push with level {level} below current level {cur}"
            );
        }
        if let Some(bucket) = self.buckets.get_mut(&level) {
            bucket.push(item);
        } else if self.buckets.len() < self.window_capacity {
            self.buckets.entry(level).or_insert_with(Bucket::new).push(item);
        } else {
            self.overflow.push(item);
        }
        self.len += 1;
        self.max_simultaneous_size = self.max_simultaneous_size.max(self.len);
    }

    /// True iff the current level's bucket has nothing left to pull.
    pub fn empty_level(&self) -> bool {
        match self.current_level {
            Some(l) => self.buckets.get(&l).map(Bucket::is_empty).unwrap_or(true),
            None => true,
        }
    }

    pub fn empty(&self) -> bool {
        self.is_empty()
    }

    /// Advances `current_level` to the smallest pending level across every
    /// bucket and the overflow store. Must be called whenever
    /// [`Self::empty_level`] is true and the queue is not fully empty.
    ///
    /// A three-step transition: (i) the just-drained current bucket's
    /// slot is freed, (ii) the window is refilled by peeling the
    /// overflow's minima into that slot, (iii) the bucket with the
    /// smallest assigned level becomes current.
    #[tracing::instrument(skip_all, fields(prev_level = ?self.current_level))]
    pub fn setup_next_level(&mut self) {
        self.buckets.retain(|_, b| !b.is_empty());
        self.refill_window_from_overflow();
        let next = self
            .buckets
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(&l, _)| l)
            .min();
        self.current_level = next;
        tracing::trace!(next_level = ?self.current_level, pending = self.len, "lpq advanced");
    }

    fn refill_window_from_overflow(&mut self) {
        while self.buckets.len() < self.window_capacity {
            let Some(item) = self.overflow.pop_min() else {
                break;
            };
            let level = item.target_level();
            self.buckets.entry(level).or_insert_with(Bucket::new).push(item);
            // drain every other overflow item already at this same level
            // while we're here, so the window does not immediately refill
            // with the same level again next transition.
            while self.overflow.peek_min().map(|p| p.target_level()) == Some(level) {
                let item = self.overflow.pop_min().expect("peeked item must pop");
                self.buckets.get_mut(&level).unwrap().push(item);
            }
        }
    }

    /// Smallest pending request in the current level, without consuming it.
    pub fn top(&self) -> Option<&T> {
        let l = self.current_level?;
        self.buckets.get(&l).and_then(Bucket::peek)
    }

    pub fn can_pull(&self) -> bool {
        self.top().is_some()
    }

    /// Pulls the smallest pending request in the current level. Pulls are
    /// monotone non-decreasing within a level by construction (`Bucket` is
    /// a min-heap over `T: Ord`).
    pub fn pull(&mut self) -> Option<T> {
        let l = self.current_level?;
        let item = self.buckets.get_mut(&l)?.pop();
        if item.is_some() {
            self.len -= 1;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Req {
        level: u64,
        key: u64,
    }

    impl PartialOrd for Req {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for Req {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.key.cmp(&other.key)
        }
    }
    impl Leveled for Req {
        fn target_level(&self) -> u64 {
            self.level
        }
    }
    impl Record for Req {
        const SIZE: usize = 16;
        fn encode(&self) -> Vec<u8> {
            let mut v = self.level.to_be_bytes().to_vec();
            v.extend_from_slice(&self.key.to_be_bytes());
            v
        }
        fn decode(bytes: &[u8]) -> Self {
            Req {
                level: u64::from_be_bytes(bytes[0..8].try_into().unwrap()),
                key: u64::from_be_bytes(bytes[8..16].try_into().unwrap()),
            }
        }
    }

    #[test]
    fn pulls_ascending_within_a_level() {
        let mut q = Lpq::<Req>::new(vec![0, 1], Backing::Memory, 4);
        q.push(Req { level: 0, key: 5 });
        q.push(Req { level: 0, key: 1 });
        q.push(Req { level: 0, key: 3 });
        q.setup_next_level();
        assert_eq!(q.current_level(), Some(0));
        assert_eq!(q.pull().unwrap().key, 1);
        assert_eq!(q.pull().unwrap().key, 3);
        assert_eq!(q.pull().unwrap().key, 5);
        assert!(q.empty_level());
    }

    #[test]
    fn level_transitions_promote_next_bucket() {
        let mut q = Lpq::<Req>::new(vec![0, 1, 2], Backing::Memory, 4);
        q.push(Req { level: 2, key: 0 });
        q.push(Req { level: 0, key: 0 });
        q.setup_next_level();
        assert_eq!(q.current_level(), Some(0));
        q.pull();
        q.setup_next_level();
        assert_eq!(q.current_level(), Some(2));
    }

    #[test]
    #[should_panic(expected = "below current level")]
    fn push_below_current_level_is_fatal() {
        let mut q = Lpq::<Req>::new(vec![0, 1], Backing::Memory, 4);
        q.push(Req { level: 1, key: 0 });
        q.setup_next_level();
        q.push(Req { level: 0, key: 0 });
    }

    #[test]
    fn external_overflow_spills_and_merges_in_order() {
        // The window only knows about level 0 up front, so every request
        // below targets a level with no dedicated bucket and must overflow;
        // setup_next_level then has to peel it back out of the overflow
        // store into a promoted bucket.
        let mut q = Lpq::<Req>::new(vec![0], Backing::Disk, 2);
        for key in [9, 1, 7, 2, 8, 0, 6, 3] {
            q.push(Req { level: 5, key });
        }
        q.setup_next_level();
        assert_eq!(q.current_level(), Some(5));
        let mut pulled = Vec::new();
        while let Some(r) = q.pull() {
            pulled.push(r.key);
        }
        assert_eq!(pulled, vec![0, 1, 2, 3, 6, 7, 8, 9]);
    }

    #[test]
    fn tracks_max_simultaneous_size() {
        let mut q = Lpq::<Req>::new(vec![0], Backing::Memory, 8);
        q.push(Req { level: 0, key: 0 });
        q.push(Req { level: 0, key: 1 });
        q.setup_next_level();
        q.pull();
        assert_eq!(q.max_simultaneous_size(), 2);
    }
}
