/// One entry of a substitution/restriction side stream: fix `level` to
/// `value`. Assignments are tiny relative to the node/arc files they act
/// on, so the side stream is just a sorted slice rather than a backing
/// file — it is not itself an external-memory structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub level: u64,
    pub value: bool,
}

impl Assignment {
    pub fn new(level: u64, value: bool) -> Self {
        Self { level, value }
    }
}
