//! Variable reordering: an entry point exists so the rest of the
//! workspace can depend on a stable interface, but a real implementation
//! (sifting, or any other reordering heuristic) is an open research
//! problem in the external-memory setting this engine targets — swapping
//! adjacent levels cheaply requires machinery (a transposition pass over
//! both the moved level and everything referencing it) this crate does
//! not yet have. Left unimplemented rather than guessed at.

use bdd_types::BddError;

use crate::handle::Handle;

/// Would reorder `handle`'s variables to `new_order` (a permutation of
/// `0..var_count`) and return an equivalent handle over the new order.
/// Unimplemented; see the module docs.
pub fn reorder(_handle: &Handle, _new_order: &[u64]) -> Result<Handle, BddError> {
    unimplemented!("variable reordering is an open research problem, not implemented here")
}
