//! External-memory BDD engine core.
//!
//! Layered bottom-up, each module named after the component it implements:
//! pointer/sink encoding and error/record types live in `bdd-types`; this
//! crate builds the sorted stream store (`store`), the levelized priority
//! queue (`lpq`), typed node/arc files (`files`), per-level node lookup
//! (`cursor`), Reduce (`reduce`), the policy layer (`policy`), product
//! construction (`product`), the handle API (`handle`), and the reorder
//! stub (`reorder`) on top of it.

pub mod config;
pub mod cursor;
pub mod files;
pub mod handle;
pub mod lpq;
pub mod policy;
pub mod product;
pub mod reduce;
pub mod reorder;
pub mod store;

pub use config::EngineConfig;
pub use handle::Handle;
pub use policy::{Op, Policy};
pub use reorder::reorder;
