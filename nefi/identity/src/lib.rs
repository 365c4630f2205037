//! The per-node identity cache (spec §4.2): mirrors cluster workload state
//! and resolves an IP to `{pod, namespace, workload, workload_kind,
//! service}` on the hot path.

pub mod error;
pub mod rs_cache;
pub mod table;
pub mod watch;
pub mod workload;

pub use error::IdentityError;
pub use table::IdentityTable;
pub use watch::IdentityCache;
pub use workload::{resolve_workload, OwnerRef, ReplicaSetLookup, Workload};
