//! # mesh-halo
//!
//! mesh-halo is a Rust library for the distributed-topology side of mesh
//! management in scientific computing and PDE codes: buffered connectivity
//! tables, partition-consistent global numbering, face-cell connectivity
//! derivation (including faces matched across partition interfaces), and
//! one-hop growth of the ghost/overlap layer of a partitioned mesh.
//!
//! ## Features
//! - [`BufferedTable`](topology::buffered_table::BufferedTable): variable-arity
//!   connectivity rows with write-behind mutation and explicit `flush()`
//! - [`FlatIndex`](topology::flat_index::FlatIndex): one contiguous index space
//!   over several independently-sized entity shards
//! - [`PartitionMap`](partition::PartitionMap) and
//!   [`CompositePartitionMap`](partition::CompositePartitionMap):
//!   communication-free ownership of integer id spaces
//! - [`faces`]: face-cell connectivity within a region and face matching
//!   across regions and partition interfaces
//! - [`numbering`]: content-hash based global ids, consistent across ranks
//! - [`overlap`]: request/response growth of the ghost layer
//! - Pluggable communication backends (serial, in-process loopback, MPI)
//!
//! ## Determinism
//!
//! Every cross-rank protocol in this crate is deterministic: entity hashes use
//! a fixed combine function, broadcast rounds visit roots in rank order, and
//! all staged-mutation containers preserve insertion order across `flush()`.
//!
//! ## Rank context
//!
//! There is no global "current rank" state. Each component receives a
//! [`Communicator`](comm::communicator::Communicator) value carrying rank and
//! size, so tests can run several ranks inside one process over the loopback
//! transport.

pub mod comm;
pub mod debug_invariants;
pub mod error;
pub mod faces;
pub mod mesh;
pub mod numbering;
pub mod overlap;
pub mod partition;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::comm::collective::{all_gather_v, all_to_all_v, broadcast};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::communicator::MpiComm;
    pub use crate::comm::communicator::{CommTag, Communicator, LoopbackComm, NoComm, Wait};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::error::MeshHaloError;
    pub use crate::faces::build::build_face_connectivity;
    pub use crate::faces::connectivity::{FaceCellConnectivity, UNKNOWN_CELL};
    pub use crate::faces::matching::{FaceMatch, FaceOrientation, match_boundary, match_faces};
    pub use crate::mesh::{ElementSet, EntityKind, INVALID_GID, MeshPart, NodeSet};
    pub use crate::numbering::{number_elements, number_nodes};
    pub use crate::overlap::grow_overlap;
    pub use crate::partition::{CompositePartitionMap, PartitionMap};
    pub use crate::topology::buffered_table::{BufferedTable, Staged};
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::flat_index::FlatIndex;
}
