//! `MeshHaloError`: unified error type for mesh-halo public APIs.
//!
//! All failures surface immediately at the call site; there is no cross-rank
//! failure propagation. A rank that errors out of a collective protocol will
//! stall its peers at their next synchronization point, which is a documented
//! limitation of the blocking communication model, not a handled failure mode.

use thiserror::Error;

/// Unified error type for mesh-halo operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshHaloError {
    /// Index past the allocated range of a table or index space.
    #[error("index {index} out of range (allocated size {len})")]
    OutOfRange { index: usize, len: usize },

    /// Read of a committed row that has been marked removed.
    #[error("row {index} has been removed; flush() before reuse")]
    RowRemoved { index: usize },

    /// Read of a staged (uncommitted) row through the committed-row accessor.
    #[error("row {index} is staged but not flushed; use staged_row() or flush() first")]
    RowNotFlushed { index: usize },

    /// Two locally-held entities resolved to the same identity key.
    #[error("duplicate entity identity {key:#x}: held by local entities {first} and {second}")]
    DuplicateIdentity {
        key: u64,
        first: usize,
        second: usize,
    },

    /// An entity could not be resolved to a global id or owner after the
    /// full round-robin of resolution rounds.
    #[error("{kind} {index} left unresolved after identity exchange")]
    UnresolvedEntity { kind: &'static str, index: usize },

    /// A boundary patch face found no coinciding interior face.
    #[error("boundary face of element {element} matches no interior face")]
    UnmatchedBoundary { element: usize },

    /// A required prerequisite was not satisfied before the call.
    #[error("setup error: {0}")]
    SetupError(&'static str),

    /// Deliberately unsupported operation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A point-to-point exchange with a neighbor rank failed or produced a
    /// malformed payload.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError { neighbor: usize, source: String },

    /// A cell type has no face with the requested number.
    #[error("cell type {cell_type} has no face number {face_nb}")]
    InvalidFaceNumber { cell_type: &'static str, face_nb: u32 },

    /// Invalid partition layout parameters.
    #[error("invalid partition layout: {0}")]
    PartitionLayout(&'static str),
}
