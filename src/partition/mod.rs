//! Communication-free ownership of integer id spaces.
//!
//! Every rank can compute anyone's owner without exchanging a single message:
//! the partition layout is a pure function of `(nb_objects, nb_parts,
//! nb_ranks)`, so all ranks agree by construction.

mod composite;
mod partition_map;

pub use composite::CompositePartitionMap;
pub use partition_map::PartitionMap;
