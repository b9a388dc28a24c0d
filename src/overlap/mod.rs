//! One-hop growth of the ghost/overlap layer of a partitioned mesh.

mod grow;

pub use grow::{NodeElementConnectivity, grow_overlap};
