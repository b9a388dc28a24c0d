//! Rank-consistent global numbering through content-hash identity matching.
//!
//! Each rank builds its mesh fragment with purely local indices; this pass
//! assigns one shared, collision-free global id space. Ownership is decided
//! by the externally supplied rank arrays; the protocol only distributes ids:
//!
//! 1. every rank fingerprints its local entities ([`hashing`]),
//! 2. owned counts are all-gathered and prefix-summed into per-rank start
//!    offsets, owned entities get sequential ids from their rank's offset,
//! 3. each rank in turn broadcasts its owned `(hash, id)` pairs; holders of
//!    an unresolved copy adopt the id and record the broadcasting rank as the
//!    owner.
//!
//! The round-robin order makes the resolution deterministic: rank `r`'s data
//! takes canonical precedence exactly once, as root of round `r`.
//!
//! Hash equality is treated as identity. A collision between genuinely
//! distinct entities is not detected here beyond the duplicate check on
//! locally-held pairs; see DESIGN.md for the rationale.

pub mod hashing;

use crate::comm::collective::{all_gather_v, broadcast};
use crate::comm::communicator::{CommTag, Communicator};
use crate::comm::wire::{WireId, WireIdentity};
use crate::error::MeshHaloError;
use crate::mesh::{INVALID_GID, MeshPart, NodeSet};
use hashbrown::HashMap;

/// Resolved identity of one entity kind's local entities.
struct Resolution {
    gids: Vec<u64>,
    owners: Vec<usize>,
}

/// Assign global ids and owners to every node of `nodes`, in place.
///
/// Ownership input: `nodes.rank(n) == comm.rank()` marks the nodes this rank
/// owns; every other node must be owned by the rank holding the bit-identical
/// coordinate copy.
///
/// The tag namespace must leave `2 * comm.size() + 2` sub-tags free.
pub fn number_nodes<C: Communicator>(
    nodes: &mut NodeSet,
    comm: &C,
    tag: CommTag,
) -> Result<(), MeshHaloError> {
    let hashes: Vec<u64> = (0..nodes.len())
        .map(|n| nodes.coordinates(n).map(|c| hashing::hash_coords(&c)))
        .collect::<Result<_, _>>()?;
    let owned: Vec<bool> = nodes
        .ranks()
        .iter()
        .map(|&r| r == comm.rank())
        .collect();

    let res = resolve_identities("node", &hashes, &owned, comm, tag)?;
    for n in 0..nodes.len() {
        nodes.set_glb_idx(n, res.gids[n])?;
        nodes.set_rank(n, res.owners[n])?;
    }
    Ok(())
}

/// Assign global ids and owners to every element of every set, in place.
///
/// Elements hash their node coordinates in connectivity order, so the two
/// copies of a ghost element fingerprint identically on both ranks. The
/// element id space is contiguous across sets: each rank's owned elements
/// are numbered in `(set, element)` order from the rank's offset.
pub fn number_elements<C: Communicator>(
    mesh: &mut MeshPart,
    comm: &C,
    tag: CommTag,
) -> Result<(), MeshHaloError> {
    let mut hashes = Vec::new();
    let mut owned = Vec::new();
    let mut slots = Vec::new();
    for (set_id, set) in mesh.element_sets() {
        for e in 0..set.len() {
            let coords = set
                .node_connectivity(e)?
                .iter()
                .map(|&n| mesh.nodes.coordinates(n))
                .collect::<Result<Vec<_>, _>>()?;
            hashes.push(hashing::hash_coord_sequence(coords));
            owned.push(set.rank(e)? == comm.rank());
            slots.push((set_id, e));
        }
    }

    let res = resolve_identities("element", &hashes, &owned, comm, tag)?;
    for (i, &(set_id, e)) in slots.iter().enumerate() {
        let set = mesh.element_set_mut(set_id)?;
        set.set_glb_idx(e, res.gids[i])?;
        set.set_rank(e, res.owners[i])?;
    }
    Ok(())
}

/// The shared resolution protocol over one entity kind.
fn resolve_identities<C: Communicator>(
    kind: &'static str,
    hashes: &[u64],
    owned: &[bool],
    comm: &C,
    tag: CommTag,
) -> Result<Resolution, MeshHaloError> {
    let my_rank = comm.rank();

    // Local fingerprint -> local index. Two locally-held entities sharing a
    // fingerprint signal degenerate geometry or a duplicate insertion.
    let mut local: HashMap<u64, usize> = HashMap::with_capacity(hashes.len());
    for (i, &h) in hashes.iter().enumerate() {
        if let Some(first) = local.insert(h, i) {
            #[cfg(any(debug_assertions, feature = "check-invariants"))]
            return Err(MeshHaloError::DuplicateIdentity {
                key: h,
                first,
                second: i,
            });
            #[cfg(not(any(debug_assertions, feature = "check-invariants")))]
            let _ = first;
        }
    }

    // Owned counts -> per-rank start offsets by prefix sum.
    let owned_count = owned.iter().filter(|&&o| o).count() as u64;
    let counts = all_gather_v(comm, &[WireId::of(owned_count)], tag)?;
    let start: u64 = counts[..my_rank]
        .iter()
        .map(|c| c.first().map(WireId::get).unwrap_or(0))
        .sum();

    let mut gids = vec![INVALID_GID; hashes.len()];
    let mut owners = vec![usize::MAX; hashes.len()];
    let mut next = start;
    for i in 0..hashes.len() {
        if owned[i] {
            gids[i] = next;
            owners[i] = my_rank;
            next += 1;
        }
    }

    // Round-robin roots: every rank's owned pairs take precedence exactly once.
    for root in 0..comm.size() {
        let pairs: Vec<WireIdentity> = if my_rank == root {
            (0..hashes.len())
                .filter(|&i| owned[i])
                .map(|i| WireIdentity::new(hashes[i], gids[i]))
                .collect()
        } else {
            Vec::new()
        };
        let received = broadcast(comm, root, &pairs, CommTag(tag.offset(2 + 2 * root as u16)))?;
        if my_rank == root {
            continue;
        }
        let mut adopted = 0usize;
        for ident in &received {
            if let Some(&i) = local.get(&ident.hash()) {
                if !owned[i] && gids[i] == INVALID_GID {
                    gids[i] = ident.gid();
                    owners[i] = root;
                    adopted += 1;
                }
            }
        }
        log::debug!("{kind} numbering: adopted {adopted} ids from rank {root}");
    }

    if let Some(index) = gids.iter().position(|&g| g == INVALID_GID) {
        return Err(MeshHaloError::UnresolvedEntity { kind, index });
    }
    Ok(Resolution { gids, owners })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::communicator::NoComm;
    use crate::mesh::NodeSet;

    #[test]
    fn serial_numbering_is_sequential() {
        let mut nodes = NodeSet::new();
        for x in 0..5 {
            let n = nodes.add_node([x as f64, 0.0, 0.0]);
            nodes.set_rank(n, 0).unwrap();
        }
        number_nodes(&mut nodes, &NoComm, CommTag(0x0300)).unwrap();
        assert_eq!(nodes.global_ids(), &[0, 1, 2, 3, 4]);
        assert!(nodes.ranks().iter().all(|&r| r == 0));
    }

    #[test]
    fn serial_ghost_without_owner_fails() {
        let mut nodes = NodeSet::new();
        let n = nodes.add_node([0.0; 3]);
        nodes.set_rank(n, 1).unwrap(); // nobody owns rank 1 in a serial run
        assert!(matches!(
            number_nodes(&mut nodes, &NoComm, CommTag(0x0310)),
            Err(MeshHaloError::UnresolvedEntity {
                kind: "node",
                index: 0
            })
        ));
    }

    #[test]
    fn duplicate_local_hash_detected() {
        let mut nodes = NodeSet::new();
        for _ in 0..2 {
            let n = nodes.add_node([1.0, 2.0, 3.0]);
            nodes.set_rank(n, 0).unwrap();
        }
        assert!(matches!(
            number_nodes(&mut nodes, &NoComm, CommTag(0x0320)),
            Err(MeshHaloError::DuplicateIdentity { .. })
        ));
    }
}
