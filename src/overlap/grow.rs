//! Request/response protocol growing the ghost layer by one hop.
//!
//! One invocation runs two exchange rounds over the blocking collectives:
//!
//! 1. every rank gathers every other rank's boundary-node ids, serves the
//!    owned elements incident to requested nodes it holds, and stages the
//!    elements it receives (filtered by global-id presence, so duplicate
//!    deliveries are idempotent),
//! 2. node gids introduced by the new elements are fetched the same way
//!    (identity, owner and coordinates), then every staged element row is
//!    remapped from global to local node indices and committed.
//!
//! Callers needing a deeper overlap invoke this repeatedly; with no new
//! elements available anywhere the call is a fixed point.

use crate::comm::collective::{all_gather_v, all_to_all_v};
use crate::comm::communicator::{CommTag, Communicator};
use crate::comm::wire::{ElementRecord, WireId, WireNodeRecord, pack_element, unpack_elements};
use crate::error::MeshHaloError;
use crate::faces::build::build_face_connectivity;
use crate::mesh::{INVALID_GID, MeshPart};
use crate::topology::buffered_table::Staged;
use hashbrown::HashSet;
use std::collections::BTreeSet;

// Sub-tag layout inside the caller's namespace; each collective consumes two.
const TAG_ELEM_REQUEST: u16 = 0;
const TAG_ELEM_REPLY: u16 = 2;
const TAG_NODE_REQUEST: u16 = 4;
const TAG_NODE_REPLY: u16 = 6;

/// Cache mapping node global ids to the owned elements incident to them,
/// reusable across growth rounds of one topology state.
#[derive(Clone, Debug, Default)]
pub struct NodeElementConnectivity {
    map: hashbrown::HashMap<u64, Vec<(usize, usize)>>,
}

impl NodeElementConnectivity {
    /// Scan every element set and index the elements owned by `my_rank`
    /// under the global ids of their nodes.
    ///
    /// # Errors
    /// [`MeshHaloError::SetupError`] when a node lacks a global id; run the
    /// global numbering first.
    pub fn build(mesh: &MeshPart, my_rank: usize) -> Result<Self, MeshHaloError> {
        let mut map: hashbrown::HashMap<u64, Vec<(usize, usize)>> = hashbrown::HashMap::new();
        for (set_id, set) in mesh.element_sets() {
            for e in 0..set.len() {
                if set.rank(e)? != my_rank {
                    continue;
                }
                for &n in set.node_connectivity(e)? {
                    let gid = mesh.nodes.glb_idx(n)?;
                    if gid == INVALID_GID {
                        return Err(MeshHaloError::SetupError(
                            "number nodes before growing the overlap",
                        ));
                    }
                    map.entry(gid).or_default().push((set_id, e));
                }
            }
        }
        Ok(Self { map })
    }

    /// Owned elements incident to the node with global id `gid`.
    pub fn elements_for(&self, gid: u64) -> &[(usize, usize)] {
        self.map.get(&gid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Grow this rank's ghost layer by one hop, in place.
///
/// Mutates the element sets (adds ghost elements) and the node set (adds
/// ghost nodes) of `mesh`; derived topology such as face connectivity must be
/// rebuilt by the caller afterwards. Element-set arena layouts must agree
/// across ranks.
///
/// The tag namespace must leave 8 sub-tags free.
pub fn grow_overlap<C: Communicator>(
    mesh: &mut MeshPart,
    comm: &C,
    tag: CommTag,
) -> Result<(), MeshHaloError> {
    if comm.is_no_comm() || comm.size() <= 1 {
        return Ok(());
    }
    let my_rank = comm.rank();

    // 1) Boundary node set, as global ids, in deterministic order.
    let cell_sets = mesh.cell_sets();
    if cell_sets.is_empty() {
        return Err(MeshHaloError::SetupError("mesh has no cell sets"));
    }
    let fc = build_face_connectivity(mesh, &cell_sets)?;
    let mut boundary_gids: BTreeSet<u64> = BTreeSet::new();
    for f in 0..fc.len() {
        if !fc.is_boundary(f)? {
            continue;
        }
        for &n in fc.face_nodes(f)? {
            let gid = mesh.nodes.glb_idx(n)?;
            if gid == INVALID_GID {
                return Err(MeshHaloError::SetupError(
                    "number nodes before growing the overlap",
                ));
            }
            boundary_gids.insert(gid);
        }
    }
    let my_request: Vec<WireId> = boundary_gids.iter().map(|&g| WireId::of(g)).collect();

    // 2) Everyone learns everyone's boundary-node requests.
    let requests = all_gather_v(comm, &my_request, CommTag(tag.offset(TAG_ELEM_REQUEST)))?;

    // 3) Serve requested nodes from the owned-element cache.
    let cache = NodeElementConnectivity::build(mesh, my_rank)?;
    let mut elem_sends: Vec<Vec<WireId>> = vec![Vec::new(); comm.size()];
    for (peer, request) in requests.iter().enumerate() {
        if peer == my_rank {
            continue;
        }
        let mut queued: HashSet<u64> = HashSet::new();
        for gid in request.iter().map(WireId::get) {
            for &(set_id, e) in cache.elements_for(gid) {
                let set = mesh.element_set(set_id)?;
                let egid = set.glb_idx(e)?;
                if egid == INVALID_GID {
                    return Err(MeshHaloError::SetupError(
                        "number elements before growing the overlap",
                    ));
                }
                // The requester certainly holds its own elements already.
                if set.rank(e)? == peer || !queued.insert(egid) {
                    continue;
                }
                pack_element(
                    &mut elem_sends[peer],
                    &ElementRecord {
                        set: set_id,
                        gid: egid,
                        rank: set.rank(e)?,
                        node_gids: mesh.element_node_gids(set_id, e)?,
                    },
                );
            }
        }
    }

    // 4) Exchange and stage the replies, filtering already-known elements.
    let replies = all_to_all_v(comm, &elem_sends, CommTag(tag.offset(TAG_ELEM_REPLY)))?;
    let known_elements = mesh.element_gid_set();
    let mut arrived: HashSet<u64> = HashSet::new();
    let mut staged: Vec<(usize, Staged, Vec<u64>)> = Vec::new();
    for (peer, stream) in replies.iter().enumerate() {
        if peer == my_rank {
            continue;
        }
        for record in unpack_elements(stream, peer)? {
            if known_elements.contains(&record.gid) || !arrived.insert(record.gid) {
                continue;
            }
            if record.set >= mesh.nb_element_sets() {
                return Err(MeshHaloError::CommError {
                    neighbor: peer,
                    source: format!("unknown element set {} in reply", record.set),
                });
            }
            let row: Vec<usize> = record.node_gids.iter().map(|&g| g as usize).collect();
            let handle = mesh
                .element_set_mut(record.set)?
                .stage_remote_element(row, record.gid, record.rank)?;
            staged.push((record.set, handle, record.node_gids));
        }
    }

    // 5) Node gids the new elements introduced.
    let node_map = mesh.nodes.global_index_map()?;
    let needed: BTreeSet<u64> = staged
        .iter()
        .flat_map(|(_, _, gids)| gids.iter().copied())
        .filter(|g| !node_map.contains_key(g))
        .collect();
    let my_node_request: Vec<WireId> = needed.iter().map(|&g| WireId::of(g)).collect();

    // 6) Fetch the missing ghost nodes from their owners.
    let node_requests = all_gather_v(comm, &my_node_request, CommTag(tag.offset(TAG_NODE_REQUEST)))?;
    let mut node_sends: Vec<Vec<WireNodeRecord>> = vec![Vec::new(); comm.size()];
    for (peer, request) in node_requests.iter().enumerate() {
        if peer == my_rank {
            continue;
        }
        for gid in request.iter().map(WireId::get) {
            if let Some(&n) = node_map.get(&gid) {
                if mesh.nodes.rank(n)? == my_rank {
                    node_sends[peer].push(WireNodeRecord::new(
                        gid,
                        my_rank,
                        mesh.nodes.coordinates(n)?,
                    ));
                }
            }
        }
    }
    let node_replies = all_to_all_v(comm, &node_sends, CommTag(tag.offset(TAG_NODE_REPLY)))?;
    let mut added: HashSet<u64> = HashSet::new();
    for (peer, records) in node_replies.iter().enumerate() {
        if peer == my_rank {
            continue;
        }
        for rec in records {
            if node_map.contains_key(&rec.gid()) || !added.insert(rec.gid()) {
                continue;
            }
            mesh.nodes.add_remote_node(rec.coord(), rec.gid(), rec.rank());
        }
    }
    if let Some(index) = needed.iter().position(|g| !added.contains(g)) {
        return Err(MeshHaloError::UnresolvedEntity {
            kind: "ghost node",
            index,
        });
    }

    // 7) Remap staged element rows from global to local node indices over the
    //    enlarged node set; a duplicated gid surfaces here as a hard error.
    let node_map = mesh.nodes.global_index_map()?;
    for (set_id, handle, node_gids) in &staged {
        let row: Vec<usize> = node_gids
            .iter()
            .map(|g| {
                node_map
                    .get(g)
                    .copied()
                    .ok_or(MeshHaloError::SetupError("ghost node missing after fetch"))
            })
            .collect::<Result<_, _>>()?;
        mesh.element_set_mut(*set_id)?
            .connectivity_mut()
            .set_row(handle.index(), &row)?;
    }
    mesh.flush_all()?;

    log::debug!(
        "overlap grown by {} elements and {} nodes on rank {my_rank}",
        staged.len(),
        added.len(),
    );
    Ok(())
}
