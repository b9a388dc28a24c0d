//! Local mesh fragment model: node data, element sets and the arena that owns
//! them.
//!
//! A [`MeshPart`] is one rank's fragment of a distributed mesh. It owns one
//! [`NodeSet`] (coordinates plus per-node owner rank and global id) and an
//! arena of [`ElementSet`]s referenced by plain `usize` ids. Cross-references
//! between components are integer indices into this arena, never pointers.

use crate::error::MeshHaloError;
use crate::topology::buffered_table::{BufferedTable, Staged};
use crate::topology::cell_type::CellType;
use itertools::izip;

/// Sentinel for a global id that has not been assigned yet.
pub const INVALID_GID: u64 = u64::MAX;

/// Sentinel for an owner rank that has not been assigned yet.
pub const NO_OWNER: usize = usize::MAX;

/// The closed set of entity kinds a mesh part stores.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityKind {
    /// Elements of the mesh dimension.
    Cells,
    /// Elements one dimension below the mesh.
    Faces,
    /// 1D elements inside a 3D mesh.
    Edges,
    /// 0D elements.
    Points,
}

impl EntityKind {
    /// Classify a cell dimension relative to the mesh dimension.
    pub fn of(cell_dim: u8, mesh_dim: u8) -> EntityKind {
        if cell_dim == mesh_dim {
            EntityKind::Cells
        } else if cell_dim == 0 {
            EntityKind::Points
        } else if cell_dim + 1 == mesh_dim {
            EntityKind::Faces
        } else {
            EntityKind::Edges
        }
    }
}

/// Per-node geometry and distribution data of one mesh fragment.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeSet {
    coords: Vec<[f64; 3]>,
    global_ids: Vec<u64>,
    ranks: Vec<usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes held on this rank, owned and ghost.
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Append a node with unassigned global id and owner.
    pub fn add_node(&mut self, coord: [f64; 3]) -> usize {
        self.coords.push(coord);
        self.global_ids.push(INVALID_GID);
        self.ranks.push(NO_OWNER);
        self.coords.len() - 1
    }

    /// Append a node received from another rank, with its identity resolved.
    pub fn add_remote_node(&mut self, coord: [f64; 3], gid: u64, rank: usize) -> usize {
        self.coords.push(coord);
        self.global_ids.push(gid);
        self.ranks.push(rank);
        self.coords.len() - 1
    }

    pub fn coordinates(&self, n: usize) -> Result<[f64; 3], MeshHaloError> {
        self.coords
            .get(n)
            .copied()
            .ok_or(MeshHaloError::OutOfRange {
                index: n,
                len: self.coords.len(),
            })
    }

    pub fn rank(&self, n: usize) -> Result<usize, MeshHaloError> {
        self.ranks.get(n).copied().ok_or(MeshHaloError::OutOfRange {
            index: n,
            len: self.ranks.len(),
        })
    }

    pub fn glb_idx(&self, n: usize) -> Result<u64, MeshHaloError> {
        self.global_ids
            .get(n)
            .copied()
            .ok_or(MeshHaloError::OutOfRange {
                index: n,
                len: self.global_ids.len(),
            })
    }

    /// A node is a ghost when it is owned by another rank.
    pub fn is_ghost(&self, n: usize, my_rank: usize) -> Result<bool, MeshHaloError> {
        Ok(self.rank(n)? != my_rank)
    }

    pub fn set_rank(&mut self, n: usize, rank: usize) -> Result<(), MeshHaloError> {
        let len = self.ranks.len();
        *self
            .ranks
            .get_mut(n)
            .ok_or(MeshHaloError::OutOfRange { index: n, len })? = rank;
        Ok(())
    }

    pub fn set_glb_idx(&mut self, n: usize, gid: u64) -> Result<(), MeshHaloError> {
        let len = self.global_ids.len();
        *self
            .global_ids
            .get_mut(n)
            .ok_or(MeshHaloError::OutOfRange { index: n, len })? = gid;
        Ok(())
    }

    pub fn global_ids(&self) -> &[u64] {
        &self.global_ids
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Iterate `(coord, global id, rank)` per node.
    pub fn iter(&self) -> impl Iterator<Item = ([f64; 3], u64, usize)> + '_ {
        izip!(&self.coords, &self.global_ids, &self.ranks).map(|(&c, &g, &r)| (c, g, r))
    }

    /// Map assigned global ids back to local indices.
    ///
    /// # Errors
    /// [`MeshHaloError::DuplicateIdentity`] when two local nodes carry the
    /// same global id, which signals a duplicate insertion upstream.
    pub fn global_index_map(&self) -> Result<hashbrown::HashMap<u64, usize>, MeshHaloError> {
        let mut map = hashbrown::HashMap::with_capacity(self.global_ids.len());
        for (n, &gid) in self.global_ids.iter().enumerate() {
            if gid == INVALID_GID {
                continue;
            }
            if let Some(first) = map.insert(gid, n) {
                return Err(MeshHaloError::DuplicateIdentity {
                    key: gid,
                    first,
                    second: n,
                });
            }
        }
        Ok(map)
    }
}

/// One homogeneous set of elements: connectivity rows plus per-element
/// distribution data.
///
/// Connectivity is buffered; metadata vectors grow immediately on staging.
/// The set never removes elements, so after every [`flush`](Self::flush) the
/// metadata index `e` and the committed connectivity row `e` refer to the
/// same element.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ElementSet {
    cell_type: CellType,
    connectivity: BufferedTable<usize>,
    global_ids: Vec<u64>,
    ranks: Vec<usize>,
}

impl ElementSet {
    pub fn new(cell_type: CellType) -> Self {
        Self {
            cell_type,
            connectivity: BufferedTable::new(),
            global_ids: Vec::new(),
            ranks: Vec::new(),
        }
    }

    #[inline]
    pub fn element_type(&self) -> CellType {
        self.cell_type
    }

    /// Number of committed elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.connectivity.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connectivity.is_empty()
    }

    /// Number of elements including staged ones.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.global_ids.len()
    }

    /// Stage a locally-built element. Node indices are local to the owning
    /// [`NodeSet`].
    pub fn add_element(&mut self, nodes: Vec<usize>) -> Result<Staged, MeshHaloError> {
        if nodes.len() != self.cell_type.vertex_count() {
            return Err(MeshHaloError::SetupError(
                "element connectivity length does not match cell type",
            ));
        }
        self.global_ids.push(INVALID_GID);
        self.ranks.push(NO_OWNER);
        Ok(self.connectivity.add_row(nodes))
    }

    /// Stage an element received from another rank. The connectivity row
    /// holds *global* node ids until the caller remaps it to local indices.
    pub fn stage_remote_element(
        &mut self,
        node_gids: Vec<usize>,
        gid: u64,
        rank: usize,
    ) -> Result<Staged, MeshHaloError> {
        if node_gids.len() != self.cell_type.vertex_count() {
            return Err(MeshHaloError::SetupError(
                "element connectivity length does not match cell type",
            ));
        }
        self.global_ids.push(gid);
        self.ranks.push(rank);
        Ok(self.connectivity.add_row(node_gids))
    }

    /// Committed node connectivity of element `e`.
    pub fn node_connectivity(&self, e: usize) -> Result<&[usize], MeshHaloError> {
        self.connectivity.row(e)
    }

    pub fn rank(&self, e: usize) -> Result<usize, MeshHaloError> {
        self.ranks.get(e).copied().ok_or(MeshHaloError::OutOfRange {
            index: e,
            len: self.ranks.len(),
        })
    }

    pub fn glb_idx(&self, e: usize) -> Result<u64, MeshHaloError> {
        self.global_ids
            .get(e)
            .copied()
            .ok_or(MeshHaloError::OutOfRange {
                index: e,
                len: self.global_ids.len(),
            })
    }

    pub fn is_ghost(&self, e: usize, my_rank: usize) -> Result<bool, MeshHaloError> {
        Ok(self.rank(e)? != my_rank)
    }

    pub fn set_rank(&mut self, e: usize, rank: usize) -> Result<(), MeshHaloError> {
        let len = self.ranks.len();
        *self
            .ranks
            .get_mut(e)
            .ok_or(MeshHaloError::OutOfRange { index: e, len })? = rank;
        Ok(())
    }

    pub fn set_glb_idx(&mut self, e: usize, gid: u64) -> Result<(), MeshHaloError> {
        let len = self.global_ids.len();
        *self
            .global_ids
            .get_mut(e)
            .ok_or(MeshHaloError::OutOfRange { index: e, len })? = gid;
        Ok(())
    }

    pub fn global_ids(&self) -> &[u64] {
        &self.global_ids
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    pub fn connectivity(&self) -> &BufferedTable<usize> {
        &self.connectivity
    }

    pub fn connectivity_mut(&mut self) -> &mut BufferedTable<usize> {
        &mut self.connectivity
    }

    /// Commit staged elements.
    ///
    /// # Errors
    /// [`MeshHaloError::SetupError`] when connectivity and metadata lengths
    /// disagree after the flush, which means a row was removed out of band.
    pub fn flush(&mut self) -> Result<usize, MeshHaloError> {
        let n = self.connectivity.flush();
        if n != self.global_ids.len() || n != self.ranks.len() {
            return Err(MeshHaloError::SetupError(
                "element metadata out of step with connectivity",
            ));
        }
        Ok(n)
    }
}

/// One rank's fragment of a distributed mesh.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MeshPart {
    dimension: u8,
    /// Node geometry and distribution data.
    pub nodes: NodeSet,
    element_sets: Vec<ElementSet>,
}

impl MeshPart {
    pub fn new(dimension: u8) -> Self {
        Self {
            dimension,
            nodes: NodeSet::new(),
            element_sets: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    /// Move `set` into the arena and return its id.
    pub fn add_element_set(&mut self, set: ElementSet) -> usize {
        self.element_sets.push(set);
        self.element_sets.len() - 1
    }

    pub fn nb_element_sets(&self) -> usize {
        self.element_sets.len()
    }

    pub fn element_set(&self, id: usize) -> Result<&ElementSet, MeshHaloError> {
        self.element_sets.get(id).ok_or(MeshHaloError::OutOfRange {
            index: id,
            len: self.element_sets.len(),
        })
    }

    pub fn element_set_mut(&mut self, id: usize) -> Result<&mut ElementSet, MeshHaloError> {
        let len = self.element_sets.len();
        self.element_sets
            .get_mut(id)
            .ok_or(MeshHaloError::OutOfRange { index: id, len })
    }

    /// Iterate `(set id, set)` over the arena.
    pub fn element_sets(&self) -> impl Iterator<Item = (usize, &ElementSet)> + '_ {
        self.element_sets.iter().enumerate()
    }

    /// Kind of the elements stored in set `id`, relative to the mesh dimension.
    pub fn entity_kind(&self, id: usize) -> Result<EntityKind, MeshHaloError> {
        let set = self.element_set(id)?;
        Ok(EntityKind::of(set.element_type().dimension(), self.dimension))
    }

    /// Ids of the sets holding cells (elements of the mesh dimension).
    pub fn cell_sets(&self) -> Vec<usize> {
        self.element_sets()
            .filter(|(_, s)| s.element_type().dimension() == self.dimension)
            .map(|(id, _)| id)
            .collect()
    }

    /// Global ids of every element held on this rank, across all sets.
    pub fn element_gid_set(&self) -> hashbrown::HashSet<u64> {
        self.element_sets
            .iter()
            .flat_map(|s| s.global_ids().iter().copied())
            .filter(|&g| g != INVALID_GID)
            .collect()
    }

    /// Node connectivity of element `(set, e)` re-expressed in global ids.
    pub fn element_node_gids(&self, set: usize, e: usize) -> Result<Vec<u64>, MeshHaloError> {
        let conn = self.element_set(set)?.node_connectivity(e)?;
        conn.iter().map(|&n| self.nodes.glb_idx(n)).collect()
    }

    /// Commit staged elements in every set.
    pub fn flush_all(&mut self) -> Result<(), MeshHaloError> {
        for set in &mut self.element_sets {
            set.flush()?;
        }
        Ok(())
    }
}
