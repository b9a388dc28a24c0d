//! Face derivation from cell-node connectivity.

use crate::error::MeshHaloError;
use crate::faces::connectivity::{FaceCellConnectivity, UNKNOWN_CELL};
use crate::mesh::MeshPart;
use hashbrown::HashMap;

/// Derive the face -> cell relation of the element sets `set_ids`.
///
/// For every cell and every local face, the face's node set is bucketed under
/// its first node. A candidate face already registered under that node whose
/// node set matches completely is the same face seen from the second cell: it
/// gets closed and loses its boundary flag. Otherwise a new boundary face is
/// registered and indexed under each of its nodes.
///
/// Faces with a single node (point faces of 1D cells) match on the bucket key
/// alone; the remaining-node walk is empty for them.
///
/// # Errors
/// [`MeshHaloError::SetupError`] when a set has staged, unflushed elements.
pub fn build_face_connectivity(
    mesh: &MeshPart,
    set_ids: &[usize],
) -> Result<FaceCellConnectivity, MeshHaloError> {
    let mut fc = FaceCellConnectivity::new();
    let mut max_faces = 0usize;
    for &set_id in set_ids {
        let set = mesh.element_set(set_id)?;
        if set.total_len() != set.len() {
            return Err(MeshHaloError::SetupError(
                "flush element sets before building faces",
            ));
        }
        fc.register_cells(set_id, set.len());
        max_faces += set.element_type().face_count() * set.len();
    }

    // node id -> faces registered under it (first-node bucket plus the
    // remaining nodes, so any node can serve as a lookup key later).
    let mut node_to_faces: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut nodes = Vec::new();

    for &set_id in set_ids {
        let set = mesh.element_set(set_id)?;
        let cell_type = set.element_type();
        for e in 0..set.len() {
            let cell = fc.cells().global_index(set_id, e)?;
            let conn = set.node_connectivity(e)?.to_vec();
            for face_nb in 0..cell_type.face_count() as u32 {
                nodes.clear();
                nodes.extend(cell_type.face_nodes(face_nb)?.iter().map(|&ln| conn[ln]));

                let matched = find_matching_face(&fc, &node_to_faces, &nodes)?;
                match matched {
                    Some(face) => fc.close_face(face, cell, face_nb)?,
                    None => {
                        let staged = fc.add_face(cell, face_nb, nodes.clone());
                        for &n in &nodes {
                            node_to_faces.entry(n).or_default().push(staged.index());
                        }
                    }
                }
            }
        }
    }

    let nb_faces = fc.flush();
    debug_assert!(nb_faces <= max_faces, "more faces than cell faces exist");
    debug_assert!(fc.nb_inner_faces() <= max_faces);
    log::debug!(
        "built {nb_faces} faces over {} cells ({} boundary, {} inner)",
        fc.cells().total_len(),
        fc.nb_boundary_faces(),
        fc.nb_inner_faces(),
    );
    Ok(fc)
}

/// Scan the candidates bucketed under the face's first node for a complete
/// node-set match that still has a free second-cell slot.
fn find_matching_face(
    fc: &FaceCellConnectivity,
    node_to_faces: &HashMap<usize, Vec<usize>>,
    nodes: &[usize],
) -> Result<Option<usize>, MeshHaloError> {
    let Some(candidates) = nodes.first().and_then(|n| node_to_faces.get(n)) else {
        return Ok(None);
    };
    for &face in candidates {
        let registered = fc.staged_face_nodes(face)?;
        if registered.len() != nodes.len() {
            continue;
        }
        if fc.staged_face_cells(face)?[1] != UNKNOWN_CELL {
            // Already closed by two cells; a third match would be non-manifold.
            continue;
        }
        let matched_nodes = nodes
            .iter()
            .filter(|n| registered.contains(n))
            .count();
        if matched_nodes == registered.len() {
            return Ok(Some(face));
        }
    }
    Ok(None)
}
