//! Face matching across two disjoint regions and against boundary patches.

use crate::error::MeshHaloError;
use crate::faces::connectivity::FaceCellConnectivity;
use crate::mesh::ElementSet;
use crate::topology::buffered_table::BufferedTable;
use hashbrown::{HashMap, HashSet};

/// Relative traversal direction of two matched faces.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaceOrientation {
    /// Both sides list the shared nodes in the same direction.
    Matched,
    /// The sides traverse the shared nodes in opposite directions.
    Inverted,
}

/// One face pair promoted from boundary to interface.
///
/// `rotation` is the index of side 1's first node inside side 2's node row;
/// together with `orientation` it lets a consumer reconstruct a consistent
/// local numbering across the interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FaceMatch {
    pub cell_1: usize,
    pub cell_2: usize,
    pub face_nb_1: u32,
    pub face_nb_2: u32,
    pub rotation: u32,
    pub orientation: FaceOrientation,
}

/// The faces shared by two regions, with one row per matched pair.
#[derive(Clone, Debug, Default)]
pub struct InterfaceConnectivity {
    matches: Vec<FaceMatch>,
    /// Rows `[cell_1, cell_2]`, cells in each region's own numbering.
    connectivity: BufferedTable<usize>,
}

impl InterfaceConnectivity {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn matches(&self) -> &[FaceMatch] {
        &self.matches
    }

    pub fn connectivity(&self) -> &BufferedTable<usize> {
        &self.connectivity
    }
}

/// A boundary patch element resolved to the interior face it coincides with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BoundaryFaceLink {
    /// Element index inside the patch set.
    pub element: usize,
    /// Interior face index.
    pub face: usize,
    /// Interior cell (continuous numbering) the face belongs to.
    pub cell: usize,
    /// Face number of that face inside its cell.
    pub face_nb: u32,
}

/// Match the boundary faces of `region_1` against those of `region_2`.
///
/// Matched pairs are removed from both regions and recorded as one interface
/// row each; their boundary/inner classification is thereby promoted from
/// boundary to inner at the interface. Unmatched boundary faces remain true
/// mesh-boundary faces. Node ids on the two sides must live in one shared
/// numbering (local ids within one rank, global ids across a partition
/// interface).
///
/// # Errors
/// [`MeshHaloError::SetupError`] when either region has pending mutations.
pub fn match_faces(
    region_1: &mut FaceCellConnectivity,
    region_2: &mut FaceCellConnectivity,
) -> Result<InterfaceConnectivity, MeshHaloError> {
    if !region_1.is_flushed() || !region_2.is_flushed() {
        return Err(MeshHaloError::SetupError(
            "flush both regions before matching faces",
        ));
    }

    let lookup = boundary_face_lookup(region_2)?;
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut interface = InterfaceConnectivity::default();

    for f1 in 0..region_1.len() {
        if !region_1.is_boundary(f1)? {
            continue;
        }
        let nodes_1 = region_1.face_nodes(f1)?;
        let Some((f2, rotation, orientation)) =
            find_counterpart(region_2, &lookup, &consumed, nodes_1)?
        else {
            continue;
        };

        let cells_1 = region_1.connectivity().row(f1)?;
        let cells_2 = region_2.connectivity().row(f2)?;
        let m = FaceMatch {
            cell_1: cells_1[0],
            cell_2: cells_2[0],
            face_nb_1: region_1.face_number().row(f1)?[0],
            face_nb_2: region_2.face_number().row(f2)?[0],
            rotation,
            orientation,
        };
        interface
            .connectivity
            .add_row(vec![m.cell_1, m.cell_2]);
        interface.matches.push(m);

        region_1.remove_face(f1)?;
        region_2.remove_face(f2)?;
        consumed.insert(f2);
    }

    region_1.flush();
    region_2.flush();
    interface.connectivity.flush();
    log::debug!(
        "matched {} interface faces ({} / {} boundary faces left)",
        interface.len(),
        region_1.nb_boundary_faces(),
        region_2.nb_boundary_faces(),
    );
    Ok(interface)
}

/// Connect the elements of a (d-1)-dimensional boundary patch to the interior
/// faces they coincide with. The interior region is left untouched: patch
/// faces are genuine boundary faces, not interface halves.
///
/// # Errors
/// [`MeshHaloError::UnmatchedBoundary`] when a patch element coincides with
/// no interior boundary face.
pub fn match_boundary(
    patch: &ElementSet,
    interior: &FaceCellConnectivity,
) -> Result<Vec<BoundaryFaceLink>, MeshHaloError> {
    if !interior.is_flushed() {
        return Err(MeshHaloError::SetupError(
            "flush the interior region before matching its boundary",
        ));
    }
    let lookup = boundary_face_lookup(interior)?;
    let consumed = HashSet::new();
    let mut links = Vec::with_capacity(patch.len());

    for e in 0..patch.len() {
        let nodes = patch.node_connectivity(e)?;
        let Some((face, _, _)) = find_counterpart(interior, &lookup, &consumed, nodes)? else {
            return Err(MeshHaloError::UnmatchedBoundary { element: e });
        };
        links.push(BoundaryFaceLink {
            element: e,
            face,
            cell: interior.connectivity().row(face)?[0],
            face_nb: interior.face_number().row(face)?[0],
        });
    }
    Ok(links)
}

/// Node -> boundary faces lookup over a region, keyed by every face node.
fn boundary_face_lookup(
    region: &FaceCellConnectivity,
) -> Result<HashMap<usize, Vec<usize>>, MeshHaloError> {
    let mut lookup: HashMap<usize, Vec<usize>> = HashMap::new();
    for f in 0..region.len() {
        if !region.is_boundary(f)? {
            continue;
        }
        for &n in region.face_nodes(f)? {
            lookup.entry(n).or_default().push(f);
        }
    }
    Ok(lookup)
}

/// Walk the nodes of one face and accumulate match counts over the candidate
/// faces bucketed under its first node; a full match yields the counterpart
/// plus the rotation/orientation pair. A 1-node face is fully matched by its
/// bucket key alone.
fn find_counterpart(
    region: &FaceCellConnectivity,
    lookup: &HashMap<usize, Vec<usize>>,
    consumed: &HashSet<usize>,
    nodes: &[usize],
) -> Result<Option<(usize, u32, FaceOrientation)>, MeshHaloError> {
    let Some(candidates) = nodes.first().and_then(|n| lookup.get(n)) else {
        return Ok(None);
    };
    for &face in candidates {
        if consumed.contains(&face) {
            continue;
        }
        let other = region.face_nodes(face)?;
        if other.len() != nodes.len() {
            continue;
        }
        let matched_nodes = nodes.iter().filter(|n| other.contains(n)).count();
        if matched_nodes != other.len() {
            continue;
        }
        let rotation = other.iter().position(|&n| n == nodes[0]).unwrap_or(0);
        let orientation = orientation_of(nodes, other, rotation);
        return Ok(Some((face, rotation as u32, orientation)));
    }
    Ok(None)
}

/// Compare the second node of side 1 with side 2's neighbors of the shared
/// first node. Faces with fewer than three nodes have no distinguishable
/// direction and report `Matched`.
fn orientation_of(nodes: &[usize], other: &[usize], rotation: usize) -> FaceOrientation {
    if nodes.len() < 3 {
        return FaceOrientation::Matched;
    }
    let len = other.len();
    if other[(rotation + 1) % len] == nodes[1] {
        FaceOrientation::Matched
    } else {
        FaceOrientation::Inverted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::build::build_face_connectivity;
    use crate::mesh::{ElementSet, MeshPart};
    use crate::topology::cell_type::CellType;

    /// A 2x1 strip of quads split into two one-quad regions sharing edge 1-4.
    ///
    /// ```text
    /// 3 -- 4 -- 5
    /// |    |    |
    /// 0 -- 1 -- 2
    /// ```
    fn split_strip() -> (MeshPart, usize, usize) {
        let mut mesh = MeshPart::new(2);
        for y in 0..2 {
            for x in 0..3 {
                mesh.nodes.add_node([x as f64, y as f64, 0.0]);
            }
        }
        let mut left = ElementSet::new(CellType::Quadrilateral);
        left.add_element(vec![0, 1, 4, 3]).unwrap();
        left.flush().unwrap();
        let mut right = ElementSet::new(CellType::Quadrilateral);
        right.add_element(vec![1, 2, 5, 4]).unwrap();
        right.flush().unwrap();
        let l = mesh.add_element_set(left);
        let r = mesh.add_element_set(right);
        (mesh, l, r)
    }

    #[test]
    fn interface_promotion() {
        let (mesh, l, r) = split_strip();
        let mut fc_l = build_face_connectivity(&mesh, &[l]).unwrap();
        let mut fc_r = build_face_connectivity(&mesh, &[r]).unwrap();
        assert_eq!(fc_l.nb_boundary_faces(), 4);
        assert_eq!(fc_r.nb_boundary_faces(), 4);

        let interface = match_faces(&mut fc_l, &mut fc_r).unwrap();
        assert_eq!(interface.len(), 1);
        // The matched halves are gone from both regions.
        assert_eq!(fc_l.len(), 3);
        assert_eq!(fc_r.len(), 3);
        assert_eq!(fc_l.nb_boundary_faces(), 3);
        assert_eq!(fc_r.nb_boundary_faces(), 3);

        let m = interface.matches()[0];
        assert_eq!((m.cell_1, m.cell_2), (0, 0));
        // Two-node faces have no distinguishable traversal direction.
        assert_eq!(m.orientation, FaceOrientation::Matched);
        assert_eq!(interface.connectivity().row(0).unwrap(), &[0, 0]);
    }

    #[test]
    fn unmatched_faces_stay_boundary() {
        let (mesh, l, _) = split_strip();
        let mut fc_l = build_face_connectivity(&mesh, &[l]).unwrap();
        let mut fc_other = FaceCellConnectivity::new();
        let interface = match_faces(&mut fc_l, &mut fc_other).unwrap();
        assert!(interface.is_empty());
        assert_eq!(fc_l.nb_boundary_faces(), 4);
    }

    #[test]
    fn boundary_patch_links_to_cells() {
        let (mesh, l, r) = split_strip();
        let fc = build_face_connectivity(&mesh, &[l, r]).unwrap();

        // Bottom edge of the strip as a 2-segment boundary patch.
        let mut patch = ElementSet::new(CellType::Segment);
        patch.add_element(vec![0, 1]).unwrap();
        patch.add_element(vec![1, 2]).unwrap();
        patch.flush().unwrap();

        let links = match_boundary(&patch, &fc).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].cell, 0);
        assert_eq!(links[1].cell, 1);
    }

    #[test]
    fn missing_patch_face_reported() {
        let (mesh, l, r) = split_strip();
        let fc = build_face_connectivity(&mesh, &[l, r]).unwrap();
        let mut patch = ElementSet::new(CellType::Segment);
        patch.add_element(vec![0, 4]).unwrap(); // a diagonal, not a face
        patch.flush().unwrap();
        assert!(matches!(
            match_boundary(&patch, &fc),
            Err(MeshHaloError::UnmatchedBoundary { element: 0 })
        ));
    }
}
