//! Cell type metadata: vertex counts, dimensions and local face layouts.

use crate::error::MeshHaloError;

/// Common cell types for mesh elements.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CellType {
    /// 0D vertex.
    Vertex,
    /// 1D segment/edge.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
}

impl Default for CellType {
    fn default() -> Self {
        CellType::Vertex
    }
}

/// Local node numbers of each face, per cell type. The face of a segment is a
/// single point, so 1-node face rows are legal throughout the face machinery.
const SEGMENT_FACES: [&[usize]; 2] = [&[0], &[1]];
const TRIANGLE_FACES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
const QUAD_FACES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRA_FACES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEXA_FACES: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[3, 7, 6, 2],
    &[0, 4, 7, 3],
];

impl CellType {
    /// Topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Hexahedron => 3,
        }
    }

    /// Number of nodes of the (linear) cell.
    pub fn vertex_count(self) -> usize {
        match self {
            CellType::Vertex => 1,
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral => 4,
            CellType::Tetrahedron => 4,
            CellType::Hexahedron => 8,
        }
    }

    /// Number of (d-1)-dimensional faces bounding the cell.
    pub fn face_count(self) -> usize {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral => 4,
            CellType::Tetrahedron => 4,
            CellType::Hexahedron => 6,
        }
    }

    /// Local node numbers of face `face_nb`.
    pub fn face_nodes(self, face_nb: u32) -> Result<&'static [usize], MeshHaloError> {
        let faces: &[&'static [usize]] = match self {
            CellType::Vertex => &[],
            CellType::Segment => &SEGMENT_FACES,
            CellType::Triangle => &TRIANGLE_FACES,
            CellType::Quadrilateral => &QUAD_FACES,
            CellType::Tetrahedron => &TETRA_FACES,
            CellType::Hexahedron => &HEXA_FACES,
        };
        faces
            .get(face_nb as usize)
            .copied()
            .ok_or(MeshHaloError::InvalidFaceNumber {
                cell_type: self.name(),
                face_nb,
            })
    }

    /// Cell type of the faces of this cell.
    pub fn face_type(self) -> Option<CellType> {
        match self {
            CellType::Vertex => None,
            CellType::Segment => Some(CellType::Vertex),
            CellType::Triangle | CellType::Quadrilateral => Some(CellType::Segment),
            CellType::Tetrahedron => Some(CellType::Triangle),
            CellType::Hexahedron => Some(CellType::Quadrilateral),
        }
    }

    /// Human-readable type name.
    pub fn name(self) -> &'static str {
        match self {
            CellType::Vertex => "Vertex",
            CellType::Segment => "Segment",
            CellType::Triangle => "Triangle",
            CellType::Quadrilateral => "Quadrilateral",
            CellType::Tetrahedron => "Tetrahedron",
            CellType::Hexahedron => "Hexahedron",
        }
    }
}
