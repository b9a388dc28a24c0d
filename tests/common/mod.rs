//! Shared helpers for building structured quad meshes and rank fragments.
#![allow(dead_code)]

use mesh_halo::mesh::{ElementSet, MeshPart};
use mesh_halo::topology::cell_type::CellType;

/// Build a full `nx x ny` structured quad mesh on one rank.
///
/// Node `(x, y)` has local index `y * (nx + 1) + x` and coordinate
/// `(x, y, 0)`; every node and cell is owned by rank 0.
pub fn quad_block(nx: usize, ny: usize) -> MeshPart {
    quad_fragment(ny, 0, nx, |_, _| 0, 0)
}

/// Build one rank's fragment of a structured quad mesh split along x.
///
/// The fragment holds the cell columns `[cx0, cx1)` over `ny` rows, together
/// with the node columns `[cx0, cx1]`. `node_owner(x, y)` supplies the owner
/// rank of each node; cells are owned by `my_rank`. Coordinates are global,
/// so bit-identical node copies exist on every rank sharing a column.
pub fn quad_fragment(
    ny: usize,
    cx0: usize,
    cx1: usize,
    node_owner: impl Fn(usize, usize) -> usize,
    my_rank: usize,
) -> MeshPart {
    let mut mesh = MeshPart::new(2);
    let node_cols = cx1 - cx0 + 1;
    let local = |x: usize, y: usize| y * node_cols + (x - cx0);

    for y in 0..=ny {
        for x in cx0..=cx1 {
            let n = mesh.nodes.add_node([x as f64, y as f64, 0.0]);
            mesh.nodes.set_rank(n, node_owner(x, y)).unwrap();
        }
    }

    let mut cells = ElementSet::new(CellType::Quadrilateral);
    for y in 0..ny {
        for x in cx0..cx1 {
            let e = cells
                .add_element(vec![
                    local(x, y),
                    local(x + 1, y),
                    local(x + 1, y + 1),
                    local(x, y + 1),
                ])
                .unwrap();
            cells.set_rank(e.index(), my_rank).unwrap();
        }
    }
    cells.flush().unwrap();
    mesh.add_element_set(cells);
    mesh
}

/// Map every node's coordinate to its assigned global id.
pub fn coord_to_gid(mesh: &MeshPart) -> std::collections::HashMap<(u64, u64), u64> {
    mesh.nodes
        .iter()
        .map(|(c, gid, _)| ((c[0] as u64, c[1] as u64), gid))
        .collect()
}
