//! Face derivation over structured quad meshes.

mod common;

use common::quad_block;
use mesh_halo::faces::build::build_face_connectivity;
use mesh_halo::faces::connectivity::UNKNOWN_CELL;

#[test]
fn quad_grid_face_counts() {
    // A watertight m x n quad grid has m*(n+1) horizontal plus n*(m+1)
    // vertical edges, of which the perimeter 2m + 2n are boundary.
    for (m, n) in [(1, 1), (2, 2), (4, 4), (3, 5)] {
        let mesh = quad_block(m, n);
        let fc = build_face_connectivity(&mesh, &[0]).unwrap();
        assert_eq!(fc.len(), m * (n + 1) + n * (m + 1), "faces of {m}x{n}");
        assert_eq!(fc.nb_boundary_faces(), 2 * m + 2 * n, "boundary of {m}x{n}");
    }
}

#[test]
fn inner_faces_have_two_distinct_cells() {
    let mesh = quad_block(4, 4);
    let fc = build_face_connectivity(&mesh, &[0]).unwrap();
    for f in 0..fc.len() {
        let cells = fc.connectivity().row(f).unwrap();
        if fc.is_boundary(f).unwrap() {
            assert_eq!(cells[1], UNKNOWN_CELL);
        } else {
            assert_ne!(cells[0], cells[1]);
            assert_ne!(cells[1], UNKNOWN_CELL);
        }
    }
}

#[test]
fn face_numbers_identify_cell_sides() {
    let mesh = quad_block(2, 1);
    let fc = build_face_connectivity(&mesh, &[0]).unwrap();
    // The shared vertical edge is edge 1 of the left quad and edge 3 of the
    // right quad, given the counter-clockwise [bl, br, tr, tl] numbering.
    let inner = (0..fc.len())
        .find(|&f| !fc.is_boundary(f).unwrap())
        .unwrap();
    let cells = fc.connectivity().row(inner).unwrap();
    let numbers = fc.face_number().row(inner).unwrap();
    let sides: std::collections::HashMap<usize, u32> =
        cells.iter().copied().zip(numbers.iter().copied()).collect();
    assert_eq!(sides[&0], 1);
    assert_eq!(sides[&1], 3);
}

#[test]
fn every_cell_touches_a_face() {
    let mesh = quad_block(3, 3);
    let fc = build_face_connectivity(&mesh, &[0]).unwrap();
    let per_cell = fc.cell_faces().unwrap();
    assert_eq!(per_cell.len(), 9);
    // Each quad is bounded by exactly its 4 edges.
    assert!(per_cell.iter().all(|faces| faces.len() == 4));
}

#[test]
fn interior_cells_not_flagged_boundary() {
    let mesh = quad_block(3, 3);
    let fc = build_face_connectivity(&mesh, &[0]).unwrap();
    let flags = fc.cell_boundary_flags().unwrap();
    // Only the center cell of a 3x3 grid is fully interior.
    let interior: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, &b)| !b)
        .map(|(c, _)| c)
        .collect();
    assert_eq!(interior, vec![4]);
}
