//! One-hop overlap growth on a 4x4 quad mesh split across two ranks.
//!
//! Rank 0 owns cell columns 0..2, rank 1 owns columns 2..4. After one grow,
//! each rank must hold exactly one extra column of ghost cells together with
//! the node column backing it, and no duplicate global ids anywhere.

mod common;

use common::quad_fragment;
use mesh_halo::comm::communicator::{CommTag, LoopbackComm};
use mesh_halo::mesh::MeshPart;
use mesh_halo::numbering::{number_elements, number_nodes};
use mesh_halo::overlap::grow_overlap;
use serial_test::serial;
use std::collections::HashSet;

fn node_owner(x: usize, _y: usize) -> usize {
    usize::from(x > 2)
}

fn grown_mesh(rank: usize, tag_base: u16, hops: usize) -> MeshPart {
    let comm = LoopbackComm::new(rank, 2);
    let (cx0, cx1) = if rank == 0 { (0, 2) } else { (2, 4) };
    let mut mesh = quad_fragment(4, cx0, cx1, node_owner, rank);
    number_nodes(&mut mesh.nodes, &comm, CommTag(tag_base)).unwrap();
    number_elements(&mut mesh, &comm, CommTag(tag_base + 0x40)).unwrap();
    for hop in 0..hops {
        grow_overlap(&mut mesh, &comm, CommTag(tag_base + 0x80 + 0x10 * hop as u16)).unwrap();
    }
    mesh
}

fn run_two_ranks(tag_base: u16, hops: usize) -> Vec<MeshPart> {
    let handles: Vec<_> = (0..2)
        .map(|rank| std::thread::spawn(move || grown_mesh(rank, tag_base, hops)))
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
#[serial]
fn one_hop_adds_one_ghost_column() {
    let meshes = run_two_ranks(0x3000, 1);
    for (rank, mesh) in meshes.iter().enumerate() {
        let cells = mesh.element_set(0).unwrap();
        // 8 owned cells + 4 ghost cells, 15 held nodes + 5 ghost nodes.
        assert_eq!(cells.len(), 12, "rank {rank} cell count");
        assert_eq!(mesh.nodes.len(), 20, "rank {rank} node count");

        let ghosts = (0..cells.len())
            .filter(|&e| cells.is_ghost(e, rank).unwrap())
            .count();
        assert_eq!(ghosts, 4);
        // Every ghost cell is owned by the peer rank.
        for e in 0..cells.len() {
            if cells.is_ghost(e, rank).unwrap() {
                assert_eq!(cells.rank(e).unwrap(), 1 - rank);
            }
        }
    }
}

#[test]
#[serial]
fn ghost_connectivity_is_remapped_and_consistent() {
    let meshes = run_two_ranks(0x3200, 1);
    for mesh in &meshes {
        let cells = mesh.element_set(0).unwrap();
        // No duplicate node or element ids anywhere.
        mesh.nodes.global_index_map().unwrap();
        let egids: HashSet<u64> = cells.global_ids().iter().copied().collect();
        assert_eq!(egids.len(), cells.len());

        // Every ghost cell's connectivity resolves to local nodes forming a
        // unit-square quad in global coordinates.
        for e in 0..cells.len() {
            let conn = cells.node_connectivity(e).unwrap();
            assert_eq!(conn.len(), 4);
            let coords: Vec<[f64; 3]> = conn
                .iter()
                .map(|&n| mesh.nodes.coordinates(n).unwrap())
                .collect();
            let [x0, y0, _] = coords[0];
            assert_eq!(coords[1], [x0 + 1.0, y0, 0.0]);
            assert_eq!(coords[2], [x0 + 1.0, y0 + 1.0, 0.0]);
            assert_eq!(coords[3], [x0, y0 + 1.0, 0.0]);
        }
    }
}

#[test]
#[serial]
fn growth_is_monotonic_and_reaches_a_fixed_point() {
    let meshes = run_two_ranks(0x3400, 4);
    // After enough hops both ranks hold the whole 4x4 mesh, and further
    // growth changes nothing.
    for (rank, mesh) in meshes.iter().enumerate() {
        let cells = mesh.element_set(0).unwrap();
        assert_eq!(cells.len(), 16, "rank {rank} saturated cells");
        assert_eq!(mesh.nodes.len(), 25, "rank {rank} saturated nodes");

        let owned = (0..cells.len())
            .filter(|&e| !cells.is_ghost(e, rank).unwrap())
            .count();
        assert_eq!(owned, 8);
    }

    // Global ids across both saturated ranks agree per coordinate.
    let gids_0 = common::coord_to_gid(&meshes[0]);
    let gids_1 = common::coord_to_gid(&meshes[1]);
    assert_eq!(gids_0, gids_1);
}

#[test]
#[serial]
fn second_hop_only_extends_the_frontier() {
    let one = run_two_ranks(0x3600, 1);
    let two = run_two_ranks(0x3800, 2);
    for rank in 0..2 {
        let c1 = one[rank].element_set(0).unwrap().len();
        let c2 = two[rank].element_set(0).unwrap().len();
        assert!(c2 >= c1, "growth must be monotonic");
        assert_eq!(c2, 16);
        assert_eq!(two[rank].nodes.len(), 25);
    }
}
