//! Fixed, little-endian wire records for the exchange protocols.
//!
//! All multi-byte integers in these structs are **little-endian** on the
//! wire: stored pre-LE with `.to_le()` and decoded with `::from_le()`.
//! Floating-point coordinates travel as `f64::to_bits` words.

use crate::error::MeshHaloError;
use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

/// Count of following records.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// One u64 word on the wire: a global id, a content hash, or a stream count.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireId {
    pub id_le: u64,
}

impl WireId {
    pub fn of(id: u64) -> Self {
        Self { id_le: id.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.id_le)
    }
}

/// A `(content hash, global id)` pair broadcast during identity resolution.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireIdentity {
    pub hash_le: u64,
    pub gid_le: u64,
}

impl WireIdentity {
    pub fn new(hash: u64, gid: u64) -> Self {
        Self {
            hash_le: hash.to_le(),
            gid_le: gid.to_le(),
        }
    }
    pub fn hash(&self) -> u64 {
        u64::from_le(self.hash_le)
    }
    pub fn gid(&self) -> u64 {
        u64::from_le(self.gid_le)
    }
}

/// One ghost-node reply record: identity, owner and coordinates.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireNodeRecord {
    pub gid_le: u64,
    pub rank_le: u32, // owner rank is u32 on the wire, never usize
    pub _pad: u32,
    pub coord_bits_le: [u64; 3],
}

impl WireNodeRecord {
    pub const SIZE: usize = 40; // 8 + 4 + 4 + 3*8

    pub fn new(gid: u64, rank: usize, coord: [f64; 3]) -> Self {
        Self {
            gid_le: gid.to_le(),
            rank_le: (rank as u32).to_le(),
            _pad: 0,
            coord_bits_le: [
                coord[0].to_bits().to_le(),
                coord[1].to_bits().to_le(),
                coord[2].to_bits().to_le(),
            ],
        }
    }

    pub fn gid(&self) -> u64 {
        u64::from_le(self.gid_le)
    }
    pub fn rank(&self) -> usize {
        u32::from_le(self.rank_le) as usize
    }
    pub fn coord(&self) -> [f64; 3] {
        [
            f64::from_bits(u64::from_le(self.coord_bits_le[0])),
            f64::from_bits(u64::from_le(self.coord_bits_le[1])),
            f64::from_bits(u64::from_le(self.coord_bits_le[2])),
        ]
    }
}

/// One element pulled out of a ghost-element stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElementRecord {
    /// Element-set arena id; set layouts must agree across ranks.
    pub set: usize,
    pub gid: u64,
    pub rank: usize,
    pub node_gids: Vec<u64>,
}

/// Append one element to a ghost-element stream:
/// `[set, gid, rank, n, node_gid * n]`.
pub fn pack_element(stream: &mut Vec<WireId>, record: &ElementRecord) {
    stream.push(WireId::of(record.set as u64));
    stream.push(WireId::of(record.gid));
    stream.push(WireId::of(record.rank as u64));
    stream.push(WireId::of(record.node_gids.len() as u64));
    stream.extend(record.node_gids.iter().map(|&g| WireId::of(g)));
}

/// Decode a ghost-element stream produced by [`pack_element`].
pub fn unpack_elements(
    stream: &[WireId],
    neighbor: usize,
) -> Result<Vec<ElementRecord>, MeshHaloError> {
    let mut records = Vec::new();
    let mut pos = 0;
    let word = |i: usize| -> Result<u64, MeshHaloError> {
        stream
            .get(i)
            .map(WireId::get)
            .ok_or_else(|| MeshHaloError::CommError {
                neighbor,
                source: format!("element stream truncated at word {i}"),
            })
    };
    while pos < stream.len() {
        let set = word(pos)? as usize;
        let gid = word(pos + 1)?;
        let rank = word(pos + 2)? as usize;
        let n = word(pos + 3)? as usize;
        let node_gids = (pos + 4..pos + 4 + n)
            .map(word)
            .collect::<Result<Vec<_>, _>>()?;
        records.push(ElementRecord {
            set,
            gid,
            rank,
            node_gids,
        });
        pos += 4 + n;
    }
    Ok(records)
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireId>() == 8);
    assert!(size_of::<WireIdentity>() == 16);
    assert!(size_of::<WireNodeRecord>() == WireNodeRecord::SIZE);
    assert!(align_of::<WireNodeRecord>() == 8);
};

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{cast_slice, cast_slice_mut};
    use static_assertions::assert_eq_size;

    assert_eq_size!(WireId, u64);

    #[test]
    fn node_record_roundtrip() {
        let r = WireNodeRecord::new(42, 3, [1.5, -2.25, 0.0]);
        let bytes: Vec<u8> = cast_slice(&[r]).to_vec();
        let mut out = [WireNodeRecord::zeroed()];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].gid(), 42);
        assert_eq!(out[0].rank(), 3);
        assert_eq!(out[0].coord(), [1.5, -2.25, 0.0]);
    }

    #[test]
    fn identity_roundtrip() {
        let v = vec![WireIdentity::new(0xdead, 1), WireIdentity::new(0xbeef, 2)];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let mut out = vec![WireIdentity::zeroed(); 2];
        cast_slice_mut(&mut out).copy_from_slice(&bytes);
        assert_eq!(out[0].hash(), 0xdead);
        assert_eq!(out[1].gid(), 2);
    }

    #[test]
    fn element_stream_roundtrip() {
        let records = vec![
            ElementRecord {
                set: 0,
                gid: 10,
                rank: 1,
                node_gids: vec![4, 5, 6, 7],
            },
            ElementRecord {
                set: 1,
                gid: 11,
                rank: 0,
                node_gids: vec![8, 9],
            },
        ];
        let mut stream = Vec::new();
        for r in &records {
            pack_element(&mut stream, r);
        }
        assert_eq!(unpack_elements(&stream, 0).unwrap(), records);
    }

    #[test]
    fn truncated_stream_rejected() {
        let mut stream = Vec::new();
        pack_element(
            &mut stream,
            &ElementRecord {
                set: 0,
                gid: 1,
                rank: 0,
                node_gids: vec![1, 2, 3],
            },
        );
        stream.pop();
        assert!(matches!(
            unpack_elements(&stream, 5),
            Err(MeshHaloError::CommError { neighbor: 5, .. })
        ));
    }
}
