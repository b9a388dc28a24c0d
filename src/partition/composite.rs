//! Shared partition numbering over several independent id spaces.

use crate::error::MeshHaloError;
use crate::partition::PartitionMap;

/// Combines K [`PartitionMap`]s (e.g. one for nodes, one for elements) into
/// one shared partition/rank assignment.
///
/// Within a shared partition `p`, the merged id space lays the sub-maps out
/// back to back: first sub-map 0's ids of partition `p`, then sub-map 1's,
/// and so on. Every rank can therefore resolve the owner and the originating
/// sub-space of any merged id without communication.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompositePartitionMap {
    subs: Vec<PartitionMap>,
}

impl CompositePartitionMap {
    /// Combine sub-maps that share one partition/rank layout.
    pub fn new(subs: Vec<PartitionMap>) -> Result<Self, MeshHaloError> {
        let first = subs
            .first()
            .ok_or(MeshHaloError::PartitionLayout("no sub-maps supplied"))?;
        if subs
            .iter()
            .any(|s| s.nb_parts() != first.nb_parts() || s.nb_ranks() != first.nb_ranks())
        {
            return Err(MeshHaloError::PartitionLayout(
                "sub-maps disagree on partition or rank count",
            ));
        }
        Ok(Self { subs })
    }

    #[inline]
    pub fn nb_parts(&self) -> usize {
        self.subs[0].nb_parts()
    }

    #[inline]
    pub fn nb_ranks(&self) -> usize {
        self.subs[0].nb_ranks()
    }

    #[inline]
    pub fn nb_subspaces(&self) -> usize {
        self.subs.len()
    }

    /// Total size of the merged id space.
    pub fn nb_objects(&self) -> usize {
        self.subs.iter().map(|s| s.nb_objects()).sum()
    }

    /// Number of merged ids in shared partition `part`.
    pub fn nb_objects_in_part(&self, part: usize) -> Result<usize, MeshHaloError> {
        self.subs
            .iter()
            .map(|s| s.nb_objects_in_part(part))
            .sum()
    }

    /// Shared partition owning the merged id.
    pub fn owning_partition(&self, id: usize) -> Result<usize, MeshHaloError> {
        let mut start = 0;
        for part in 0..self.nb_parts() {
            let width = self.nb_objects_in_part(part)?;
            if id < start + width {
                return Ok(part);
            }
            start += width;
        }
        Err(MeshHaloError::OutOfRange {
            index: id,
            len: self.nb_objects(),
        })
    }

    /// Rank owning the merged id.
    pub fn owning_rank_of_object(&self, id: usize) -> Result<usize, MeshHaloError> {
        self.subs[0].owning_rank(self.owning_partition(id)?)
    }

    /// Resolve a merged id to `(sub-map index, id in that sub-map's space)`
    /// by walking sub-map sizes within the owning partition until the offset
    /// is exhausted.
    pub fn owning_subspace(&self, id: usize) -> Result<(usize, usize), MeshHaloError> {
        let part = self.owning_partition(id)?;
        let mut offset = id
            - (0..part)
                .map(|p| self.nb_objects_in_part(p))
                .sum::<Result<usize, _>>()?;
        for (k, sub) in self.subs.iter().enumerate() {
            let width = sub.nb_objects_in_part(part)?;
            if offset < width {
                return Ok((k, sub.range(part)?.start + offset));
            }
            offset -= width;
        }
        // Unreachable: owning_partition bounds the offset by the part width.
        Err(MeshHaloError::OutOfRange {
            index: id,
            len: self.nb_objects(),
        })
    }
}
