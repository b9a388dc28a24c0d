//! Block partitioning of one contiguous id space.

use crate::error::MeshHaloError;
use std::ops::Range;

/// Ownership of the id space `[base, base + nb_objects)` over `nb_parts`
/// partitions assigned to `nb_ranks` ranks.
///
/// Partitions are equally-sized blocks of `nb_objects / nb_parts` ids, with
/// the last partition absorbing the division remainder so every id is covered
/// exactly once. Ranks own equally-sized blocks of partitions the same way.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PartitionMap {
    base: usize,
    nb_objects: usize,
    nb_parts: usize,
    nb_ranks: usize,
}

impl PartitionMap {
    /// Create a layout for `[0, nb_objects)`.
    pub fn new(nb_objects: usize, nb_parts: usize, nb_ranks: usize) -> Result<Self, MeshHaloError> {
        Self::with_base(0, nb_objects, nb_parts, nb_ranks)
    }

    /// Create a layout for `[base, base + nb_objects)`.
    pub fn with_base(
        base: usize,
        nb_objects: usize,
        nb_parts: usize,
        nb_ranks: usize,
    ) -> Result<Self, MeshHaloError> {
        if nb_ranks == 0 {
            return Err(MeshHaloError::PartitionLayout("nb_ranks must be positive"));
        }
        if nb_parts < nb_ranks {
            return Err(MeshHaloError::PartitionLayout(
                "need at least one partition per rank",
            ));
        }
        if nb_objects < nb_parts {
            return Err(MeshHaloError::PartitionLayout(
                "need at least one object per partition",
            ));
        }
        Ok(Self {
            base,
            nb_objects,
            nb_parts,
            nb_ranks,
        })
    }

    #[inline]
    pub fn nb_objects(&self) -> usize {
        self.nb_objects
    }

    #[inline]
    pub fn nb_parts(&self) -> usize {
        self.nb_parts
    }

    #[inline]
    pub fn nb_ranks(&self) -> usize {
        self.nb_ranks
    }

    #[inline]
    fn part_size(&self) -> usize {
        self.nb_objects / self.nb_parts
    }

    /// Partition owning `id`.
    pub fn owning_partition(&self, id: usize) -> Result<usize, MeshHaloError> {
        let offset = id
            .checked_sub(self.base)
            .filter(|&o| o < self.nb_objects)
            .ok_or(MeshHaloError::OutOfRange {
                index: id,
                len: self.base + self.nb_objects,
            })?;
        Ok((offset / self.part_size()).min(self.nb_parts - 1))
    }

    /// Rank owning partition `part`.
    pub fn owning_rank(&self, part: usize) -> Result<usize, MeshHaloError> {
        if part >= self.nb_parts {
            return Err(MeshHaloError::OutOfRange {
                index: part,
                len: self.nb_parts,
            });
        }
        Ok((part / (self.nb_parts / self.nb_ranks)).min(self.nb_ranks - 1))
    }

    /// Rank owning object `id`.
    pub fn owning_rank_of_object(&self, id: usize) -> Result<usize, MeshHaloError> {
        self.owning_rank(self.owning_partition(id)?)
    }

    /// Id range of partition `part`; the last partition absorbs the remainder.
    pub fn range(&self, part: usize) -> Result<Range<usize>, MeshHaloError> {
        if part >= self.nb_parts {
            return Err(MeshHaloError::OutOfRange {
                index: part,
                len: self.nb_parts,
            });
        }
        let start = self.base + part * self.part_size();
        let end = if part + 1 == self.nb_parts {
            self.base + self.nb_objects
        } else {
            start + self.part_size()
        };
        Ok(start..end)
    }

    /// Number of objects in partition `part`.
    pub fn nb_objects_in_part(&self, part: usize) -> Result<usize, MeshHaloError> {
        Ok(self.range(part)?.len())
    }

    /// True when `id` belongs to a partition owned by `my_rank`.
    pub fn is_local_object(&self, id: usize, my_rank: usize) -> Result<bool, MeshHaloError> {
        Ok(self.owning_rank_of_object(id)? == my_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_cover_space() {
        let pm = PartitionMap::new(10, 3, 3).unwrap();
        assert_eq!(pm.range(0).unwrap(), 0..3);
        assert_eq!(pm.range(1).unwrap(), 3..6);
        // Last partition absorbs the remainder.
        assert_eq!(pm.range(2).unwrap(), 6..10);
        let total: usize = (0..3).map(|p| pm.nb_objects_in_part(p).unwrap()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn owning_partition_matches_ranges() {
        let pm = PartitionMap::new(11, 4, 2).unwrap();
        for id in 0..11 {
            let p = pm.owning_partition(id).unwrap();
            assert!(pm.range(p).unwrap().contains(&id));
        }
    }

    #[test]
    fn ranks_cover_partitions() {
        let pm = PartitionMap::new(100, 5, 2).unwrap();
        // 5 partitions over 2 ranks: block size 2, rank 1 absorbs the tail.
        assert_eq!(pm.owning_rank(0).unwrap(), 0);
        assert_eq!(pm.owning_rank(1).unwrap(), 0);
        assert_eq!(pm.owning_rank(2).unwrap(), 1);
        assert_eq!(pm.owning_rank(4).unwrap(), 1);
    }

    #[test]
    fn base_offset_respected() {
        let pm = PartitionMap::with_base(100, 10, 2, 2).unwrap();
        assert_eq!(pm.owning_partition(100).unwrap(), 0);
        assert_eq!(pm.owning_partition(109).unwrap(), 1);
        assert!(pm.owning_partition(99).is_err());
        assert!(pm.owning_partition(110).is_err());
    }

    #[test]
    fn degenerate_layouts_rejected() {
        assert!(PartitionMap::new(10, 0, 0).is_err());
        assert!(PartitionMap::new(10, 1, 2).is_err());
        assert!(PartitionMap::new(2, 4, 2).is_err());
    }

    #[test]
    fn single_partition() {
        let pm = PartitionMap::new(7, 1, 1).unwrap();
        for id in 0..7 {
            assert_eq!(pm.owning_partition(id).unwrap(), 0);
            assert!(pm.is_local_object(id, 0).unwrap());
        }
    }
}
