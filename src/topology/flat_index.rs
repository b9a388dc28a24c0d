//! `FlatIndex`: one contiguous index space over several entity shards.
//!
//! A mesh partition stores its elements in several independently-sized sets
//! (one per cell type or region). Algorithms that address "the i-th cell of
//! the partition" need a continuous numbering over all of them. `FlatIndex`
//! maps a global offset to `(shard, local offset)` through a prefix-sum array
//! and a binary search, without copying any shard data.

use crate::debug_invariants::DebugInvariants;
use crate::error::MeshHaloError;
use itertools::Itertools;

/// Continuous numbering over N shards, identified by a `Copy + Eq` handle
/// (typically an arena index).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FlatIndex<H: Copy + Eq> {
    shards: Vec<H>,
    /// `offsets[i]` is the global index of shard `i`'s first entry;
    /// `offsets[len]` is the total size.
    offsets: Vec<usize>,
}

impl<H: Copy + Eq> Default for FlatIndex<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy + Eq> FlatIndex<H> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            shards: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Append a shard of `size` entries and extend the prefix sums.
    ///
    /// Re-adding an already-present handle is a no-op (identity is compared
    /// by handle, not content). Returns the shard's position.
    pub fn add(&mut self, handle: H, size: usize) -> usize {
        if let Some(pos) = self.position(handle) {
            return pos;
        }
        self.shards.push(handle);
        let total = *self.offsets.last().unwrap_or(&0);
        self.offsets.push(total + size);
        self.shards.len() - 1
    }

    /// Clear all shards.
    pub fn reset(&mut self) {
        self.shards.clear();
        self.offsets.clear();
        self.offsets.push(0);
    }

    /// Number of registered shards.
    #[inline]
    pub fn nb_shards(&self) -> usize {
        self.shards.len()
    }

    /// Total size of the flattened index space.
    #[inline]
    pub fn total_len(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    /// True when no shard is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Position of `handle` among the registered shards, if present.
    pub fn position(&self, handle: H) -> Option<usize> {
        self.shards.iter().position(|&h| h == handle)
    }

    /// Handles of the registered shards, in registration order.
    pub fn shards(&self) -> &[H] {
        &self.shards
    }

    /// Resolve a global index to `(shard handle, local index)`.
    ///
    /// O(log N) in the shard count via predecessor search in the prefix sums.
    pub fn locate(&self, global: usize) -> Result<(H, usize), MeshHaloError> {
        if global >= self.total_len() {
            return Err(MeshHaloError::OutOfRange {
                index: global,
                len: self.total_len(),
            });
        }
        let shard = self.offsets.partition_point(|&off| off <= global) - 1;
        Ok((self.shards[shard], global - self.offsets[shard]))
    }

    /// Global index of entry `local` inside the shard `handle`.
    pub fn global_index(&self, handle: H, local: usize) -> Result<usize, MeshHaloError> {
        let pos = self
            .position(handle)
            .ok_or(MeshHaloError::SetupError("shard not registered"))?;
        let size = self.offsets[pos + 1] - self.offsets[pos];
        if local >= size {
            return Err(MeshHaloError::OutOfRange {
                index: local,
                len: size,
            });
        }
        Ok(self.offsets[pos] + local)
    }
}

impl<H: Copy + Eq + std::fmt::Debug> DebugInvariants for FlatIndex<H> {
    fn debug_assert_invariants(&self) {
        crate::halo_debug_assert_ok!(self.validate_invariants(), "FlatIndex invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshHaloError> {
        if self.offsets.len() != self.shards.len() + 1 {
            return Err(MeshHaloError::SetupError("prefix sums out of step"));
        }
        if self.offsets.iter().tuple_windows().any(|(a, b)| a > b) {
            return Err(MeshHaloError::SetupError("prefix sums not monotone"));
        }
        Ok(())
    }
}
