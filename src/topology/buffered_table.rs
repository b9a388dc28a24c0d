//! Write-behind storage for variable-arity connectivity rows.
//!
//! Mesh construction appends and removes connectivity records in tight loops
//! over large entity counts. Committing every mutation into a dense backing
//! array would recompact on each call, so mutations are staged: new rows land
//! in fixed-capacity buffer segments, removals only mark their slot, and
//! [`BufferedTable::flush`] folds everything into the dense committed range in
//! one pass.
//!
//! Staged state is explicit in the API: [`add_row`](BufferedTable::add_row)
//! returns a [`Staged`] handle, and the committed-row accessor
//! [`row`](BufferedTable::row) refuses staged indices. Consumers that knowingly
//! read uncommitted rows use [`staged_row`](BufferedTable::staged_row).

use crate::debug_invariants::DebugInvariants;
use crate::error::MeshHaloError;
use std::collections::BTreeSet;

/// Rows staged per buffer segment before a new segment is allocated. Bounding
/// segment size keeps a staging burst from reallocating one huge buffer.
const SEGMENT_CAPACITY: usize = 1024;

/// Handle for a row that has been staged but not yet flushed.
///
/// The wrapped value addresses the table's *allocated* range (committed rows
/// first, staged rows after, in staging order). It stays valid until the next
/// [`BufferedTable::flush`]. When no row has been removed since the last
/// flush, flushing preserves allocated indices, so the handle's index is also
/// the row's final committed index.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Staged(pub(crate) usize);

impl Staged {
    /// Allocated index addressed by this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Growable collection of variable-length rows with O(1) amortized mutation.
///
/// # Invariants
/// - After `flush()` the committed range is dense: indices `[0, len())` are
///   all live and there are no staged rows or free slots.
/// - A slot is either live or free, never both.
/// - Rows may be ragged: `set_row` resizes the target row to the source length.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BufferedTable<T> {
    /// Dense committed rows.
    main: Vec<Vec<T>>,
    /// Staged rows in fixed-capacity segments; `None` marks a staged removal.
    segments: Vec<Vec<Option<Vec<T>>>>,
    /// Committed slots marked removed, compacted away on flush.
    free_main: BTreeSet<usize>,
}

impl<T: Clone> BufferedTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            main: Vec::new(),
            segments: Vec::new(),
            free_main: BTreeSet::new(),
        }
    }

    /// Number of committed rows, including slots marked removed until the
    /// next flush.
    #[inline]
    pub fn len(&self) -> usize {
        self.main.len()
    }

    /// True when no row is committed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.main.is_empty()
    }

    /// Size of the allocated index range: committed rows plus staged slots.
    #[inline]
    pub fn allocated_len(&self) -> usize {
        self.main.len() + self.staged_slots()
    }

    /// Number of live rows once staged mutations are folded in.
    pub fn live_len(&self) -> usize {
        let staged_live: usize = self
            .segments
            .iter()
            .flatten()
            .filter(|slot| slot.is_some())
            .count();
        self.main.len() - self.free_main.len() + staged_live
    }

    fn staged_slots(&self) -> usize {
        match self.segments.split_last() {
            Some((last, full)) => full.len() * SEGMENT_CAPACITY + last.len(),
            None => 0,
        }
    }

    /// Resize the committed range to `n` rows.
    ///
    /// New slots hold empty rows. Shrinking drops tail rows and any free
    /// marks past the new end.
    ///
    /// # Errors
    /// Fails with [`MeshHaloError::SetupError`] while staged rows are pending;
    /// flush first so the committed range is well defined.
    pub fn resize(&mut self, n: usize) -> Result<(), MeshHaloError> {
        if !self.segments.is_empty() {
            return Err(MeshHaloError::SetupError(
                "resize requires a flushed table",
            ));
        }
        self.main.resize_with(n, Vec::new);
        self.free_main.retain(|&slot| slot < n);
        Ok(())
    }

    /// Stage a new row for insertion and return its handle.
    ///
    /// The row is not visible through [`row`](Self::row) until
    /// [`flush`](Self::flush) commits it.
    pub fn add_row(&mut self, row: Vec<T>) -> Staged {
        let index = self.main.len() + self.staged_slots();
        match self.segments.last_mut() {
            Some(seg) if seg.len() < SEGMENT_CAPACITY => seg.push(Some(row)),
            _ => {
                let mut seg = Vec::with_capacity(SEGMENT_CAPACITY);
                seg.push(Some(row));
                self.segments.push(seg);
            }
        }
        Staged(index)
    }

    /// Mark the row at `index` (committed or staged) as removed.
    ///
    /// The slot is reclaimed by the next [`flush`](Self::flush).
    pub fn remove_row(&mut self, index: usize) -> Result<(), MeshHaloError> {
        if index < self.main.len() {
            if !self.free_main.insert(index) {
                return Err(MeshHaloError::RowRemoved { index });
            }
            return Ok(());
        }
        let slot = self.staged_slot_mut(index)?;
        if slot.is_none() {
            return Err(MeshHaloError::RowRemoved { index });
        }
        *slot = None;
        Ok(())
    }

    /// Overwrite the row at `index` (committed or staged) with `values`.
    ///
    /// Ragged rows are allowed: the target row is resized to `values.len()`.
    pub fn set_row(&mut self, index: usize, values: &[T]) -> Result<(), MeshHaloError> {
        let row = self.row_storage_mut(index)?;
        row.clear();
        row.extend_from_slice(values);
        Ok(())
    }

    /// Read-only view of the *committed* row at `index`.
    ///
    /// # Errors
    /// - [`MeshHaloError::RowNotFlushed`] for a staged index,
    /// - [`MeshHaloError::RowRemoved`] for a slot marked removed,
    /// - [`MeshHaloError::OutOfRange`] past the allocated range.
    pub fn row(&self, index: usize) -> Result<&[T], MeshHaloError> {
        if index < self.main.len() {
            if self.free_main.contains(&index) {
                return Err(MeshHaloError::RowRemoved { index });
            }
            return Ok(&self.main[index]);
        }
        if index < self.allocated_len() {
            return Err(MeshHaloError::RowNotFlushed { index });
        }
        Err(MeshHaloError::OutOfRange {
            index,
            len: self.allocated_len(),
        })
    }

    /// Read-only view of any allocated row, committed or staged.
    pub fn staged_row(&self, index: usize) -> Result<&[T], MeshHaloError> {
        if index < self.main.len() {
            if self.free_main.contains(&index) {
                return Err(MeshHaloError::RowRemoved { index });
            }
            return Ok(&self.main[index]);
        }
        let offset = index - self.main.len();
        let (seg, slot) = (offset / SEGMENT_CAPACITY, offset % SEGMENT_CAPACITY);
        match self.segments.get(seg).and_then(|s| s.get(slot)) {
            Some(Some(row)) => Ok(row),
            Some(None) => Err(MeshHaloError::RowRemoved { index }),
            None => Err(MeshHaloError::OutOfRange {
                index,
                len: self.allocated_len(),
            }),
        }
    }

    /// Iterate `(index, row)` over live committed rows.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[T])> + '_ {
        self.main
            .iter()
            .enumerate()
            .filter(move |(i, _)| !self.free_main.contains(i))
            .map(|(i, row)| (i, row.as_slice()))
    }

    /// Fold all staged mutations into the dense committed range.
    ///
    /// Staged rows fill freed committed slots first, in ascending slot order,
    /// then extend the committed range. When removals outnumber staged rows,
    /// retained free slots are back-filled from the discarded tail before the
    /// range is truncated. Returns the new committed size. Flushing a clean
    /// table is a no-op.
    pub fn flush(&mut self) -> usize {
        let mut staged = self
            .segments
            .drain(..)
            .flatten()
            .flatten()
            .collect::<Vec<_>>()
            .into_iter();

        // Fill freed committed slots first.
        let mut leftover_free = BTreeSet::new();
        for slot in std::mem::take(&mut self.free_main) {
            match staged.next() {
                Some(row) => self.main[slot] = row,
                None => {
                    leftover_free.insert(slot);
                }
            }
        }
        // Append any remaining staged rows.
        self.main.extend(staged);

        // Shrink: back-fill retained free slots from the live tail.
        let new_size = self.main.len() - leftover_free.len();
        let mut end = self.main.len();
        while let Some(&slot) = leftover_free.iter().next() {
            if slot >= new_size {
                break;
            }
            leftover_free.remove(&slot);
            loop {
                end -= 1;
                if !leftover_free.remove(&end) {
                    break;
                }
            }
            self.main.swap(slot, end);
        }
        self.main.truncate(new_size);

        log::trace!("buffered table flushed to {new_size} rows");
        self.debug_assert_invariants();
        new_size
    }

    fn staged_slot_mut(&mut self, index: usize) -> Result<&mut Option<Vec<T>>, MeshHaloError> {
        let len = self.allocated_len();
        let offset = index
            .checked_sub(self.main.len())
            .ok_or(MeshHaloError::OutOfRange { index, len })?;
        let (seg, slot) = (offset / SEGMENT_CAPACITY, offset % SEGMENT_CAPACITY);
        self.segments
            .get_mut(seg)
            .and_then(|s| s.get_mut(slot))
            .ok_or(MeshHaloError::OutOfRange { index, len })
    }

    fn row_storage_mut(&mut self, index: usize) -> Result<&mut Vec<T>, MeshHaloError> {
        if index < self.main.len() {
            if self.free_main.contains(&index) {
                return Err(MeshHaloError::RowRemoved { index });
            }
            return Ok(&mut self.main[index]);
        }
        match self.staged_slot_mut(index)? {
            Some(row) => Ok(row),
            None => Err(MeshHaloError::RowRemoved { index }),
        }
    }
}

impl<T: Clone> DebugInvariants for BufferedTable<T> {
    fn debug_assert_invariants(&self) {
        crate::halo_debug_assert_ok!(self.validate_invariants(), "BufferedTable invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshHaloError> {
        if let Some(&slot) = self.free_main.iter().next_back() {
            if slot >= self.main.len() {
                return Err(MeshHaloError::OutOfRange {
                    index: slot,
                    len: self.main.len(),
                });
            }
        }
        // Only the last segment may be partially filled.
        if let Some((_, full)) = self.segments.split_last() {
            if full.iter().any(|seg| seg.len() != SEGMENT_CAPACITY) {
                return Err(MeshHaloError::SetupError(
                    "interior buffer segment below capacity",
                ));
            }
        }
        Ok(())
    }
}
