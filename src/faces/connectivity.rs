//! Storage for the face -> {1 or 2 cells} relation.

use crate::debug_invariants::DebugInvariants;
use crate::error::MeshHaloError;
use crate::topology::buffered_table::{BufferedTable, Staged};
use crate::topology::flat_index::FlatIndex;

/// Sentinel for the missing second cell of a boundary face.
pub const UNKNOWN_CELL: usize = usize::MAX;

/// Sentinel for the face number of the missing second cell.
pub const UNKNOWN_FACE_NB: u32 = u32::MAX;

/// The face -> cell relation over one or more element sets.
///
/// Cells are addressed by their *global* index in the [`FlatIndex`] built
/// over the registered element sets; `locate` resolves them back to
/// `(set id, local element)` pairs.
///
/// Four buffered tables advance in lockstep (one row per face, identical
/// add/remove sequences), so a `flush` compacts them identically and a face
/// keeps one well-defined index across all of them.
#[derive(Clone, Debug, Default)]
pub struct FaceCellConnectivity {
    cells: FlatIndex<usize>,
    /// Per face: `[cell, second_cell_or_UNKNOWN]`.
    face_cells: BufferedTable<usize>,
    /// Per face: `[face_nb_in_cell, face_nb_in_second_cell_or_UNKNOWN]`.
    face_numbers: BufferedTable<u32>,
    /// Per face: the node ids the face was built from.
    face_nodes: BufferedTable<usize>,
    /// Per face: `[is_boundary]`.
    is_boundary: BufferedTable<bool>,
}

impl FaceCellConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element set of `size` cells under the continuous cell
    /// numbering. Re-registering is a no-op.
    pub fn register_cells(&mut self, set_id: usize, size: usize) {
        self.cells.add(set_id, size);
    }

    /// The continuous cell numbering over the registered element sets.
    #[inline]
    pub fn cells(&self) -> &FlatIndex<usize> {
        &self.cells
    }

    /// Resolve a continuous cell index to `(set id, local element)`.
    pub fn cell_ref(&self, cell: usize) -> Result<(usize, usize), MeshHaloError> {
        self.cells.locate(cell)
    }

    /// Number of committed faces.
    #[inline]
    pub fn len(&self) -> usize {
        self.face_cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.face_cells.is_empty()
    }

    /// Register a brand-new face seen from `cell`'s side; the face starts as
    /// a boundary face until a second cell closes it.
    pub fn add_face(&mut self, cell: usize, face_nb: u32, nodes: Vec<usize>) -> Staged {
        let staged = self.face_cells.add_row(vec![cell, UNKNOWN_CELL]);
        let staged_nb = self.face_numbers.add_row(vec![face_nb, UNKNOWN_FACE_NB]);
        let staged_nodes = self.face_nodes.add_row(nodes);
        let staged_bdry = self.is_boundary.add_row(vec![true]);
        debug_assert_eq!(staged.index(), staged_nb.index());
        debug_assert_eq!(staged.index(), staged_nodes.index());
        debug_assert_eq!(staged.index(), staged_bdry.index());
        staged
    }

    /// Record the second cell of face `face` (committed or staged index) and
    /// clear its boundary flag.
    pub fn close_face(
        &mut self,
        face: usize,
        cell: usize,
        face_nb: u32,
    ) -> Result<(), MeshHaloError> {
        let row = self.face_cells.staged_row(face)?;
        if row.len() != 2 || row[1] != UNKNOWN_CELL {
            return Err(MeshHaloError::SetupError(
                "face already has two cell references",
            ));
        }
        let first = row[0];
        let first_nb = self.face_numbers.staged_row(face)?[0];
        self.face_cells.set_row(face, &[first, cell])?;
        self.face_numbers.set_row(face, &[first_nb, face_nb])?;
        self.is_boundary.set_row(face, &[false])?;
        Ok(())
    }

    /// Drop face `face` from all tables (e.g. when it is promoted into an
    /// interface connectivity).
    pub fn remove_face(&mut self, face: usize) -> Result<(), MeshHaloError> {
        self.face_cells.remove_row(face)?;
        self.face_numbers.remove_row(face)?;
        self.face_nodes.remove_row(face)?;
        self.is_boundary.remove_row(face)?;
        Ok(())
    }

    /// Commit staged faces in all tables; returns the face count.
    pub fn flush(&mut self) -> usize {
        let n = self.face_cells.flush();
        self.face_numbers.flush();
        self.face_nodes.flush();
        self.is_boundary.flush();
        self.debug_assert_invariants();
        n
    }

    /// True when no staged face or pending removal exists.
    pub fn is_flushed(&self) -> bool {
        self.face_cells.allocated_len() == self.face_cells.len()
            && self.face_cells.live_len() == self.face_cells.len()
    }

    /// The face -> cells table: rows `[cell, second_cell_or_UNKNOWN]`.
    pub fn connectivity(&self) -> &BufferedTable<usize> {
        &self.face_cells
    }

    /// The face -> face-number table, same layout as `connectivity()`.
    pub fn face_number(&self) -> &BufferedTable<u32> {
        &self.face_numbers
    }

    /// Node ids of committed face `face`.
    pub fn face_nodes(&self, face: usize) -> Result<&[usize], MeshHaloError> {
        self.face_nodes.row(face)
    }

    /// Node ids of any allocated face, committed or staged.
    pub(crate) fn staged_face_nodes(&self, face: usize) -> Result<&[usize], MeshHaloError> {
        self.face_nodes.staged_row(face)
    }

    pub(crate) fn staged_face_cells(&self, face: usize) -> Result<&[usize], MeshHaloError> {
        self.face_cells.staged_row(face)
    }

    /// Boundary flag of committed face `face`.
    pub fn is_boundary(&self, face: usize) -> Result<bool, MeshHaloError> {
        Ok(self.is_boundary.row(face)?[0])
    }

    /// Boundary flags of all committed faces, by face index.
    pub fn boundary_flags(&self) -> Vec<bool> {
        (0..self.len())
            .map(|f| self.is_boundary.row(f).map(|r| r[0]).unwrap_or(false))
            .collect()
    }

    pub fn nb_boundary_faces(&self) -> usize {
        self.boundary_flags().iter().filter(|&&b| b).count()
    }

    pub fn nb_inner_faces(&self) -> usize {
        self.len() - self.nb_boundary_faces()
    }

    /// OR the face-level boundary flags back onto the cells, so region-level
    /// boundary detection can skip fully-interior regions cheaply.
    pub fn cell_boundary_flags(&self) -> Result<Vec<bool>, MeshHaloError> {
        let mut flags = vec![false; self.cells.total_len()];
        for f in 0..self.len() {
            if self.is_boundary(f)? {
                let cell = self.face_cells.row(f)?[0];
                if let Some(flag) = flags.get_mut(cell) {
                    *flag = true;
                }
            }
        }
        Ok(flags)
    }

    /// Inverse relation: for each cell, the faces referencing it.
    pub fn cell_faces(&self) -> Result<Vec<Vec<usize>>, MeshHaloError> {
        let mut faces = vec![Vec::new(); self.cells.total_len()];
        for (f, row) in self.face_cells.iter() {
            for &cell in row.iter().filter(|&&c| c != UNKNOWN_CELL) {
                let slot = faces.get_mut(cell).ok_or(MeshHaloError::OutOfRange {
                    index: cell,
                    len: self.cells.total_len(),
                })?;
                slot.push(f);
            }
        }
        Ok(faces)
    }
}

impl DebugInvariants for FaceCellConnectivity {
    fn debug_assert_invariants(&self) {
        crate::halo_debug_assert_ok!(self.validate_invariants(), "FaceCellConnectivity invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshHaloError> {
        if self.face_numbers.len() != self.face_cells.len()
            || self.face_nodes.len() != self.face_cells.len()
            || self.is_boundary.len() != self.face_cells.len()
        {
            return Err(MeshHaloError::SetupError(
                "face tables out of lockstep",
            ));
        }
        for (f, row) in self.face_cells.iter() {
            if row.len() != 2 {
                return Err(MeshHaloError::SetupError("face row must hold two slots"));
            }
            let bdry = self.is_boundary.row(f)?[0];
            match (bdry, row[1]) {
                // A boundary face has exactly one cell reference.
                (true, second) if second != UNKNOWN_CELL => {
                    return Err(MeshHaloError::SetupError(
                        "boundary face with two cell references",
                    ));
                }
                // An inner face has exactly two distinct cell references.
                (false, second) if second == UNKNOWN_CELL || second == row[0] => {
                    return Err(MeshHaloError::SetupError(
                        "inner face without two distinct cells",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
