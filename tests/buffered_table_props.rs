//! Property tests for the buffered table's flush semantics.

use mesh_halo::topology::buffered_table::BufferedTable;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Add(Vec<u16>),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(any::<u16>(), 0..6).prop_map(Op::Add),
        1 => (0usize..64).prop_map(Op::Remove),
    ]
}

/// Apply ops to the table and to a plain mirror of allocated slots.
fn apply(ops: &[Op]) -> (BufferedTable<u16>, Vec<Option<Vec<u16>>>) {
    let mut table = BufferedTable::new();
    let mut mirror: Vec<Option<Vec<u16>>> = Vec::new();
    for op in ops {
        match op {
            Op::Add(row) => {
                let staged = table.add_row(row.clone());
                assert_eq!(staged.index(), mirror.len());
                mirror.push(Some(row.clone()));
            }
            Op::Remove(slot) => {
                // Target a live allocated slot, if any.
                let live: Vec<usize> = mirror
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.is_some())
                    .map(|(i, _)| i)
                    .collect();
                if live.is_empty() {
                    continue;
                }
                let index = live[slot % live.len()];
                table.remove_row(index).unwrap();
                mirror[index] = None;
            }
        }
    }
    (table, mirror)
}

fn sorted_rows(rows: impl IntoIterator<Item = Vec<u16>>) -> Vec<Vec<u16>> {
    let mut v: Vec<Vec<u16>> = rows.into_iter().collect();
    v.sort();
    v
}

proptest! {
    /// After a flush the table is dense and holds exactly adds - removes rows.
    #[test]
    fn flush_leaves_no_gaps(ops in prop::collection::vec(op_strategy(), 0..120)) {
        let (mut table, mirror) = apply(&ops);
        let live: Vec<Vec<u16>> = mirror.into_iter().flatten().collect();

        let n = table.flush();
        prop_assert_eq!(n, live.len());
        prop_assert_eq!(table.len(), live.len());
        for i in 0..n {
            prop_assert!(table.row(i).is_ok());
        }
        prop_assert!(table.row(n).is_err());

        let got = sorted_rows((0..n).map(|i| table.row(i).unwrap().to_vec()));
        prop_assert_eq!(got, sorted_rows(live));
    }

    /// Flushing twice in a row changes nothing.
    #[test]
    fn flush_is_idempotent(ops in prop::collection::vec(op_strategy(), 0..120)) {
        let (mut table, _) = apply(&ops);
        let n = table.flush();
        let rows: Vec<Vec<u16>> = (0..n).map(|i| table.row(i).unwrap().to_vec()).collect();
        prop_assert_eq!(table.flush(), n);
        let again: Vec<Vec<u16>> = (0..n).map(|i| table.row(i).unwrap().to_vec()).collect();
        prop_assert_eq!(rows, again);
    }

    /// Staged handles of an append-only batch survive the flush unchanged.
    #[test]
    fn append_only_indices_stable(rows in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..4), 1..40)) {
        let mut table = BufferedTable::new();
        let handles: Vec<_> = rows.iter().map(|r| table.add_row(r.clone())).collect();
        table.flush();
        for (handle, row) in handles.iter().zip(&rows) {
            prop_assert_eq!(table.row(handle.index()).unwrap(), row.as_slice());
        }
    }
}
