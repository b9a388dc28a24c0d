//! Blocking collective primitives built on the point-to-point facade.
//!
//! Every function here is a **synchronization barrier by contract**: a rank
//! entering the call returns only after all participating ranks have issued
//! the matching call. A rank that never reaches the call stalls its peers;
//! there is no timeout or partial-failure path.
//!
//! Each collective runs two phases per peer -- a fixed-size count, then the
//! payload -- and always drains every posted send handle before returning,
//! even on error.

use crate::comm::communicator::{CommTag, Communicator, Wait};
use crate::comm::wire::WireCount;
use crate::error::MeshHaloError;
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

fn typed_from_bytes<T: Pod>(
    raw: &[u8],
    n: usize,
    neighbor: usize,
) -> Result<Vec<T>, MeshHaloError> {
    let expected = n * size_of::<T>();
    if raw.len() != expected {
        return Err(MeshHaloError::CommError {
            neighbor,
            source: format!("expected {expected} payload bytes, got {}", raw.len()),
        });
    }
    let mut out = vec![T::zeroed(); n];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(raw);
    Ok(out)
}

fn decode_count(raw: Option<Vec<u8>>, neighbor: usize) -> Result<usize, MeshHaloError> {
    match raw {
        Some(data) if data.len() == size_of::<WireCount>() => {
            let mut cnt = WireCount::new(0);
            bytemuck::cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
            Ok(cnt.get())
        }
        Some(data) => Err(MeshHaloError::CommError {
            neighbor,
            source: format!(
                "expected {} bytes for size header, got {}",
                size_of::<WireCount>(),
                data.len()
            ),
        }),
        None => Err(MeshHaloError::CommError {
            neighbor,
            source: "failed to receive size header".into(),
        }),
    }
}

/// Broadcast `data` from `root` to every rank; returns the root's data on all
/// ranks. Blocking barrier.
pub fn broadcast<C: Communicator, T: Pod>(
    comm: &C,
    root: usize,
    data: &[T],
    tag: CommTag,
) -> Result<Vec<T>, MeshHaloError> {
    if comm.is_no_comm() || comm.size() <= 1 {
        return Ok(data.to_vec());
    }
    let me = comm.rank();
    if me == root {
        let cnt = WireCount::new(data.len());
        let mut pending = Vec::with_capacity(2 * (comm.size() - 1));
        for peer in (0..comm.size()).filter(|&p| p != me) {
            pending.push(comm.isend(
                peer,
                tag.offset(0),
                bytemuck::cast_slice(std::slice::from_ref(&cnt)),
            ));
            pending.push(comm.isend(peer, tag.offset(1), bytemuck::cast_slice(data)));
        }
        for send in pending {
            let _ = send.wait();
        }
        Ok(data.to_vec())
    } else {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            root,
            tag.offset(0),
            bytemuck::cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        let n = decode_count(h.wait(), root)?;
        let mut buf = vec![T::zeroed(); n];
        let h = comm.irecv(root, tag.offset(1), bytemuck::cast_slice_mut(&mut buf));
        match h.wait() {
            Some(raw) => typed_from_bytes(&raw, n, root),
            None => Err(MeshHaloError::CommError {
                neighbor: root,
                source: "failed to receive broadcast payload".into(),
            }),
        }
    }
}

/// Gather every rank's slice on every rank. `out[r]` holds rank `r`'s data;
/// the local slot is filled without self-messaging. Blocking barrier.
pub fn all_gather_v<C: Communicator, T: Pod>(
    comm: &C,
    local: &[T],
    tag: CommTag,
) -> Result<Vec<Vec<T>>, MeshHaloError> {
    if comm.is_no_comm() || comm.size() <= 1 {
        return Ok(vec![local.to_vec()]);
    }
    let me = comm.rank();
    let peers: Vec<usize> = (0..comm.size()).filter(|&r| r != me).collect();
    let mut pending_sends = Vec::with_capacity(2 * peers.len());
    let mut maybe_err: Option<MeshHaloError> = None;

    // Phase 1: exchange counts.
    let mut size_recvs = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.offset(0),
            bytemuck::cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        size_recvs.push((peer, h, cnt));
    }
    let my_count = WireCount::new(local.len());
    for &peer in &peers {
        pending_sends.push(comm.isend(
            peer,
            tag.offset(0),
            bytemuck::cast_slice(std::slice::from_ref(&my_count)),
        ));
    }
    let mut sizes = vec![0usize; comm.size()];
    sizes[me] = local.len();
    for (peer, h, _cnt) in size_recvs {
        match decode_count(h.wait(), peer) {
            Ok(n) => sizes[peer] = n,
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }

    // Phase 2: exchange payloads. Receive buffers stay alive next to their
    // handles until the wait completes.
    let mut data_recvs = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let mut buf = vec![T::zeroed(); sizes[peer]];
        let h = comm.irecv(peer, tag.offset(1), bytemuck::cast_slice_mut(&mut buf));
        data_recvs.push((peer, h, buf));
    }
    for &peer in &peers {
        pending_sends.push(comm.isend(peer, tag.offset(1), bytemuck::cast_slice(local)));
    }
    let mut out = vec![Vec::new(); comm.size()];
    out[me] = local.to_vec();
    for (peer, h, buf) in data_recvs {
        match h.wait() {
            Some(raw) => match typed_from_bytes(&raw, buf.len(), peer) {
                Ok(v) => out[peer] = v,
                Err(e) => {
                    maybe_err.get_or_insert(e);
                }
            },
            None => {
                maybe_err.get_or_insert(MeshHaloError::CommError {
                    neighbor: peer,
                    source: "failed to receive payload".into(),
                });
            }
        }
    }

    // Always drain all sends.
    for send in pending_sends {
        let _ = send.wait();
    }
    match maybe_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

/// Pairwise exchange: rank `r` receives `sends[r]` from every other rank.
/// `sends.len()` must equal the communicator size; the self slot passes
/// through untouched. Blocking barrier.
pub fn all_to_all_v<C: Communicator, T: Pod>(
    comm: &C,
    sends: &[Vec<T>],
    tag: CommTag,
) -> Result<Vec<Vec<T>>, MeshHaloError> {
    if sends.len() != comm.size() {
        return Err(MeshHaloError::SetupError(
            "all_to_all_v needs one send buffer per rank",
        ));
    }
    if comm.is_no_comm() || comm.size() <= 1 {
        return Ok(vec![sends[0].clone()]);
    }
    let me = comm.rank();
    let peers: Vec<usize> = (0..comm.size()).filter(|&r| r != me).collect();
    let mut pending_sends = Vec::with_capacity(2 * peers.len());
    let mut maybe_err: Option<MeshHaloError> = None;

    // Phase 1: exchange counts.
    let mut size_recvs = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.offset(0),
            bytemuck::cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        size_recvs.push((peer, h, cnt));
    }
    let counts: Vec<WireCount> = sends.iter().map(|s| WireCount::new(s.len())).collect();
    for &peer in &peers {
        pending_sends.push(comm.isend(
            peer,
            tag.offset(0),
            bytemuck::cast_slice(std::slice::from_ref(&counts[peer])),
        ));
    }
    let mut sizes = vec![0usize; comm.size()];
    for (peer, h, _cnt) in size_recvs {
        match decode_count(h.wait(), peer) {
            Ok(n) => sizes[peer] = n,
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }

    // Phase 2: exchange payloads. Receive buffers stay alive next to their
    // handles until the wait completes.
    let mut data_recvs = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let mut buf = vec![T::zeroed(); sizes[peer]];
        let h = comm.irecv(peer, tag.offset(1), bytemuck::cast_slice_mut(&mut buf));
        data_recvs.push((peer, h, buf));
    }
    for &peer in &peers {
        pending_sends.push(comm.isend(peer, tag.offset(1), bytemuck::cast_slice(&sends[peer])));
    }
    let mut out = vec![Vec::new(); comm.size()];
    out[me] = sends[me].clone();
    for (peer, h, buf) in data_recvs {
        match h.wait() {
            Some(raw) => match typed_from_bytes(&raw, buf.len(), peer) {
                Ok(v) => out[peer] = v,
                Err(e) => {
                    maybe_err.get_or_insert(e);
                }
            },
            None => {
                maybe_err.get_or_insert(MeshHaloError::CommError {
                    neighbor: peer,
                    source: "failed to receive payload".into(),
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }
    match maybe_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::communicator::NoComm;

    #[test]
    fn serial_short_circuits() {
        let comm = NoComm;
        let data = [1u64, 2, 3];
        assert_eq!(broadcast(&comm, 0, &data, CommTag(0x0200)).unwrap(), data);
        assert_eq!(
            all_gather_v(&comm, &data, CommTag(0x0210)).unwrap(),
            vec![data.to_vec()]
        );
        assert_eq!(
            all_to_all_v(&comm, &[data.to_vec()], CommTag(0x0220)).unwrap(),
            vec![data.to_vec()]
        );
    }

    #[test]
    fn all_to_all_requires_one_buffer_per_rank() {
        let comm = NoComm;
        assert!(all_to_all_v::<_, u64>(&comm, &[], CommTag(0x0230)).is_err());
    }
}
