//! Thin facade over in-process loopback or inter-process (MPI) message
//! passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees). All
//! handles are **waitable** but non-blocking -- the collective layer calls
//! `.wait()` before it trusts that a buffer is ready.
//!
//! There is no global "current rank": a `Communicator` value carries its rank
//! and size, and every distributed algorithm takes one explicitly.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Typed message-tag namespace. Protocol phases derive sub-tags with
/// [`offset`](CommTag::offset) so concurrent rounds never collide.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    /// The namespace's base tag.
    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }

    /// The `k`-th sub-tag of this namespace.
    #[inline]
    pub const fn offset(self, k: u16) -> u16 {
        self.0 + k
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive. `buf.len()` bounds how many bytes the completed
    /// receive will deliver; longer messages are truncated.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process's rank in `[0, size)`.
    fn rank(&self) -> usize;
    /// Number of participating ranks.
    fn size(&self) -> usize;
    /// True for the compile-time no-op backend; collectives short-circuit.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Compile-time no-op comm for pure serial paths and unit tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- LoopbackComm: several "ranks" inside one process ---

type Key = (usize, usize, u16); // (src, dst, tag)

/// Process-wide mailbox; FIFO per (src, dst, tag) key. Tests sharing it must
/// not interleave (see `serial_test` in the integration tests).
static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);

pub struct LocalHandle {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
}

impl Wait for LocalHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.buf.lock().take()
    }
}

/// In-process loopback transport: each "rank" is a value (usually living on
/// its own thread) exchanging messages through the process-wide mailbox.
///
/// This is the test harness substitute for MPI: multi-rank protocols run on
/// threads with identical code paths and blocking semantics.
#[derive(Clone, Debug)]
pub struct LoopbackComm {
    rank: usize,
    nranks: usize,
}

impl LoopbackComm {
    pub fn new(rank: usize, nranks: usize) -> Self {
        assert!(rank < nranks, "rank must be below nranks");
        Self { rank, nranks }
    }
}

impl Communicator for LoopbackComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::from(buf.to_vec()));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        let key = (peer, self.rank, tag);
        let slot = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let max_len = buf.len();
        let handle = std::thread::spawn(move || {
            loop {
                let popped = MAILBOX.get_mut(&key).and_then(|mut q| q.pop_front());
                if let Some(bytes) = popped {
                    let n = max_len.min(bytes.len());
                    *slot_clone.lock() = Some(bytes[..n].to_vec());
                    break;
                }
                std::thread::yield_now();
            }
        });
        LocalHandle {
            buf: slot,
            handle: Some(handle),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.nranks
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::point_to_point::{Destination, Source};
    use mpi::topology::Communicator as _;

    /// MPI-backed communicator over `MPI_COMM_WORLD`.
    pub struct MpiComm {
        _universe: mpi::environment::Universe,
        world: mpi::topology::SimpleCommunicator,
        rank: usize,
        nranks: usize,
    }

    impl MpiComm {
        pub fn new() -> Self {
            let universe = mpi::initialize().expect("MPI already initialized");
            let world = universe.world();
            let rank = world.rank() as usize;
            let nranks = world.size() as usize;
            Self {
                _universe: universe,
                world,
                rank,
                nranks,
            }
        }
    }

    /// A completed (eager) send.
    pub struct MpiSendHandle;

    impl Wait for MpiSendHandle {
        fn wait(self) -> Option<Vec<u8>> {
            None
        }
    }

    /// A receive deferred to `wait()`; the collective layer posts all
    /// receives before it waits on any of them, which matches the blocking
    /// semantics of the exchange protocols in this crate.
    pub struct MpiRecvHandle {
        world: mpi::topology::SimpleCommunicator,
        peer: usize,
        tag: u16,
        max_len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let (mut data, _status) = self
                .world
                .process_at_rank(self.peer as i32)
                .receive_vec_with_tag::<u8>(self.tag as i32);
            data.truncate(self.max_len);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
            MpiSendHandle
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
            MpiRecvHandle {
                world: self.world.duplicate(),
                peer,
                tag,
                max_len: buf.len(),
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.nranks
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_serial() {
        let comm = NoComm;
        assert!(comm.is_no_comm());
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert!(comm.isend(0, 1, &[1, 2, 3]).wait().is_none());
    }

    #[test]
    fn loopback_roundtrip_two_ranks() {
        let tag = CommTag(0x0100);
        let comm0 = LoopbackComm::new(0, 2);
        let comm1 = LoopbackComm::new(1, 2);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, tag.base(), &mut recv_buf);
        comm0.isend(1, tag.base(), &[1, 2, 3, 4]).wait();

        let data = recv_handle.wait().expect("expected data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn loopback_fifo_order() {
        let tag = CommTag(0x0110);
        let c0 = LoopbackComm::new(0, 2);
        let c1 = LoopbackComm::new(1, 2);

        for i in 0..10u8 {
            c0.isend(1, tag.base(), &[i]);
        }
        let mut out = Vec::new();
        for _ in 0..10 {
            let mut b = [0u8; 1];
            let h = c1.irecv(0, tag.base(), &mut b);
            out.push(h.wait().unwrap()[0]);
        }
        assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
    }

    #[test]
    fn loopback_truncates_to_buffer() {
        let tag = CommTag(0x0120);
        let c0 = LoopbackComm::new(0, 2);
        let c1 = LoopbackComm::new(1, 2);

        c0.isend(1, tag.base(), &[1, 2, 3, 4, 5, 6]);
        let mut b = [0u8; 4];
        let h = c1.irecv(0, tag.base(), &mut b);
        assert_eq!(h.wait().unwrap(), vec![1, 2, 3, 4]);
    }
}
