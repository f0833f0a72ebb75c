//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the halo layer posts every
//! send and receive of an epoch first and only then calls `.wait()`.
//!
//! Backends:
//! - [`NoComm`]: single rank, every transfer is a no-op.
//! - [`LocalComm`]: several ranks inside one process sharing a mailbox hub
//!   (one thread per rank in tests).
//! - `MpiComm`: MPI point-to-point and collectives (feature `mpi-support`).

use crate::fv_error::FvError;
use crate::types::Scalar;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Message tag separating independent communication streams.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }
    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Deterministic derived tag.
    #[inline]
    pub const fn offset(self, by: u16) -> Self {
        CommTag(self.0.wrapping_add(by))
    }
}

/// Tag reserved for collective reductions.
pub const REDUCE_TAG: CommTag = CommTag(0xFEED);
/// First tag used by processor-patch halo traffic; patch tags are offsets.
pub const HALO_TAG_BASE: CommTag = CommTag(0x4800);

/// Combination rule for [`Communicator::all_reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

impl ReduceOp {
    /// Fold values in the given (rank) order.
    pub fn fold(self, values: impl IntoIterator<Item = Scalar>) -> Scalar {
        let mut it = values.into_iter();
        let first = it.next().unwrap_or(0.0);
        it.fold(first, |acc, v| match self {
            ReduceOp::Sum => acc + v,
            ReduceOp::Max => acc.max(v),
            ReduceOp::Min => acc.min(v),
        })
    }
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// True only for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;

    /// Post a receive. `buf` gives the expected message length; the received
    /// payload is returned by [`Wait::wait`] in full so callers can validate it.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Combine one value from every rank; every rank obtains the same result.
    ///
    /// The default implementation exchanges values point-to-point and folds
    /// them in rank order, so results are bitwise identical across ranks.
    fn all_reduce(&self, value: Scalar, op: ReduceOp) -> Result<Scalar, FvError> {
        let n = self.size();
        if n <= 1 {
            return Ok(value);
        }
        let me = self.rank();
        let payload = value.to_le_bytes();
        let sends: Vec<_> = (0..n)
            .filter(|&p| p != me)
            .map(|p| self.isend(p, REDUCE_TAG.base(), &payload))
            .collect();
        let mut scratch = [0u8; std::mem::size_of::<Scalar>()];
        let recvs: Vec<_> = (0..n)
            .filter(|&p| p != me)
            .map(|p| (p, self.irecv(p, REDUCE_TAG.base(), &mut scratch)))
            .collect();
        let mut values = vec![0.0 as Scalar; n];
        values[me] = value;
        for (peer, h) in recvs {
            let data = h.wait().ok_or_else(|| FvError::CommError {
                neighbor: peer,
                reason: "reduction receive returned no data".into(),
            })?;
            let bytes: [u8; std::mem::size_of::<Scalar>()] =
                data.as_slice().try_into().map_err(|_| FvError::CommError {
                    neighbor: peer,
                    reason: format!("reduction payload has {} bytes", data.len()),
                })?;
            values[peer] = Scalar::from_le_bytes(bytes);
        }
        for s in sends {
            let _ = s.wait();
        }
        Ok(op.fold(values))
    }

    /// Block until every rank reaches this point.
    fn barrier(&self) -> Result<(), FvError> {
        self.all_reduce(0.0, ReduceOp::Sum).map(|_| ())
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- LocalComm: several ranks inside one process ---
type Key = (usize, usize, u16); // (src, dst, tag)

/// Mailbox shared by all ranks of one [`LocalComm`] group.
#[derive(Debug, Default)]
pub struct LocalHub {
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    lock: Mutex<()>,
    arrived: Condvar,
}

impl LocalHub {
    fn post(&self, key: Key, data: Bytes) {
        self.mailbox.entry(key).or_default().push_back(data);
        let _guard = self.lock.lock();
        self.arrived.notify_all();
    }

    fn take(&self, key: &Key) -> Option<Bytes> {
        self.mailbox.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

/// In-process rank; messages between the same `(src, dst, tag)` stay FIFO.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    hub: Arc<LocalHub>,
}

impl LocalComm {
    /// Create `size` ranks sharing one hub.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let hub = Arc::new(LocalHub::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                hub: Arc::clone(&hub),
            })
            .collect()
    }
}

pub struct LocalHandle {
    hub: Arc<LocalHub>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(bytes) = self.hub.take(&self.key) {
                return Some(bytes.to_vec());
            }
            let mut guard = self.hub.lock.lock();
            if let Some(bytes) = self.hub.take(&self.key) {
                return Some(bytes.to_vec());
            }
            self.hub.arrived.wait_for(&mut guard, Duration::from_millis(1));
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.hub.post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            hub: Arc::clone(&self.hub),
            key: (peer, self.rank, tag),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI communicator wrapper; the caller owns the MPI universe.
    pub struct MpiComm {
        world: Arc<SimpleCommunicator>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                world: Arc::new(world),
                rank,
                size,
            }
        }
    }

    /// Outstanding non-blocking send; the payload is owned until completion.
    pub struct MpiSend {
        finish: Option<Box<dyn FnOnce()>>,
    }

    impl Wait for MpiSend {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(f) = self.finish.take() {
                f();
            }
            None
        }
    }

    /// Matched receive, completed in [`Wait::wait`].
    pub struct MpiRecv {
        world: Arc<SimpleCommunicator>,
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let (data, _status) = self
                .world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
            let owned: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = owned;
            // SAFETY: the leaked buffer is only read by the request and freed after it completes.
            let payload: &'static [u8] = unsafe { &*ptr };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, payload, tag as i32);
            MpiSend {
                finish: Some(Box::new(move || {
                    request.wait();
                    // SAFETY: the request has completed; nothing references the buffer anymore.
                    unsafe { drop(Box::from_raw(ptr)) };
                })),
            }
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecv {
            MpiRecv {
                world: Arc::clone(&self.world),
                peer: peer as i32,
                tag: tag as i32,
            }
        }

        fn all_reduce(&self, value: Scalar, op: ReduceOp) -> Result<Scalar, FvError> {
            let mut out: Scalar = 0.0;
            let sys = match op {
                ReduceOp::Sum => SystemOperation::sum(),
                ReduceOp::Max => SystemOperation::max(),
                ReduceOp::Min => SystemOperation::min(),
            };
            self.world.all_reduce_into(&value, &mut out, sys);
            Ok(out)
        }

        fn barrier(&self) -> Result<(), FvError> {
            self.world.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
