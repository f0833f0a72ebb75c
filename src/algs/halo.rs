//! Epoch-based halo exchange for coupled patches.
//!
//! One exchange round is an *epoch*:
//!
//! 1. [`HaloExchange::begin`] opens a [`HaloEpoch`].
//! 2. [`HaloEpoch::init_send`] stages the local patch-internal values of each
//!    coupled patch and hands back a [`PatchTicket`]. Processor patches post
//!    their send and matching receive immediately; periodic and non-conformal
//!    patches are kept in the epoch and resolved locally.
//! 3. [`HaloEpoch::flush`] waits for every outstanding transfer and yields a
//!    [`CompletedEpoch`].
//! 4. [`CompletedEpoch::receive`] redeems a ticket for the neighbour-side
//!    values of that patch.
//!
//! Receiving before flushing is not expressible, and a ticket from one epoch
//! is rejected by any other epoch.

use crate::algs::communicator::{Communicator, HALO_TAG_BASE, ReduceOp, Wait};
use crate::algs::wire;
use crate::fv_error::FvError;
use crate::topology::{CouplingKind, PatchId, Topology};
use crate::types::{FieldValue, Scalar};
use hashbrown::HashMap;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

/// Entry point for halo epochs on one partition.
pub struct HaloExchange<'c, C: Communicator> {
    topology: Arc<Topology>,
    comm: &'c C,
    next_epoch: Cell<u64>,
}

impl<'c, C: Communicator> HaloExchange<'c, C> {
    pub fn new(topology: Arc<Topology>, comm: &'c C) -> Self {
        Self {
            topology,
            comm,
            next_epoch: Cell::new(0),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn comm(&self) -> &C {
        self.comm
    }

    /// Open a new epoch for values of type `T`.
    ///
    /// Every rank must open epochs in the same order.
    pub fn begin<T: FieldValue>(&self) -> HaloEpoch<'_, 'c, C, T> {
        let epoch = self.next_epoch.get();
        self.next_epoch.set(epoch + 1);
        HaloEpoch {
            exchange: self,
            epoch,
            local: HashMap::new(),
            sends: Vec::new(),
            recvs: Vec::new(),
        }
    }
}

/// Claim on the neighbour-side values of one patch in one epoch.
#[derive(Debug)]
#[must_use = "a ticket must be redeemed against the completed epoch"]
pub struct PatchTicket<T> {
    patch: PatchId,
    epoch: u64,
    _values: PhantomData<T>,
}

impl<T> PatchTicket<T> {
    pub fn patch(&self) -> PatchId {
        self.patch
    }
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

struct PendingRecv<H> {
    patch: PatchId,
    peer: usize,
    handle: H,
}

/// An open exchange round; see the module docs.
pub struct HaloEpoch<'h, 'c, C: Communicator, T: FieldValue> {
    exchange: &'h HaloExchange<'c, C>,
    epoch: u64,
    local: HashMap<PatchId, Vec<T>>,
    sends: Vec<C::SendHandle>,
    recvs: Vec<PendingRecv<C::RecvHandle>>,
}

impl<'h, 'c, C: Communicator, T: FieldValue> HaloEpoch<'h, 'c, C, T> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Stage `values` (patch-internal values in patch face order) for `patch`.
    ///
    /// # Errors
    /// Fails if the patch is not coupled or `values` has the wrong length.
    pub fn init_send(&mut self, patch: PatchId, values: &[T]) -> Result<PatchTicket<T>, FvError> {
        let topo = &self.exchange.topology;
        let desc = topo.patches().get(patch).ok_or_else(|| FvError::PatchRange {
            patch: format!("#{patch}"),
            reason: format!("does not exist (topology has {} patches)", topo.patches().len()),
        })?;
        if values.len() != desc.size() {
            return Err(FvError::size_mismatch(
                format!("halo values for patch '{}'", desc.name()),
                desc.size(),
                values.len(),
            ));
        }
        match desc.coupling() {
            CouplingKind::None => {
                return Err(FvError::CouplingPartner {
                    patch: desc.name().to_string(),
                    reason: "is not coupled and cannot take part in a halo exchange".into(),
                });
            }
            CouplingKind::Processor { neighbour_rank, tag } => {
                let tag = HALO_TAG_BASE.offset(*tag).as_u16();
                let comm = self.exchange.comm;
                let mut buf = vec![0u8; wire::message_len::<T>(values.len())];
                let handle = comm.irecv(*neighbour_rank, tag, &mut buf);
                self.recvs.push(PendingRecv {
                    patch,
                    peer: *neighbour_rank,
                    handle,
                });
                let bytes = wire::encode_values(values, self.epoch);
                self.sends.push(comm.isend(*neighbour_rank, tag, &bytes));
            }
            CouplingKind::Periodic { .. } | CouplingKind::NonConformal { .. } => {
                self.local.insert(patch, values.to_vec());
            }
        }
        Ok(PatchTicket {
            patch,
            epoch: self.epoch,
            _values: PhantomData,
        })
    }

    /// Complete every outstanding transfer of this epoch.
    ///
    /// Blocks until all processor-patch messages have arrived.
    pub fn flush(self) -> Result<CompletedEpoch<T>, FvError> {
        let topo = &self.exchange.topology;
        let mut received: HashMap<PatchId, Vec<T>> = HashMap::with_capacity(self.recvs.len() + self.local.len());

        for r in self.recvs {
            let data = r.handle.wait().ok_or_else(|| FvError::CommError {
                neighbor: r.peer,
                reason: format!("no data for patch '{}'", topo.patch(r.patch).name()),
            })?;
            let values = wire::decode_values::<T>(&data, topo.patch(r.patch).size(), self.epoch, r.peer)?;
            received.insert(r.patch, values);
        }
        for s in self.sends {
            let _ = s.wait();
        }

        for &patch in self.local.keys() {
            let desc = topo.patch(patch);
            let Some(partner) = desc.coupling().local_partner() else {
                continue;
            };
            let Some(from) = self.local.get(&partner) else {
                continue;
            };
            let values = match desc.coupling() {
                CouplingKind::Periodic { transform, .. } => match transform.rotation() {
                    Some(r) => from.iter().map(|v| v.transform(r)).collect(),
                    None => from.clone(),
                },
                CouplingKind::NonConformal { stencil, .. } => stencil
                    .iter()
                    .map(|row| {
                        row.iter()
                            .fold(T::zero(), |acc, &(face, w)| acc + from[face] * w)
                    })
                    .collect(),
                _ => continue,
            };
            received.insert(patch, values);
        }

        log::debug!(
            "halo epoch {} flushed on rank {}: {} patch(es) received",
            self.epoch,
            self.exchange.comm.rank(),
            received.len()
        );
        Ok(CompletedEpoch {
            epoch: self.epoch,
            topology: Arc::clone(topo),
            received,
        })
    }
}

/// Result of a flushed epoch; tickets are redeemed here.
pub struct CompletedEpoch<T> {
    epoch: u64,
    topology: Arc<Topology>,
    received: HashMap<PatchId, Vec<T>>,
}

impl<T: FieldValue> CompletedEpoch<T> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Neighbour-side values for the ticket's patch.
    ///
    /// # Errors
    /// `EpochMismatch` for a ticket of another epoch, `HaloNotStaged` when the
    /// partner patch was never staged.
    pub fn receive(&mut self, ticket: PatchTicket<T>) -> Result<Vec<T>, FvError> {
        let name = || self.topology.patch(ticket.patch).name().to_string();
        if ticket.epoch != self.epoch {
            return Err(FvError::EpochMismatch {
                patch: name(),
                ticket_epoch: ticket.epoch,
                epoch: self.epoch,
            });
        }
        match self.received.remove(&ticket.patch) {
            Some(v) => Ok(v),
            None => Err(FvError::HaloNotStaged { patch: name() }),
        }
    }
}

/// Object-safe view of the parallel services a linear solver needs.
pub trait ParallelOps {
    fn n_ranks(&self) -> usize;

    fn reduce(&self, value: Scalar, op: ReduceOp) -> Result<Scalar, FvError>;

    fn sum(&self, value: Scalar) -> Result<Scalar, FvError> {
        self.reduce(value, ReduceOp::Sum)
    }

    /// One complete epoch over scalar data: stage each `(patch, values)` and
    /// return the neighbour-side values in the same order.
    fn swap_patch_values(&self, staged: &[(PatchId, Vec<Scalar>)]) -> Result<Vec<Vec<Scalar>>, FvError>;
}

impl<C: Communicator> ParallelOps for HaloExchange<'_, C> {
    fn n_ranks(&self) -> usize {
        self.comm.size()
    }

    fn reduce(&self, value: Scalar, op: ReduceOp) -> Result<Scalar, FvError> {
        self.comm.all_reduce(value, op)
    }

    fn swap_patch_values(&self, staged: &[(PatchId, Vec<Scalar>)]) -> Result<Vec<Vec<Scalar>>, FvError> {
        let mut epoch = self.begin::<Scalar>();
        let tickets = staged
            .iter()
            .map(|(patch, values)| epoch.init_send(*patch, values))
            .collect::<Result<Vec<_>, _>>()?;
        let mut done = epoch.flush()?;
        tickets.into_iter().map(|t| done.receive(t)).collect()
    }
}
