//! Communication algorithms: rank messaging, wire format and halo epochs.

pub mod communicator;
pub mod halo;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalComm, NoComm, ReduceOp, Wait};
pub use halo::{CompletedEpoch, HaloEpoch, HaloExchange, ParallelOps, PatchTicket};
