//! FvError: unified error type for fv-ldu public APIs.
//!
//! Fatal conditions (bad configuration, inconsistent topology, broken halo
//! bookkeeping) are reported through this enum. Numerical trouble such as a
//! singular row or a solve that runs out of iterations is *not* an error; it is
//! surfaced in [`SolverReport`](crate::solvers::SolverReport).

use thiserror::Error;

/// Coarse classification of an [`FvError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Topology,
    Communication,
    Assembly,
}

/// Unified error type for fv-ldu operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FvError {
    /// A runtime-selected name (solver, preconditioner, patch field type, …)
    /// is not registered.
    #[error("Unknown {family} '{name}'{context}; valid options are: {}", .valid.join(", "))]
    UnknownName {
        family: &'static str,
        name: String,
        context: String,
        valid: Vec<String>,
    },
    /// A patch field variant was attached to a patch of the wrong kind.
    #[error(
        "inconsistent patch and patch field types for field '{field}' patch '{patch}': \
         patch field type '{patch_field_type}' requires a {required} patch, found {found}"
    )]
    PatchKindMismatch {
        field: String,
        patch: String,
        patch_field_type: String,
        required: &'static str,
        found: &'static str,
    },
    /// A configuration entry has an invalid value.
    #[error("Invalid configuration for {entry}: {reason}")]
    InvalidConfiguration { entry: String, reason: String },

    /// A face references a cell outside `0..n_cells`.
    #[error("Topology error: face {face} references cell {cell}, but the mesh has {n_cells} cells")]
    InvalidCellIndex {
        face: usize,
        cell: usize,
        n_cells: usize,
    },
    /// An internal face whose owner is not strictly below its neighbour.
    #[error("Topology error: internal face {face} has owner {owner} and neighbour {neighbour} (owner must be < neighbour)")]
    FaceOrdering {
        face: usize,
        owner: usize,
        neighbour: usize,
    },
    /// Patch face ranges do not partition the boundary faces.
    #[error("Topology error: patch '{patch}' {reason}")]
    PatchRange { patch: String, reason: String },
    /// A coupled patch points at a missing or inconsistent partner.
    #[error("Topology error: coupled patch '{patch}' {reason}")]
    CouplingPartner { patch: String, reason: String },
    /// Array length does not match the topology it is attached to.
    #[error("Size mismatch for {what}: expected {expected}, found {found}")]
    SizeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },
    /// A field was built for an older topology than the current mesh state.
    #[error("Field '{field}' was built for topology version {field_version}, mesh is at version {mesh_version}")]
    StaleTopology {
        field: String,
        field_version: u64,
        mesh_version: u64,
    },

    /// A coupled patch was assembled before its halo epoch was flushed.
    #[error("Coupled patch '{patch}' of field '{field}' has not been evaluated in this pass")]
    StaleCoupledPatch { field: String, patch: String },

    /// No data arrived for a coupled patch in a completed halo epoch.
    #[error("Halo exchange: no data staged for the partner of patch '{patch}'")]
    HaloNotStaged { patch: String },
    /// A ticket was redeemed against an epoch it does not belong to.
    #[error("Halo exchange: ticket for patch '{patch}' belongs to epoch {ticket_epoch}, not {epoch}")]
    EpochMismatch {
        patch: String,
        ticket_epoch: u64,
        epoch: u64,
    },
    /// Point-to-point or collective communication failed.
    #[error("Communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
}

impl FvError {
    /// Which family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use FvError::*;
        match self {
            UnknownName { .. } | PatchKindMismatch { .. } | InvalidConfiguration { .. } => {
                ErrorKind::Configuration
            }
            InvalidCellIndex { .. }
            | FaceOrdering { .. }
            | PatchRange { .. }
            | CouplingPartner { .. }
            | SizeMismatch { .. }
            | StaleTopology { .. } => ErrorKind::Topology,
            StaleCoupledPatch { .. } => ErrorKind::Assembly,
            HaloNotStaged { .. } | EpochMismatch { .. } | CommError { .. } => {
                ErrorKind::Communication
            }
        }
    }

    pub(crate) fn size_mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        FvError::SizeMismatch {
            what: what.into(),
            expected,
            found,
        }
    }
}
