#![cfg_attr(docsrs, feature(doc_cfg))]
//! # fv-ldu
//!
//! fv-ldu is a finite-volume discretization and linear-solve engine for
//! unstructured, face-addressed meshes. Cell-centred fields carry one
//! boundary condition per patch; term builders assemble sparse equations in
//! lower/diagonal/upper (LDU) form; a registry of iterative solvers picks a
//! solver by name and matrix structure; and coupled patches (processor,
//! periodic, non-conformal) exchange data through explicit halo epochs.
//!
//! ## Features
//! - Face-addressed [`Topology`](topology::Topology) with contiguous boundary patches
//! - Boundary conditions `fixedValue`, `fixedGradient`, `zeroGradient`, `mixed`
//!   and `coupled`, selectable by name from serde configuration
//! - Euler time derivative, convection, diffusion and source terms
//! - `diagonal`, `PCG`, `PBiCGStab` and `smoothSolver` with `DIC`/`DILU`/
//!   `diagonal` preconditioning and Gauss-Seidel smoothing
//! - Segregated solution of vector and tensor fields
//! - In-process multi-rank communicator for tests; MPI behind `mpi-support`
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! fv-ldu = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon", "single-precision"]
//! ```
//!
//! A steady diffusion solve on a three-cell line:
//!
//! ```
//! use fv_ldu::prelude::*;
//!
//! let topo = build_topology(
//!     3,
//!     vec![0, 1, 0, 2],
//!     vec![1, 2],
//!     vec![PatchDescriptor::wall("left", 2, 1), PatchDescriptor::wall("right", 3, 1)],
//! )?;
//! let mesh = MeshState::with_unit_geometry(topo);
//! let registry = PatchFieldRegistry::with_builtin();
//! let mut t = Field::uniform("T", &mesh, 0.0, &registry, |patch| match patch {
//!     "left" => PatchFieldSpec::fixed_value(1.0),
//!     _ => PatchFieldSpec::fixed_value(0.0),
//! })?;
//!
//! let eq = -EquationAssembler::new(&mesh).diffusion(Coeff::Uniform(1.0), &mut t)?;
//! let comm = NoComm;
//! let halo = HaloExchange::new(mesh.topology_arc(), &comm);
//! let solvers = SolverRegistry::with_builtin();
//! let controls = SolverControls::new("PCG").with_preconditioner("DIC").with_tolerance(1e-10, 0.0);
//! let report = eq.solve(&mut t, &SolveContext::new(&mesh, &halo, &solvers, &controls))?;
//!
//! assert!(report.converged);
//! assert!((t.internal()[1] - 0.5).abs() < 1e-8);
//! # Ok::<(), fv_ldu::FvError>(())
//! ```
//!
//! ## Determinism
//!
//! Reductions fold contributions in rank order, so a given partitioning gives
//! bit-identical residuals on every run.

pub mod algs;
pub mod assembly;
pub mod correction;
pub mod field;
pub mod fv_error;
pub mod matrix;
pub mod mesh_state;
pub mod solvers;
pub mod topology;
pub mod types;

pub use fv_error::{ErrorKind, FvError};

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::{Communicator, HaloExchange, LocalComm, NoComm, ParallelOps};
    pub use crate::assembly::{Coeff, EquationAssembler, upwind_weights};
    pub use crate::correction::{CorrectionControls, CorrectionLoop};
    pub use crate::field::{Field, PatchField, PatchFieldRegistry, PatchFieldSpec};
    pub use crate::fv_error::{ErrorKind, FvError};
    pub use crate::matrix::{SparseEquation, StructureClass};
    pub use crate::mesh_state::MeshState;
    pub use crate::solvers::{LinearSolver, SolveContext, SolverControls, SolverRegistry, SolverReport};
    pub use crate::topology::{
        CouplingKind, MeshGeometry, PatchDescriptor, PatchTransform, Topology, build_topology,
    };
    pub use crate::types::{FieldValue, Scalar, Tensor, Vector};
}
