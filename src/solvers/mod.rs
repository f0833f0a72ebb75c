//! Linear solvers and their name-keyed registry.
//!
//! A solver is chosen per solve from the equation's [`StructureClass`] and the
//! configured name:
//!
//! | name           | classes                 |
//! |----------------|-------------------------|
//! | `diagonal`     | diagonal-only           |
//! | `PCG`          | symmetric               |
//! | `PBiCGStab`    | symmetric, asymmetric   |
//! | `smoothSolver` | symmetric, asymmetric   |
//!
//! Every name known in any class degrades to `diagonal` for a diagonal-only
//! equation.

pub mod controls;
pub mod diagonal;
pub mod pbicgstab;
pub mod pcg;
pub mod preconditioner;
pub mod report;
pub mod smooth;
pub mod system;

pub use crate::matrix::StructureClass;
pub use controls::SolverControls;
pub use diagonal::DiagonalSolver;
pub use pbicgstab::PBiCGStab;
pub use pcg::Pcg;
pub use preconditioner::{Preconditioner, PreconditionerKind};
pub use report::SolverReport;
pub use smooth::{SmoothSolver, SmootherKind};
pub use system::{Interface, LduSystem};

use crate::algs::communicator::Communicator;
use crate::algs::halo::HaloExchange;
use crate::fv_error::FvError;
use crate::mesh_state::MeshState;
use crate::types::Scalar;
use hashbrown::HashMap;

/// Iterative or direct solver for one scalar [`LduSystem`].
pub trait LinearSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve `A·psi = source` in place, starting from the current `psi`.
    ///
    /// Running out of iterations or hitting a singular direction is reported
    /// in the returned [`SolverReport`], not as an error.
    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [Scalar],
        source: &[Scalar],
        controls: &SolverControls,
        field: &str,
    ) -> Result<SolverReport, FvError>;
}

pub type SolverCtor =
    Box<dyn Fn(&SolverControls, StructureClass) -> Result<Box<dyn LinearSolver>, FvError> + Send + Sync>;

/// Name-keyed solver constructors, one table per structure class.
#[derive(Default)]
pub struct SolverRegistry {
    entries: HashMap<(StructureClass, String), SolverCtor>,
}

impl SolverRegistry {
    pub fn with_builtin() -> Self {
        let mut reg = Self::default();
        reg.register(StructureClass::DiagonalOnly, DiagonalSolver::NAME, |_, _| {
            Ok(Box::new(DiagonalSolver))
        });
        reg.register(StructureClass::Symmetric, Pcg::NAME, |c, _| Ok(Box::new(Pcg::new(c)?)));
        for class in [StructureClass::Symmetric, StructureClass::Asymmetric] {
            reg.register(class, PBiCGStab::NAME, |c, class| {
                Ok(Box::new(PBiCGStab::new(c, class)?))
            });
            reg.register(class, SmoothSolver::NAME, |c, class| {
                Ok(Box::new(SmoothSolver::new(c, class)?))
            });
        }
        reg
    }

    /// Add or replace a constructor for `name` in `class`.
    pub fn register<F>(&mut self, class: StructureClass, name: &str, ctor: F)
    where
        F: Fn(&SolverControls, StructureClass) -> Result<Box<dyn LinearSolver>, FvError>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert((class, name.to_string()), Box::new(ctor));
    }

    /// Names registered for `class`, sorted.
    pub fn names(&self, class: StructureClass) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter(|(c, _)| *c == class)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort_unstable();
        names
    }

    fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().map(|(_, n)| n.clone()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Construct the solver named in `controls` for an equation of `class`.
    ///
    /// # Errors
    /// Invalid controls, or `UnknownName` listing the names valid for `class`.
    pub fn select(&self, class: StructureClass, controls: &SolverControls) -> Result<Box<dyn LinearSolver>, FvError> {
        controls.validate()?;
        let name = controls.solver.as_str();
        if class == StructureClass::DiagonalOnly {
            let known = self.entries.keys().any(|(_, n)| n == name);
            if !known {
                return Err(FvError::UnknownName {
                    family: class.solver_family(),
                    name: name.to_string(),
                    context: String::new(),
                    valid: self.all_names(),
                });
            }
            if name != DiagonalSolver::NAME {
                log::debug!("diagonal-only matrix: using the diagonal solver instead of {name}");
            }
            return match self.entries.get(&(class, DiagonalSolver::NAME.to_string())) {
                Some(ctor) => ctor(controls, class),
                None => Ok(Box::new(DiagonalSolver)),
            };
        }
        match self.entries.get(&(class, name.to_string())) {
            Some(ctor) => {
                log::debug!("selected {name} for a {class:?} matrix");
                ctor(controls, class)
            }
            None => Err(FvError::UnknownName {
                family: class.solver_family(),
                name: name.to_string(),
                context: String::new(),
                valid: self.names(class),
            }),
        }
    }
}

/// Everything [`SparseEquation::solve`](crate::matrix::SparseEquation::solve)
/// needs besides the field.
pub struct SolveContext<'a, 'c, C: Communicator> {
    pub mesh: &'a MeshState,
    pub halo: &'a HaloExchange<'c, C>,
    pub registry: &'a SolverRegistry,
    pub controls: &'a SolverControls,
}

impl<'a, 'c, C: Communicator> SolveContext<'a, 'c, C> {
    pub fn new(
        mesh: &'a MeshState,
        halo: &'a HaloExchange<'c, C>,
        registry: &'a SolverRegistry,
        controls: &'a SolverControls,
    ) -> Self {
        Self {
            mesh,
            halo,
            registry,
            controls,
        }
    }

    /// Same context with other controls.
    pub fn with_controls(&self, controls: &'a SolverControls) -> Self {
        Self { controls, ..*self }
    }
}

impl<C: Communicator> Clone for SolveContext<'_, '_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Communicator> Copy for SolveContext<'_, '_, C> {}
