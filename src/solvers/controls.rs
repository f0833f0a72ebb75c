//! Per-equation solver settings.

use crate::fv_error::FvError;
use crate::types::Scalar;
use serde::{Deserialize, Serialize};

/// Solver selection and stopping criteria for one equation.
///
/// Keys follow the usual dictionary spelling:
///
/// ```json
/// { "solver": "PCG", "preconditioner": "DIC", "tolerance": 1e-7, "relTol": 0.01 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverControls {
    pub solver: String,
    #[serde(default = "defaults::preconditioner")]
    pub preconditioner: String,
    #[serde(default = "defaults::smoother")]
    pub smoother: String,
    #[serde(default = "defaults::tolerance")]
    pub tolerance: Scalar,
    #[serde(default)]
    pub rel_tol: Scalar,
    #[serde(default = "defaults::max_iter")]
    pub max_iter: usize,
    #[serde(default)]
    pub min_iter: usize,
    #[serde(default = "defaults::n_sweeps")]
    pub n_sweeps: usize,
}

mod defaults {
    use crate::types::Scalar;

    pub fn preconditioner() -> String {
        "none".into()
    }
    pub fn smoother() -> String {
        "GaussSeidel".into()
    }
    pub fn tolerance() -> Scalar {
        1e-6
    }
    pub fn max_iter() -> usize {
        1000
    }
    pub fn n_sweeps() -> usize {
        1
    }
}

impl SolverControls {
    pub fn new(solver: impl Into<String>) -> Self {
        Self {
            solver: solver.into(),
            preconditioner: defaults::preconditioner(),
            smoother: defaults::smoother(),
            tolerance: defaults::tolerance(),
            rel_tol: 0.0,
            max_iter: defaults::max_iter(),
            min_iter: 0,
            n_sweeps: defaults::n_sweeps(),
        }
    }

    pub fn with_preconditioner(mut self, name: impl Into<String>) -> Self {
        self.preconditioner = name.into();
        self
    }

    pub fn with_smoother(mut self, name: impl Into<String>) -> Self {
        self.smoother = name.into();
        self
    }

    pub fn with_tolerance(mut self, tolerance: Scalar, rel_tol: Scalar) -> Self {
        self.tolerance = tolerance;
        self.rel_tol = rel_tol;
        self
    }

    pub fn with_iterations(mut self, min_iter: usize, max_iter: usize) -> Self {
        self.min_iter = min_iter;
        self.max_iter = max_iter;
        self
    }

    pub fn with_sweeps(mut self, n_sweeps: usize) -> Self {
        self.n_sweeps = n_sweeps;
        self
    }

    /// # Errors
    /// Negative tolerances, `relTol` outside `[0, 1)`, `minIter > maxIter`
    /// or `nSweeps == 0`.
    pub fn validate(&self) -> Result<(), FvError> {
        let bad = |entry: &str, reason: String| {
            Err(FvError::InvalidConfiguration {
                entry: entry.to_string(),
                reason,
            })
        };
        if !(self.tolerance >= 0.0) {
            return bad("tolerance", format!("{} must be non-negative", self.tolerance));
        }
        if !(0.0..1.0).contains(&self.rel_tol) {
            return bad("relTol", format!("{} must lie in [0, 1)", self.rel_tol));
        }
        if self.min_iter > self.max_iter {
            return bad(
                "minIter",
                format!("{} exceeds maxIter {}", self.min_iter, self.max_iter),
            );
        }
        if self.n_sweeps == 0 {
            return bad("nSweeps", "must be at least 1".into());
        }
        Ok(())
    }
}
