//! Outcome of one linear solve.

use crate::types::{Scalar, VSMALL};
use serde::Serialize;
use std::fmt;

/// Residual history and status of a solve. Numerical trouble is reported
/// here, never as an error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolverReport {
    pub solver: String,
    pub field: String,
    pub initial_residual: Scalar,
    pub final_residual: Scalar,
    pub iterations: usize,
    pub converged: bool,
    /// A Krylov search direction collapsed and the solve stopped early.
    pub singular: bool,
    /// Rows skipped because their diagonal was zero.
    pub singular_rows: usize,
}

impl SolverReport {
    pub fn new(solver: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            solver: solver.into(),
            field: field.into(),
            initial_residual: 0.0,
            final_residual: 0.0,
            iterations: 0,
            converged: false,
            singular: false,
            singular_rows: 0,
        }
    }

    /// Update and return `converged` from the residuals.
    pub fn check_convergence(&mut self, tolerance: Scalar, rel_tol: Scalar) -> bool {
        self.converged = self.final_residual <= tolerance
            || (rel_tol > 0.0 && self.final_residual <= rel_tol * self.initial_residual);
        self.converged
    }

    /// Flag the solve singular when `value` is numerically zero.
    pub fn check_singularity(&mut self, value: Scalar) -> bool {
        self.singular = value.abs() < VSMALL;
        self.singular
    }

    /// Fold a component report into a combined report.
    pub fn merge(&mut self, other: &SolverReport) {
        self.initial_residual = self.initial_residual.max(other.initial_residual);
        self.final_residual = self.final_residual.max(other.final_residual);
        self.iterations = self.iterations.max(other.iterations);
        self.converged &= other.converged;
        self.singular |= other.singular;
        self.singular_rows += other.singular_rows;
    }

    /// One `info!` line, plus a `warn!` for numerical trouble.
    pub fn log(&self) {
        log::info!("{self}");
        if self.singular_rows > 0 {
            log::warn!(
                "{}: {} row(s) of {} have a zero diagonal and were left unchanged",
                self.solver,
                self.singular_rows,
                self.field
            );
        }
        if self.singular {
            log::warn!("{}: matrix for {} is singular, solve stopped early", self.solver, self.field);
        } else if !self.converged {
            log::warn!(
                "{}: {} not converged after {} iterations (final residual {:e})",
                self.solver,
                self.field,
                self.iterations,
                self.final_residual
            );
        }
    }
}

impl fmt::Display for SolverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver, self.field, self.initial_residual, self.final_residual, self.iterations
        )
    }
}
