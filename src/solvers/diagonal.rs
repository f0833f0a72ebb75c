//! Direct solve of a diagonal-only system.

use super::LinearSolver;
use super::controls::SolverControls;
use super::report::SolverReport;
use super::system::{LduSystem, is_singular_pivot};
use crate::fv_error::FvError;
use crate::types::Scalar;

pub struct DiagonalSolver;

impl DiagonalSolver {
    pub const NAME: &'static str = "diagonal";
}

impl LinearSolver for DiagonalSolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// `x = b / d`; rows with a zero diagonal keep their value and are counted.
    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [Scalar],
        source: &[Scalar],
        _controls: &SolverControls,
        field: &str,
    ) -> Result<SolverReport, FvError> {
        let mut report = SolverReport::new(Self::NAME, field);
        let mut r_a = vec![0.0; psi.len()];
        system.amul(psi, &mut r_a)?;
        let norm_factor = system.norm_factor(psi, source, &r_a)?;
        for (r, b) in r_a.iter_mut().zip(source) {
            *r = b - *r;
        }
        report.initial_residual = system.g_sum_mag(&r_a)? / norm_factor;

        for ((x, b), d) in psi.iter_mut().zip(source).zip(system.diag()) {
            if !is_singular_pivot(*d) {
                *x = b / d;
            }
        }
        report.singular_rows = system.count_singular_rows()?;

        system.residual(psi, source, &mut r_a)?;
        report.final_residual = system.g_sum_mag(&r_a)? / norm_factor;
        report.iterations = 1;
        report.converged = true;
        Ok(report)
    }
}
