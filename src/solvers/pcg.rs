//! Preconditioned conjugate gradients for symmetric matrices.

use super::controls::SolverControls;
use super::preconditioner::{Preconditioner, PreconditionerKind};
use super::report::SolverReport;
use super::system::LduSystem;
use super::{LinearSolver, StructureClass};
use crate::fv_error::FvError;
use crate::types::Scalar;

pub struct Pcg {
    preconditioner: PreconditionerKind,
}

impl Pcg {
    pub const NAME: &'static str = "PCG";

    pub fn new(controls: &SolverControls) -> Result<Self, FvError> {
        Ok(Self {
            preconditioner: PreconditionerKind::parse(&controls.preconditioner, StructureClass::Symmetric)?,
        })
    }
}

impl LinearSolver for Pcg {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [Scalar],
        source: &[Scalar],
        controls: &SolverControls,
        field: &str,
    ) -> Result<SolverReport, FvError> {
        let n = system.n_cells();
        let mut report = SolverReport::new(Self::NAME, field);
        report.singular_rows = system.count_singular_rows()?;

        let mut w_a = vec![0.0; n];
        system.amul(psi, &mut w_a)?;
        let mut r_a: Vec<Scalar> = source.iter().zip(&w_a).map(|(b, ax)| b - ax).collect();
        let norm_factor = system.norm_factor(psi, source, &w_a)?;

        report.initial_residual = system.g_sum_mag(&r_a)? / norm_factor;
        report.final_residual = report.initial_residual;

        if controls.min_iter > 0 || !report.check_convergence(controls.tolerance, controls.rel_tol) {
            let pre = Preconditioner::new(self.preconditioner, system);
            let mut p_a = vec![0.0; n];
            let mut w_a_r_a: Scalar = Scalar::MAX;

            loop {
                let w_a_r_a_old = w_a_r_a;
                pre.precondition(&mut w_a, &r_a);
                w_a_r_a = system.g_sum_prod(&w_a, &r_a)?;

                if report.iterations == 0 {
                    p_a.copy_from_slice(&w_a);
                } else {
                    if report.check_singularity(w_a_r_a_old) {
                        break;
                    }
                    let beta = w_a_r_a / w_a_r_a_old;
                    for (p, w) in p_a.iter_mut().zip(&w_a) {
                        *p = w + beta * *p;
                    }
                }

                system.amul(&p_a, &mut w_a)?;
                let w_a_p_a = system.g_sum_prod(&w_a, &p_a)?;
                if report.check_singularity(w_a_p_a.abs() / norm_factor) {
                    break;
                }

                let alpha = w_a_r_a / w_a_p_a;
                for ((x, r), (p, w)) in psi.iter_mut().zip(r_a.iter_mut()).zip(p_a.iter().zip(&w_a)) {
                    *x += alpha * p;
                    *r -= alpha * w;
                }
                report.final_residual = system.g_sum_mag(&r_a)? / norm_factor;
                report.iterations += 1;

                let converged = report.check_convergence(controls.tolerance, controls.rel_tol);
                if (report.iterations >= controls.max_iter || converged) && report.iterations >= controls.min_iter {
                    break;
                }
            }
        }
        Ok(report)
    }
}
