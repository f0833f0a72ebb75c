//! Preconditioned bi-conjugate gradient stabilised, for symmetric and
//! asymmetric matrices.

use super::controls::SolverControls;
use super::preconditioner::{Preconditioner, PreconditionerKind};
use super::report::SolverReport;
use super::system::LduSystem;
use super::{LinearSolver, StructureClass};
use crate::fv_error::FvError;
use crate::types::Scalar;

pub struct PBiCGStab {
    preconditioner: PreconditionerKind,
}

impl PBiCGStab {
    pub const NAME: &'static str = "PBiCGStab";

    pub fn new(controls: &SolverControls, class: StructureClass) -> Result<Self, FvError> {
        Ok(Self {
            preconditioner: PreconditionerKind::parse(&controls.preconditioner, class)?,
        })
    }
}

impl LinearSolver for PBiCGStab {
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

        let mut y_a = vec![0.0; n];
        system.amul(psi, &mut y_a)?;
        let mut r_a: Vec<Scalar> = source.iter().zip(&y_a).map(|(b, ax)| b - ax).collect();
        let norm_factor = system.norm_factor(psi, source, &y_a)?;

        report.initial_residual = system.g_sum_mag(&r_a)? / norm_factor;
        report.final_residual = report.initial_residual;

        if controls.min_iter > 0 || !report.check_convergence(controls.tolerance, controls.rel_tol) {
            let pre = Preconditioner::new(self.preconditioner, system);
            let r_a0 = r_a.clone();
            let mut p_a = vec![0.0; n];
            let mut ay_a = vec![0.0; n];
            let mut s_a = vec![0.0; n];
            let mut z_a = vec![0.0; n];
            let mut t_a = vec![0.0; n];

            let mut r_a0_r_a: Scalar = 0.0;
            let mut alpha: Scalar = 0.0;
            let mut omega: Scalar = 0.0;

            loop {
                let r_a0_r_a_old = r_a0_r_a;
                r_a0_r_a = system.g_sum_prod(&r_a0, &r_a)?;
                if report.check_singularity(r_a0_r_a) {
                    break;
                }

                if report.iterations == 0 {
                    p_a.copy_from_slice(&r_a);
                } else {
                    if report.check_singularity(omega) {
                        break;
                    }
                    let beta = (r_a0_r_a / r_a0_r_a_old) * (alpha / omega);
                    for ((p, r), ay) in p_a.iter_mut().zip(&r_a).zip(&ay_a) {
                        *p = r + beta * (*p - omega * ay);
                    }
                }

                pre.precondition(&mut y_a, &p_a);
                system.amul(&y_a, &mut ay_a)?;
                let r_a0_ay_a = system.g_sum_prod(&r_a0, &ay_a)?;
                if report.check_singularity(r_a0_ay_a) {
                    break;
                }
                alpha = r_a0_r_a / r_a0_ay_a;

                for ((s, r), ay) in s_a.iter_mut().zip(&r_a).zip(&ay_a) {
                    *s = r - alpha * ay;
                }
                report.final_residual = system.g_sum_mag(&s_a)? / norm_factor;

                if report.check_convergence(controls.tolerance, controls.rel_tol)
                    && report.iterations + 1 >= controls.min_iter
                {
                    for (x, y) in psi.iter_mut().zip(&y_a) {
                        *x += alpha * y;
                    }
                    report.iterations += 1;
                    return Ok(report);
                }

                pre.precondition(&mut z_a, &s_a);
                system.amul(&z_a, &mut t_a)?;
                let t_a_t_a = system.g_sum_sqr(&t_a)?;
                if report.check_singularity(t_a_t_a) {
                    break;
                }
                omega = system.g_sum_prod(&t_a, &s_a)? / t_a_t_a;

                for (((x, r), (y, z)), (s, t)) in psi
                    .iter_mut()
                    .zip(r_a.iter_mut())
                    .zip(y_a.iter().zip(&z_a))
                    .zip(s_a.iter().zip(&t_a))
                {
                    *x += alpha * y + omega * z;
                    *r = s - omega * t;
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
