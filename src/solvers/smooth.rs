//! Iterative solve by repeated Gauss-Seidel smoothing.

use super::controls::SolverControls;
use super::report::SolverReport;
use super::system::{LduSystem, is_singular_pivot};
use super::{LinearSolver, StructureClass};
use crate::fv_error::FvError;
use crate::types::Scalar;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SmootherKind {
    GaussSeidel,
    SymGaussSeidel,
}

impl SmootherKind {
    pub const NAMES: &'static [&'static str] = &["GaussSeidel", "symGaussSeidel"];

    pub fn parse(name: &str, class: StructureClass) -> Result<Self, FvError> {
        match name {
            "GaussSeidel" => Ok(SmootherKind::GaussSeidel),
            "symGaussSeidel" => Ok(SmootherKind::SymGaussSeidel),
            _ => Err(FvError::UnknownName {
                family: match class {
                    StructureClass::Asymmetric => "asymmetric matrix smoother",
                    _ => "symmetric matrix smoother",
                },
                name: name.to_string(),
                context: String::new(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

/// One Gauss-Seidel pass over the cells in the given order.
///
/// `b_prime` already holds the source plus the interface contributions, which
/// are frozen for the whole pass. Rows with a singular pivot are left as is.
fn gauss_seidel_pass(system: &LduSystem<'_>, psi: &mut [Scalar], b_prime: &[Scalar], reverse: bool) {
    let topo = system.topology();
    let addr = topo.addressing();
    let l = topo.lower_addr();
    let u = topo.upper_addr();
    let (diag, upper, lower) = (system.diag(), system.upper(), system.lower());

    let mut relax_cell = |c: usize| {
        if is_singular_pivot(diag[c]) {
            return;
        }
        let mut s = b_prime[c];
        for &f in addr.owned_faces(c) {
            s -= upper[f] * psi[u[f]];
        }
        for &f in addr.neighbour_faces(c) {
            s -= lower[f] * psi[l[f]];
        }
        psi[c] = s / diag[c];
    };
    if reverse {
        (0..system.n_cells()).rev().for_each(&mut relax_cell);
    } else {
        (0..system.n_cells()).for_each(&mut relax_cell);
    }
}

/// Smooth `psi` for `n_sweeps` sweeps.
pub fn smooth(
    kind: SmootherKind,
    system: &LduSystem<'_>,
    psi: &mut [Scalar],
    source: &[Scalar],
    n_sweeps: usize,
) -> Result<(), FvError> {
    let mut b_prime = vec![0.0; psi.len()];
    for _ in 0..n_sweeps {
        b_prime.copy_from_slice(source);
        let nbr = system.interface_values(psi)?;
        for (i, values) in system.interfaces().iter().zip(&nbr) {
            for ((&c, coeff), v) in i.face_cells.iter().zip(&i.coeffs).zip(values) {
                b_prime[c] += coeff * v;
            }
        }
        gauss_seidel_pass(system, psi, &b_prime, false);
        if kind == SmootherKind::SymGaussSeidel {
            gauss_seidel_pass(system, psi, &b_prime, true);
        }
    }
    Ok(())
}

pub struct SmoothSolver {
    smoother: SmootherKind,
}

impl SmoothSolver {
    pub const NAME: &'static str = "smoothSolver";

    pub fn new(controls: &SolverControls, class: StructureClass) -> Result<Self, FvError> {
        Ok(Self {
            smoother: SmootherKind::parse(&controls.smoother, class)?,
        })
    }
}

impl LinearSolver for SmoothSolver {
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
        let norm_factor = system.norm_factor(psi, source, &w_a)?;
        let mut r_a: Vec<Scalar> = source.iter().zip(&w_a).map(|(b, ax)| b - ax).collect();
        report.initial_residual = system.g_sum_mag(&r_a)? / norm_factor;
        report.final_residual = report.initial_residual;

        if controls.min_iter > 0 || !report.check_convergence(controls.tolerance, controls.rel_tol) {
            loop {
                smooth(self.smoother, system, psi, source, controls.n_sweeps)?;
                system.residual(psi, source, &mut r_a)?;
                report.final_residual = system.g_sum_mag(&r_a)? / norm_factor;
                report.iterations += controls.n_sweeps;

                let converged = report.check_convergence(controls.tolerance, controls.rel_tol);
                if (report.iterations >= controls.max_iter || converged) && report.iterations >= controls.min_iter {
                    break;
                }
            }
        }
        Ok(report)
    }
}
