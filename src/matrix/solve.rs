//! Segregated solve, residual evaluation and implicit under-relaxation.

use super::SparseEquation;
use crate::algs::communicator::Communicator;
use crate::algs::halo::ParallelOps;
use crate::field::Field;
use crate::fv_error::FvError;
use crate::mesh_state::MeshState;
use crate::solvers::{Interface, LduSystem, SolveContext, SolverReport};
use crate::topology::CouplingKind;
use crate::types::{FieldValue, Scalar};
use itertools::izip;
use std::borrow::Cow;

fn cmpt_max_mag<T: FieldValue>(v: &T) -> Scalar {
    (0..T::N_COMPONENTS)
        .map(|d| v.component(d).abs())
        .fold(0.0, Scalar::max)
}

fn cmpt_min<T: FieldValue>(v: &T) -> Scalar {
    (0..T::N_COMPONENTS)
        .map(|d| v.component(d))
        .fold(Scalar::INFINITY, Scalar::min)
}

impl<T: FieldValue> SparseEquation<T> {
    fn check_field(&self, field: &Field<T>) -> Result<(), FvError> {
        if field.name() != self.psi {
            return Err(FvError::InvalidConfiguration {
                entry: format!("equation for '{}'", self.psi),
                reason: format!("cannot be applied to field '{}'", field.name()),
            });
        }
        if field.topology_version() != self.topology_version {
            return Err(FvError::StaleTopology {
                field: field.name().to_string(),
                field_version: field.topology_version(),
                mesh_version: self.topology_version,
            });
        }
        if field.internal().len() != self.n_cells() {
            return Err(FvError::size_mismatch(
                format!("field '{}'", field.name()),
                self.n_cells(),
                field.internal().len(),
            ));
        }
        Ok(())
    }

    fn off_diag_views(&self) -> (Cow<'_, [Scalar]>, Cow<'_, [Scalar]>) {
        match (self.off_diag.upper(), self.off_diag.lower()) {
            (Some(u), Some(l)) => (Cow::Borrowed(u), Cow::Borrowed(l)),
            _ => {
                let zeros = vec![0.0; self.topology.n_internal_faces()];
                (Cow::Owned(zeros.clone()), Cow::Owned(zeros))
            }
        }
    }

    /// Scalar system and source for component `d`, with boundary
    /// contributions folded in.
    fn component_system<'a>(
        &'a self,
        d: usize,
        upper: &Cow<'a, [Scalar]>,
        lower: &Cow<'a, [Scalar]>,
        ops: &'a dyn ParallelOps,
    ) -> Result<(LduSystem<'a>, Vec<Scalar>), FvError> {
        let topo: &'a _ = &*self.topology;
        let mut diag = self.diag.clone();
        let mut source: Vec<Scalar> = self.source.iter().map(|s| s.component(d)).collect();
        let mut interfaces = Vec::new();

        for (p, patch) in topo.patches().iter().enumerate() {
            let face_cells = topo.face_cells(p);
            for (&c, ic) in face_cells.iter().zip(&self.internal_coeffs[p]) {
                diag[c] += ic.component(d);
            }
            let bc = &self.boundary_coeffs[p];
            if patch.is_coupled() {
                let factor = match patch.coupling() {
                    CouplingKind::Periodic { transform, .. } => {
                        transform.rotation().map_or(1.0, |r| T::transform_factor(r, d))
                    }
                    _ => 1.0,
                };
                interfaces.push(Interface {
                    patch: p,
                    face_cells,
                    coeffs: bc.iter().map(|b| b.component(d) * factor).collect(),
                });
            } else {
                for (&c, b) in face_cells.iter().zip(bc) {
                    source[c] += b.component(d);
                }
            }
        }

        let system = LduSystem::new(topo, diag, upper.clone(), lower.clone(), interfaces, ops)?;
        Ok((system, source))
    }

    /// Solve the equation for `field`, one component at a time, then write the
    /// solution back and correct the boundary conditions.
    ///
    /// The returned report takes the worst residuals and iteration count over
    /// the components and is converged only if every component converged.
    pub fn solve<C: Communicator>(
        &self,
        field: &mut Field<T>,
        ctx: &SolveContext<'_, '_, C>,
    ) -> Result<SolverReport, FvError> {
        field.check_topology(ctx.mesh)?;
        self.check_field(field)?;
        let class = self.structure_global(ctx.halo)?;
        let solver = ctx.registry.select(class, ctx.controls)?;
        let (upper, lower) = self.off_diag_views();

        let mut psi = vec![0.0; self.n_cells()];
        let mut combined: Option<SolverReport> = None;
        for d in 0..T::N_COMPONENTS {
            let (system, source) = self.component_system(d, &upper, &lower, ctx.halo)?;
            for (x, v) in psi.iter_mut().zip(field.internal()) {
                *x = v.component(d);
            }
            let name = format!("{}{}", field.name(), T::COMPONENT_NAMES[d]);
            let report = solver.solve(&system, &mut psi, &source, ctx.controls, &name)?;
            report.log();
            for (v, x) in field.internal_mut().iter_mut().zip(&psi) {
                v.set_component(d, *x);
            }
            match combined.as_mut() {
                Some(all) => all.merge(&report),
                None => combined = Some(report),
            }
        }

        field.correct_boundary_conditions(ctx.mesh, ctx.halo)?;
        Ok(combined.unwrap_or_else(|| SolverReport::new(solver.name(), field.name())))
    }

    /// Normalised residual of the equation at the current field values, per
    /// component, without solving.
    pub fn residual(&self, field: &Field<T>, ops: &dyn ParallelOps) -> Result<T, FvError> {
        self.check_field(field)?;
        let (upper, lower) = self.off_diag_views();
        let n = self.n_cells();
        let mut psi = vec![0.0; n];
        let mut r = vec![0.0; n];
        let mut out = T::default();
        for d in 0..T::N_COMPONENTS {
            let (system, source) = self.component_system(d, &upper, &lower, ops)?;
            for (x, v) in psi.iter_mut().zip(field.internal()) {
                *x = v.component(d);
            }
            system.amul(&psi, &mut r)?;
            let norm_factor = system.norm_factor(&psi, &source, &r)?;
            for (ri, b) in r.iter_mut().zip(&source) {
                *ri = b - *ri;
            }
            out.set_component(d, system.g_sum_mag(&r)? / norm_factor);
        }
        Ok(out)
    }

    /// Implicit under-relaxation by `alpha` about the current values of
    /// `field`.
    ///
    /// The diagonal is first made at least as large as the sum of the
    /// off-diagonal magnitudes, then divided by `alpha`; the added diagonal
    /// times the current solution moves to the source so the converged
    /// solution is unchanged.
    pub fn relax(&mut self, alpha: Scalar, field: &Field<T>) -> Result<(), FvError> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(FvError::InvalidConfiguration {
                entry: format!("relaxationFactors.{}", self.psi),
                reason: format!("factor {alpha} is outside (0, 1]"),
            });
        }
        self.check_field(field)?;

        let topo = std::sync::Arc::clone(&self.topology);
        let d0 = self.diag.clone();
        let mut sum_off = vec![0.0; self.n_cells()];
        if let (Some(u), Some(l)) = (self.off_diag.upper(), self.off_diag.lower()) {
            for (&lo, &hi, uf, lf) in izip!(topo.lower_addr(), topo.upper_addr(), u, l) {
                sum_off[lo] += uf.abs();
                sum_off[hi] += lf.abs();
            }
        }

        let mut diag = std::mem::take(&mut self.diag);
        for (p, patch) in topo.patches().iter().enumerate() {
            for (f, &c) in topo.face_cells(p).iter().enumerate() {
                let ic = &self.internal_coeffs[p][f];
                if patch.is_coupled() {
                    diag[c] += ic.component(0);
                    sum_off[c] += self.boundary_coeffs[p][f].component(0).abs();
                } else {
                    diag[c] += cmpt_max_mag(ic);
                }
            }
        }

        for (d, s) in diag.iter_mut().zip(&sum_off) {
            *d = d.abs().max(*s) / alpha;
        }

        for (p, patch) in topo.patches().iter().enumerate() {
            for (f, &c) in topo.face_cells(p).iter().enumerate() {
                let ic = &self.internal_coeffs[p][f];
                diag[c] -= if patch.is_coupled() {
                    ic.component(0)
                } else {
                    cmpt_min(ic)
                };
            }
        }

        for (s, d, d_old, x) in izip!(&mut self.source, &diag, &d0, field.internal()) {
            *s += *x * (d - d_old);
        }
        self.diag = diag;
        log::debug!("relaxed equation for {} with factor {alpha}", self.psi);
        Ok(())
    }

    /// Topology check against the live mesh, for callers holding an equation
    /// across a mesh update.
    pub fn check_mesh(&self, mesh: &MeshState) -> Result<(), FvError> {
        if mesh.rebuild_required(self.topology_version) {
            return Err(FvError::StaleTopology {
                field: self.psi.clone(),
                field_version: self.topology_version,
                mesh_version: mesh.topology_version(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::halo::HaloExchange;
    use crate::field::{PatchFieldRegistry, PatchFieldSpec};
    use crate::solvers::{SolverControls, SolverRegistry};
    use crate::topology::test_meshes::line;
    use crate::types::Vector;

    #[test]
    fn diagonal_vector_equation_solves_each_component() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::with_builtin();
        let mut u = Field::uniform("U", &mesh, Vector::default(), &reg, |_| PatchFieldSpec::zero_gradient())
            .unwrap();
        let mut eq = SparseEquation::new(&u, &mesh);
        eq.diag_mut().copy_from_slice(&[2.0, 4.0]);
        eq.source_mut().copy_from_slice(&[Vector::new(2.0, 4.0, 6.0), Vector::new(4.0, 8.0, 12.0)]);

        let halo = HaloExchange::new(mesh.topology_arc(), &NoComm);
        let solvers = SolverRegistry::with_builtin();
        let controls = SolverControls::new("PCG");
        let ctx = SolveContext::new(&mesh, &halo, &solvers, &controls);
        let report = eq.solve(&mut u, &ctx).unwrap();
        assert!(report.converged);
        assert_eq!(report.solver, "diagonal");
        assert_eq!(u.internal(), &[Vector::new(1.0, 2.0, 3.0), Vector::new(1.0, 2.0, 3.0)]);
        assert_eq!(u.boundary(1).values(), &[Vector::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn relaxation_halves_the_step_of_a_diagonal_system() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::with_builtin();
        let mut t = Field::uniform("T", &mesh, 0.0, &reg, |_| PatchFieldSpec::zero_gradient()).unwrap();
        let mut eq = SparseEquation::new(&t, &mesh);
        eq.diag_mut().copy_from_slice(&[2.0, 2.0]);
        eq.source_mut().copy_from_slice(&[4.0, 4.0]);
        eq.relax(0.5, &t).unwrap();
        assert_eq!(eq.diag(), &[4.0, 4.0]);

        let halo = HaloExchange::new(mesh.topology_arc(), &NoComm);
        let solvers = SolverRegistry::with_builtin();
        let controls = SolverControls::new("diagonal");
        eq.solve(&mut t, &SolveContext::new(&mesh, &halo, &solvers, &controls)).unwrap();
        assert_eq!(t.internal(), &[1.0, 1.0]);
    }

    #[test]
    fn relaxation_factor_must_be_in_unit_interval() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::with_builtin();
        let t = Field::uniform("T", &mesh, 0.0, &reg, |_| PatchFieldSpec::zero_gradient()).unwrap();
        let mut eq = SparseEquation::new(&t, &mesh);
        assert!(eq.relax(0.0, &t).is_err());
        assert!(eq.relax(1.5, &t).is_err());
    }

    #[test]
    fn residual_vanishes_at_the_solution() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::with_builtin();
        let mut t = Field::uniform("T", &mesh, 1.0, &reg, |_| PatchFieldSpec::zero_gradient()).unwrap();
        let mut eq = SparseEquation::new(&t, &mesh);
        eq.diag_mut().copy_from_slice(&[2.0, 2.0]);
        eq.upper_mut()[0] = -1.0;
        eq.source_mut().copy_from_slice(&[1.0, 1.0]);
        let halo = HaloExchange::new(mesh.topology_arc(), &NoComm);
        assert!(eq.residual(&t, &halo).unwrap() < 1e-12);
        t.internal_mut()[0] = 0.0;
        assert!(eq.residual(&t, &halo).unwrap() > 0.1);
    }
}
