//! Term builders producing [`SparseEquation`]s from fields and geometry.
//!
//! Each builder returns a fresh equation; callers combine them with `+`, `-`,
//! `+=` and unary `-`:
//!
//! ```ignore
//! let asm = EquationAssembler::new(&mesh);
//! let eq = asm.time_derivative(&t)? + asm.convection(&phi, &w, &mut t)? - asm.diffusion(gamma.into(), &mut t)?;
//! ```
//!
//! Operators that read boundary values bring the uncoupled patches up to date
//! themselves. Coupled patches must already have been evaluated in the current
//! pass through [`Field::correct_boundary_conditions`].

pub mod weights;

pub use weights::upwind_weights;

use crate::field::Field;
use crate::fv_error::FvError;
use crate::matrix::SparseEquation;
use crate::mesh_state::MeshState;
use crate::topology::Topology;
use crate::types::{FieldValue, Scalar};
use itertools::izip;

/// Coefficient given either once for every cell (face) or item by item.
#[derive(Copy, Clone, Debug)]
pub enum Coeff<'a> {
    Uniform(Scalar),
    PerItem(&'a [Scalar]),
}

impl Coeff<'_> {
    #[inline]
    pub fn at(&self, i: usize) -> Scalar {
        match self {
            Coeff::Uniform(v) => *v,
            Coeff::PerItem(v) => v[i],
        }
    }

    fn check_len(&self, what: &str, expected: usize) -> Result<(), FvError> {
        match self {
            Coeff::PerItem(v) if v.len() != expected => Err(FvError::size_mismatch(what, expected, v.len())),
            _ => Ok(()),
        }
    }
}

impl From<Scalar> for Coeff<'_> {
    fn from(v: Scalar) -> Self {
        Coeff::Uniform(v)
    }
}

impl<'a> From<&'a [Scalar]> for Coeff<'a> {
    fn from(v: &'a [Scalar]) -> Self {
        Coeff::PerItem(v)
    }
}

impl<'a> From<&'a Vec<Scalar>> for Coeff<'a> {
    fn from(v: &'a Vec<Scalar>) -> Self {
        Coeff::PerItem(v)
    }
}

pub struct EquationAssembler<'m> {
    mesh: &'m MeshState,
}

impl<'m> EquationAssembler<'m> {
    pub fn new(mesh: &'m MeshState) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &MeshState {
        self.mesh
    }

    fn check_len(&self, what: String, expected: usize, found: usize) -> Result<(), FvError> {
        if expected != found {
            return Err(FvError::size_mismatch(what, expected, found));
        }
        Ok(())
    }

    /// Evaluate uncoupled patches and require coupled ones to be current.
    fn prepare<T: FieldValue>(&self, field: &mut Field<T>) -> Result<(), FvError> {
        field.evaluate_uncoupled(self.mesh)?;
        let topo = self.mesh.topology();
        for p in 0..field.n_patches() {
            let pf = field.boundary(p);
            if pf.coupled() && !pf.updated() {
                return Err(FvError::StaleCoupledPatch {
                    field: field.name().to_string(),
                    patch: topo.patch(p).name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Implicit Euler time derivative: `diag = V/Δt`, `source = V/Δt·x_old`.
    ///
    /// Uses the current values when no old-time level has been stored.
    pub fn time_derivative<T: FieldValue>(&self, field: &Field<T>) -> Result<SparseEquation<T>, FvError> {
        field.check_topology(self.mesh)?;
        let delta_t = self.mesh.time().delta_t;
        if !(delta_t > 0.0) {
            return Err(FvError::InvalidConfiguration {
                entry: "deltaT".into(),
                reason: format!("time step must be positive, got {delta_t}"),
            });
        }
        let r_delta_t = 1.0 / delta_t;
        let mut eq = SparseEquation::new(field, self.mesh);
        let volumes = self.mesh.geometry().cell_volumes();
        let old = field.old_time_or_current();
        for (d, v) in eq.diag_mut().iter_mut().zip(volumes) {
            *d = r_delta_t * v;
        }
        for (s, x, v) in izip!(eq.source_mut(), old, volumes) {
            *s = *x * (r_delta_t * v);
        }
        Ok(eq)
    }

    /// Convection by the face flux `flux` (all faces) with interpolation
    /// `weights` (all faces).
    pub fn convection<T: FieldValue>(
        &self,
        flux: &[Scalar],
        weights: &[Scalar],
        field: &mut Field<T>,
    ) -> Result<SparseEquation<T>, FvError> {
        let topo = self.mesh.topology();
        self.check_len("face flux".into(), topo.n_faces(), flux.len())?;
        self.check_len("convection weights".into(), topo.n_faces(), weights.len())?;
        self.prepare(field)?;

        let mut eq = SparseEquation::new(field, self.mesh);
        let n_int = topo.n_internal_faces();
        let lower: Vec<Scalar> = (0..n_int).map(|f| -weights[f] * flux[f]).collect();
        let upper: Vec<Scalar> = (0..n_int).map(|f| lower[f] + flux[f]).collect();
        eq.lower_mut().copy_from_slice(&lower);
        eq.upper_mut().copy_from_slice(&upper);
        neg_sum_diag(&mut eq, topo, &upper, &lower);

        let geo = self.mesh.geometry();
        for p in 0..topo.patches().len() {
            let pf = field.boundary(p);
            let p_flux = geo.patch_slice(topo, flux, p);
            let p_w = geo.patch_slice(topo, weights, p);
            let p_delta = geo.patch_slice(topo, geo.delta_coeffs(), p);
            let ic = pf.value_internal_coeffs(p_w, p_delta);
            let bc = pf.value_boundary_coeffs(p_w, p_delta);
            for (out, c, f) in izip!(eq.internal_coeffs_mut(p), ic, p_flux) {
                *out = c * *f;
            }
            for (out, c, f) in izip!(eq.boundary_coeffs_mut(p), bc, p_flux) {
                *out = c * -*f;
            }
        }
        Ok(eq)
    }

    /// Laplacian `∇·(Γ∇x)` with face diffusivity `gamma` (all faces).
    ///
    /// The diagonal is negative; a diffusion term on the left-hand side of a
    /// transport equation is therefore subtracted.
    pub fn diffusion<T: FieldValue>(
        &self,
        gamma: Coeff<'_>,
        field: &mut Field<T>,
    ) -> Result<SparseEquation<T>, FvError> {
        let topo = self.mesh.topology();
        gamma.check_len("face diffusivity", topo.n_faces())?;
        self.prepare(field)?;

        let geo = self.mesh.geometry();
        let gamma_mag_sf: Vec<Scalar> = geo
            .face_areas()
            .iter()
            .enumerate()
            .map(|(f, a)| gamma.at(f) * a)
            .collect();

        let mut eq = SparseEquation::new(field, self.mesh);
        let upper: Vec<Scalar> = (0..topo.n_internal_faces())
            .map(|f| gamma_mag_sf[f] * geo.delta_coeffs()[f])
            .collect();
        eq.upper_mut().copy_from_slice(&upper);
        neg_sum_diag(&mut eq, topo, &upper, &upper);

        for p in 0..topo.patches().len() {
            let pf = field.boundary(p);
            let p_gamma = geo.patch_slice(topo, &gamma_mag_sf, p);
            let p_delta = geo.patch_slice(topo, geo.delta_coeffs(), p);
            let ic = pf.gradient_internal_coeffs(p_delta);
            let bc = pf.gradient_boundary_coeffs(p_delta);
            for (out, c, g) in izip!(eq.internal_coeffs_mut(p), ic, p_gamma) {
                *out = c * *g;
            }
            for (out, c, g) in izip!(eq.boundary_coeffs_mut(p), bc, p_gamma) {
                *out = c * -*g;
            }
        }
        Ok(eq)
    }

    /// Explicit source `S` (per cell): `source −= V·S`.
    pub fn explicit_source<T: FieldValue>(&self, su: &[T], field: &Field<T>) -> Result<SparseEquation<T>, FvError> {
        field.check_topology(self.mesh)?;
        self.check_len("explicit source".into(), self.mesh.topology().n_cells(), su.len())?;
        let mut eq = SparseEquation::new(field, self.mesh);
        for (s, v, vol) in izip!(eq.source_mut(), su, self.mesh.geometry().cell_volumes()) {
            *s -= *v * *vol;
        }
        Ok(eq)
    }

    /// Implicit source `coeff·x`: `diag += V·coeff`.
    pub fn implicit_source<T: FieldValue>(&self, coeff: Coeff<'_>, field: &Field<T>) -> Result<SparseEquation<T>, FvError> {
        field.check_topology(self.mesh)?;
        coeff.check_len("implicit source coefficient", self.mesh.topology().n_cells())?;
        let mut eq = SparseEquation::new(field, self.mesh);
        for (c, (d, vol)) in eq
            .diag_mut()
            .iter_mut()
            .zip(self.mesh.geometry().cell_volumes())
            .enumerate()
        {
            *d += vol * coeff.at(c);
        }
        Ok(eq)
    }

    /// Source `coeff·x` split by sign: positive coefficients go to the
    /// diagonal, negative ones are evaluated explicitly with the current
    /// values.
    pub fn implicit_explicit_source<T: FieldValue>(
        &self,
        coeff: Coeff<'_>,
        field: &Field<T>,
    ) -> Result<SparseEquation<T>, FvError> {
        field.check_topology(self.mesh)?;
        coeff.check_len("implicit/explicit source coefficient", self.mesh.topology().n_cells())?;
        let mut eq = SparseEquation::new(field, self.mesh);
        let volumes = self.mesh.geometry().cell_volumes();
        for (c, (d, vol)) in eq.diag_mut().iter_mut().zip(volumes).enumerate() {
            *d += vol * coeff.at(c).max(0.0);
        }
        for (c, (s, x)) in eq.source_mut().iter_mut().zip(field.internal()).enumerate() {
            *s -= *x * (volumes[c] * coeff.at(c).min(0.0));
        }
        Ok(eq)
    }

    /// Divergence of a given face flux of `T` (all faces), added as an
    /// explicit term.
    pub fn explicit_flux_divergence<T: FieldValue>(
        &self,
        face_flux: &[T],
        field: &Field<T>,
    ) -> Result<SparseEquation<T>, FvError> {
        field.check_topology(self.mesh)?;
        let topo = self.mesh.topology();
        self.check_len("face flux".into(), topo.n_faces(), face_flux.len())?;
        let mut eq = SparseEquation::new(field, self.mesh);
        let source = eq.source_mut();
        for (f, flux) in face_flux.iter().enumerate() {
            source[topo.owner_of(f)] -= *flux;
            if let Some(n) = topo.try_neighbour_of(f) {
                source[n] += *flux;
            }
        }
        Ok(eq)
    }
}

/// `diag[l] −= lower`, `diag[u] −= upper` on every internal face.
fn neg_sum_diag<T: FieldValue>(eq: &mut SparseEquation<T>, topo: &Topology, upper: &[Scalar], lower: &[Scalar]) {
    let diag = eq.diag_mut();
    for (&l, &u, up, lo) in izip!(topo.lower_addr(), topo.upper_addr(), upper, lower) {
        diag[l] -= lo;
        diag[u] -= up;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::halo::HaloExchange;
    use crate::field::{PatchFieldRegistry, PatchFieldSpec};
    use crate::fv_error::ErrorKind;
    use crate::matrix::StructureClass;
    use crate::topology::test_meshes::{line, periodic_line};
    use crate::topology::MeshGeometry;

    fn walls(mesh: &MeshState) -> Field<Scalar> {
        let reg = PatchFieldRegistry::with_builtin();
        Field::uniform("T", mesh, 0.0, &reg, |name| match name {
            "left" => PatchFieldSpec::fixed_value(1.0),
            _ => PatchFieldSpec::zero_gradient(),
        })
        .unwrap()
    }

    #[test]
    fn diffusion_is_symmetric_with_negative_row_sums_on_fixed_faces() {
        let mesh = MeshState::with_unit_geometry(line(3));
        let mut t = walls(&mesh);
        let eq = EquationAssembler::new(&mesh).diffusion(Coeff::Uniform(2.0), &mut t).unwrap();
        assert_eq!(eq.structure(), StructureClass::Symmetric);
        assert_eq!(eq.upper(), Some(&[2.0, 2.0][..]));
        assert_eq!(eq.diag(), &[-2.0, -4.0, -2.0]);
        // fixedValue: gradient coefficients −δ and δ·value
        assert_eq!(eq.internal_coeffs(0), &[-2.0]);
        assert_eq!(eq.boundary_coeffs(0), &[-2.0]);
        // zeroGradient contributes nothing
        assert_eq!(eq.internal_coeffs(1), &[0.0]);
    }

    #[test]
    fn upwind_convection_is_asymmetric_and_conservative() {
        let mesh = MeshState::with_unit_geometry(line(3));
        let mut t = walls(&mesh);
        let flux = vec![1.0, 1.0, -1.0, 1.0];
        let w = upwind_weights(&flux);
        let eq = EquationAssembler::new(&mesh).convection(&flux, &w, &mut t).unwrap();
        assert_eq!(eq.structure(), StructureClass::Asymmetric);
        assert_eq!(eq.lower(), Some(&[-1.0, -1.0][..]));
        assert_eq!(eq.upper(), Some(&[0.0, 0.0][..]));
        let total: Scalar = eq.diag().iter().sum::<Scalar>() + eq.upper().unwrap().iter().sum::<Scalar>()
            + eq.lower().unwrap().iter().sum::<Scalar>();
        assert_eq!(total, 0.0);
        // inflow through the fixed-value face: value 1 carried by flux −1
        assert_eq!(eq.internal_coeffs(0), &[0.0]);
        assert_eq!(eq.boundary_coeffs(0), &[1.0]);
        // outflow through zeroGradient: owner value
        assert_eq!(eq.internal_coeffs(1), &[1.0]);
    }

    #[test]
    fn time_derivative_uses_old_time_level() {
        let mut mesh = MeshState::with_unit_geometry(line(2));
        mesh.set_delta_t(0.5);
        let mut t = walls(&mesh);
        t.internal_mut().copy_from_slice(&[3.0, 4.0]);
        t.store_old_time();
        t.internal_mut().copy_from_slice(&[0.0, 0.0]);
        let eq = EquationAssembler::new(&mesh).time_derivative(&t).unwrap();
        assert_eq!(eq.diag(), &[2.0, 2.0]);
        assert_eq!(eq.source(), &[6.0, 8.0]);
        assert_eq!(eq.structure(), StructureClass::DiagonalOnly);
    }

    #[test]
    fn susp_splits_by_sign() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let mut t = walls(&mesh);
        t.internal_mut().copy_from_slice(&[2.0, 2.0]);
        let coeff = vec![3.0, -3.0];
        let eq = EquationAssembler::new(&mesh)
            .implicit_explicit_source((&coeff).into(), &t)
            .unwrap();
        assert_eq!(eq.diag(), &[3.0, 0.0]);
        assert_eq!(eq.source(), &[0.0, 6.0]);
    }

    #[test]
    fn explicit_terms_land_in_the_source() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let t = walls(&mesh);
        let asm = EquationAssembler::new(&mesh);
        let su = asm.explicit_source(&[1.0, 2.0], &t).unwrap();
        assert_eq!(su.source(), &[-1.0, -2.0]);
        let sp = asm.implicit_source(Coeff::Uniform(-1.5), &t).unwrap();
        assert_eq!(sp.diag(), &[-1.5, -1.5]);
        let div = asm.explicit_flux_divergence(&[1.0, 0.0, 0.5], &t).unwrap();
        assert_eq!(div.source(), &[-1.0, 0.5]);
    }

    #[test]
    fn coupled_patch_must_be_evaluated_before_assembly() {
        let mesh = MeshState::with_unit_geometry(periodic_line(3));
        let reg = PatchFieldRegistry::with_builtin();
        let mut t = Field::<Scalar>::uniform("T", &mesh, 1.0, &reg, |_| PatchFieldSpec::coupled()).unwrap();
        let asm = EquationAssembler::new(&mesh);
        let err = asm.diffusion(Coeff::Uniform(1.0), &mut t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assembly);

        let halo = HaloExchange::new(mesh.topology_arc(), &NoComm);
        t.correct_boundary_conditions(&mesh, &halo).unwrap();
        let eq = asm.diffusion(Coeff::Uniform(1.0), &mut t).unwrap();
        assert_eq!(eq.internal_coeffs(0), &[-1.0]);
        assert_eq!(eq.boundary_coeffs(0), &[-1.0]);
    }

    #[test]
    fn field_from_an_older_topology_is_rejected() {
        let mut mesh = MeshState::with_unit_geometry(line(2));
        let mut t = walls(&mesh);
        let topo = line(2);
        let geo = MeshGeometry::uniform(&topo, 1.0, 1.0, 1.0);
        mesh.update_topology(topo, geo).unwrap();
        let err = EquationAssembler::new(&mesh)
            .diffusion(Coeff::Uniform(1.0), &mut t)
            .unwrap_err();
        assert!(matches!(err, FvError::StaleTopology { .. }));
    }

    #[test]
    fn per_item_coefficients_are_length_checked() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let mut t = walls(&mesh);
        let gamma = vec![1.0; 2];
        let err = EquationAssembler::new(&mesh)
            .diffusion((&gamma).into(), &mut t)
            .unwrap_err();
        assert!(matches!(err, FvError::SizeMismatch { expected: 3, found: 2, .. }));
    }
}
