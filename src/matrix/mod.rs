//! Assembled finite-volume operator in LDU form.
//!
//! A [`SparseEquation`] represents the expression `A·x − source` for one field.
//! Solving sets it to zero. Off-diagonal and diagonal coefficients are scalar;
//! the source and the per-patch coefficients carry the field's value type so a
//! vector equation is solved one component at a time with a shared matrix.
//!
//! Boundary handling follows the usual split:
//!
//! * `internal_coeffs[patch][face]` add to the diagonal of the face's owner;
//! * `boundary_coeffs[patch][face]` add to the owner's source on uncoupled
//!   patches, and multiply the neighbour-side value inside `A·x` on coupled
//!   ones.

mod solve;
pub mod structure;

pub use structure::{OffDiagonal, StructureClass};

use crate::algs::communicator::ReduceOp;
use crate::algs::halo::ParallelOps;
use crate::field::Field;
use crate::fv_error::FvError;
use crate::mesh_state::MeshState;
use crate::topology::{PatchId, Topology};
use crate::types::{FieldValue, Scalar};
use num_traits::Zero;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct SparseEquation<T: FieldValue> {
    psi: String,
    topology: Arc<Topology>,
    topology_version: u64,
    diag: Vec<Scalar>,
    off_diag: OffDiagonal,
    source: Vec<T>,
    internal_coeffs: Vec<Vec<T>>,
    boundary_coeffs: Vec<Vec<T>>,
}

impl<T: FieldValue> SparseEquation<T> {
    /// Empty (all-zero) equation for `psi` on the current mesh.
    pub fn new(psi: &Field<T>, mesh: &MeshState) -> Self {
        let topology = mesh.topology_arc();
        let n = topology.n_cells();
        let per_patch = || {
            topology
                .patches()
                .iter()
                .map(|p| vec![T::zero(); p.size()])
                .collect::<Vec<_>>()
        };
        Self {
            psi: psi.name().to_string(),
            topology_version: mesh.topology_version(),
            diag: vec![0.0; n],
            off_diag: OffDiagonal::None,
            source: vec![T::zero(); n],
            internal_coeffs: per_patch(),
            boundary_coeffs: per_patch(),
            topology,
        }
    }

    /// Name of the field this equation solves for.
    pub fn psi_name(&self) -> &str {
        &self.psi
    }
    pub fn topology(&self) -> &Topology {
        &self.topology
    }
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }
    pub fn n_cells(&self) -> usize {
        self.diag.len()
    }

    pub fn diag(&self) -> &[Scalar] {
        &self.diag
    }
    pub fn diag_mut(&mut self) -> &mut [Scalar] {
        &mut self.diag
    }

    pub fn off_diagonal(&self) -> &OffDiagonal {
        &self.off_diag
    }
    /// `None` while no internal-face coefficient has been set.
    pub fn upper(&self) -> Option<&[Scalar]> {
        self.off_diag.upper()
    }
    pub fn lower(&self) -> Option<&[Scalar]> {
        self.off_diag.lower()
    }
    /// Writes through to both triangles while the storage is symmetric.
    pub fn upper_mut(&mut self) -> &mut [Scalar] {
        self.off_diag.upper_mut(self.topology.n_internal_faces())
    }
    /// Splits symmetric storage into independent triangles.
    pub fn lower_mut(&mut self) -> &mut [Scalar] {
        self.off_diag.lower_mut(self.topology.n_internal_faces())
    }

    pub fn source(&self) -> &[T] {
        &self.source
    }
    pub fn source_mut(&mut self) -> &mut [T] {
        &mut self.source
    }

    pub fn internal_coeffs(&self, patch: PatchId) -> &[T] {
        &self.internal_coeffs[patch]
    }
    pub fn internal_coeffs_mut(&mut self, patch: PatchId) -> &mut [T] {
        &mut self.internal_coeffs[patch]
    }
    pub fn boundary_coeffs(&self, patch: PatchId) -> &[T] {
        &self.boundary_coeffs[patch]
    }
    pub fn boundary_coeffs_mut(&mut self, patch: PatchId) -> &mut [T] {
        &mut self.boundary_coeffs[patch]
    }

    /// Local structure: interface coefficients count as off-diagonal terms.
    pub fn structure(&self) -> StructureClass {
        let coupled = self
            .topology
            .patches()
            .iter()
            .zip(&self.boundary_coeffs)
            .any(|(p, bc)| p.is_coupled() && bc.iter().any(|v| !v.is_zero()));
        match self.off_diag.class() {
            StructureClass::DiagonalOnly if coupled => StructureClass::Symmetric,
            class => class,
        }
    }

    /// Structure agreed by every rank, so all ranks select the same solver.
    pub fn structure_global(&self, ops: &dyn ParallelOps) -> Result<StructureClass, FvError> {
        let rank = ops.reduce(self.structure().rank(), ReduceOp::Max)?;
        Ok(StructureClass::from_rank(rank))
    }

    fn check_compatible(&self, other: &Self) -> Result<(), FvError> {
        if self.psi != other.psi {
            return Err(FvError::InvalidConfiguration {
                entry: format!("equation for '{}'", self.psi),
                reason: format!("cannot combine with an equation for '{}'", other.psi),
            });
        }
        if self.topology_version != other.topology_version || self.n_cells() != other.n_cells() {
            return Err(FvError::StaleTopology {
                field: other.psi.clone(),
                field_version: other.topology_version,
                mesh_version: self.topology_version,
            });
        }
        Ok(())
    }

    /// `self += sign·other`, checking both describe the same field and mesh.
    pub fn try_add_scaled(&mut self, other: &Self, sign: Scalar) -> Result<(), FvError> {
        self.check_compatible(other)?;
        for (a, b) in self.diag.iter_mut().zip(&other.diag) {
            *a += sign * b;
        }
        self.off_diag.combine(&other.off_diag, sign);
        for (a, b) in self.source.iter_mut().zip(&other.source) {
            *a += *b * sign;
        }
        for (mine, theirs) in self
            .internal_coeffs
            .iter_mut()
            .chain(self.boundary_coeffs.iter_mut())
            .zip(other.internal_coeffs.iter().chain(&other.boundary_coeffs))
        {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += *b * sign;
            }
        }
        Ok(())
    }

    pub fn try_add(&mut self, other: &Self) -> Result<(), FvError> {
        self.try_add_scaled(other, 1.0)
    }

    pub fn try_sub(&mut self, other: &Self) -> Result<(), FvError> {
        self.try_add_scaled(other, -1.0)
    }

    pub fn negate(&mut self) {
        self.diag.iter_mut().for_each(|d| *d = -*d);
        self.off_diag.negate();
        for v in self
            .source
            .iter_mut()
            .chain(self.internal_coeffs.iter_mut().flatten())
            .chain(self.boundary_coeffs.iter_mut().flatten())
        {
            *v = -*v;
        }
    }
}

/// # Panics
/// If the two equations belong to different fields or topologies; use
/// [`SparseEquation::try_add`] to get the error instead.
impl<T: FieldValue> AddAssign<&SparseEquation<T>> for SparseEquation<T> {
    fn add_assign(&mut self, rhs: &SparseEquation<T>) {
        if let Err(e) = self.try_add(rhs) {
            panic!("{e}");
        }
    }
}

impl<T: FieldValue> AddAssign for SparseEquation<T> {
    fn add_assign(&mut self, rhs: SparseEquation<T>) {
        *self += &rhs;
    }
}

/// # Panics
/// As for `+=`.
impl<T: FieldValue> SubAssign<&SparseEquation<T>> for SparseEquation<T> {
    fn sub_assign(&mut self, rhs: &SparseEquation<T>) {
        if let Err(e) = self.try_sub(rhs) {
            panic!("{e}");
        }
    }
}

impl<T: FieldValue> SubAssign for SparseEquation<T> {
    fn sub_assign(&mut self, rhs: SparseEquation<T>) {
        *self -= &rhs;
    }
}

impl<T: FieldValue> Add for SparseEquation<T> {
    type Output = SparseEquation<T>;
    fn add(mut self, rhs: SparseEquation<T>) -> Self::Output {
        self += &rhs;
        self
    }
}

impl<T: FieldValue> Sub for SparseEquation<T> {
    type Output = SparseEquation<T>;
    fn sub(mut self, rhs: SparseEquation<T>) -> Self::Output {
        self -= &rhs;
        self
    }
}

impl<T: FieldValue> Neg for SparseEquation<T> {
    type Output = SparseEquation<T>;
    fn neg(mut self) -> Self::Output {
        self.negate();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::halo::HaloExchange;
    use crate::field::{PatchFieldRegistry, PatchFieldSpec};
    use crate::topology::test_meshes::{line, periodic_line};

    fn scalar_field(mesh: &MeshState, name: &str) -> Field<Scalar> {
        let reg = PatchFieldRegistry::with_builtin();
        Field::uniform(name, mesh, 0.0, &reg, |_| PatchFieldSpec::zero_gradient()).unwrap()
    }

    #[test]
    fn empty_equation_is_diagonal_only() {
        let mesh = MeshState::with_unit_geometry(line(3));
        let eq = SparseEquation::new(&scalar_field(&mesh, "T"), &mesh);
        assert_eq!(eq.structure(), StructureClass::DiagonalOnly);
        assert!(eq.upper().is_none());
        assert_eq!(eq.internal_coeffs(0).len(), 1);
    }

    #[test]
    fn sum_of_symmetric_and_asymmetric_is_asymmetric() {
        let mesh = MeshState::with_unit_geometry(line(3));
        let t = scalar_field(&mesh, "T");
        let mut a = SparseEquation::new(&t, &mesh);
        a.upper_mut().copy_from_slice(&[1.0, 1.0]);
        let mut b = SparseEquation::new(&t, &mesh);
        b.lower_mut().copy_from_slice(&[2.0, 0.0]);
        assert_eq!(a.structure(), StructureClass::Symmetric);
        let c = a.clone() + b;
        assert_eq!(c.structure(), StructureClass::Asymmetric);
        assert_eq!(c.lower(), Some(&[3.0, 1.0][..]));
        let back = -(-c.clone());
        assert_eq!(back.lower(), c.lower());
    }

    #[test]
    fn combining_different_fields_is_rejected() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let mut a = SparseEquation::new(&scalar_field(&mesh, "T"), &mesh);
        let b = SparseEquation::new(&scalar_field(&mesh, "p"), &mesh);
        assert!(a.try_add(&b).is_err());
    }

    #[test]
    #[should_panic]
    fn operator_panics_on_mismatch() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let mut a = SparseEquation::new(&scalar_field(&mesh, "T"), &mesh);
        a += SparseEquation::new(&scalar_field(&mesh, "p"), &mesh);
    }

    #[test]
    fn coupled_coefficients_alone_make_the_matrix_symmetric() {
        let mesh = MeshState::with_unit_geometry(periodic_line(3));
        let reg = PatchFieldRegistry::with_builtin();
        let t = Field::<Scalar>::uniform("T", &mesh, 0.0, &reg, |_| PatchFieldSpec::coupled()).unwrap();
        let mut eq = SparseEquation::new(&t, &mesh);
        eq.boundary_coeffs_mut(1)[0] = -1.0;
        assert_eq!(eq.structure(), StructureClass::Symmetric);
        let halo = HaloExchange::new(mesh.topology_arc(), &NoComm);
        assert_eq!(eq.structure_global(&halo).unwrap(), StructureClass::Symmetric);
    }
}
