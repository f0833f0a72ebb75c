//! Cell-centred fields with per-patch boundary conditions.

pub mod coupled;
pub mod fixed_gradient;
pub mod fixed_value;
pub mod mixed;
pub mod patch_field;
pub mod registry;

pub use coupled::CoupledPatchField;
pub use fixed_gradient::FixedGradientPatchField;
pub use fixed_value::FixedValuePatchField;
pub use mixed::MixedPatchField;
pub use patch_field::{PatchContext, PatchField, PatchState, PatchStatus};
pub use registry::{PatchFieldRegistry, PatchFieldSpec, PatchRequirement};

use crate::algs::communicator::Communicator;
use crate::algs::halo::HaloExchange;
use crate::fv_error::FvError;
use crate::mesh_state::MeshState;
use crate::topology::PatchId;
use crate::types::{FieldValue, Scalar};
use std::collections::BTreeMap;

/// Dense per-cell values of `T` plus one boundary condition per patch.
#[derive(Clone, Debug)]
pub struct Field<T: FieldValue> {
    name: String,
    internal: Vec<T>,
    boundary: Vec<Box<dyn PatchField<T>>>,
    old_time: Option<Vec<T>>,
    prev_iter: Option<Vec<T>>,
    topology_version: u64,
}

impl<T: FieldValue> Field<T> {
    /// Attach `boundary` (one patch field per patch, in patch order) to
    /// `internal` and evaluate the uncoupled patches.
    ///
    /// # Errors
    /// Size mismatches against the mesh, or a patch field whose coupling does
    /// not match its patch.
    pub fn new(
        name: impl Into<String>,
        mesh: &MeshState,
        internal: Vec<T>,
        boundary: Vec<Box<dyn PatchField<T>>>,
    ) -> Result<Self, FvError> {
        let name = name.into();
        let topo = mesh.topology();
        if internal.len() != topo.n_cells() {
            return Err(FvError::size_mismatch(
                format!("internal values of field '{name}'"),
                topo.n_cells(),
                internal.len(),
            ));
        }
        if boundary.len() != topo.patches().len() {
            return Err(FvError::size_mismatch(
                format!("patch fields of field '{name}'"),
                topo.patches().len(),
                boundary.len(),
            ));
        }
        for (patch, pf) in topo.patches().iter().zip(&boundary) {
            if pf.values().len() != patch.size() {
                return Err(FvError::size_mismatch(
                    format!("patch '{}' of field '{name}'", patch.name()),
                    patch.size(),
                    pf.values().len(),
                ));
            }
            if pf.coupled() != patch.is_coupled() {
                return Err(FvError::PatchKindMismatch {
                    field: name.clone(),
                    patch: patch.name().to_string(),
                    patch_field_type: pf.type_name().to_string(),
                    required: if pf.coupled() { "coupled" } else { "uncoupled" },
                    found: patch.coupling().name(),
                });
            }
        }
        let mut field = Self {
            name,
            internal,
            boundary,
            old_time: None,
            prev_iter: None,
            topology_version: mesh.topology_version(),
        };
        field.evaluate_uncoupled(mesh)?;
        Ok(field)
    }

    /// Build the boundary from per-patch specs keyed by patch name.
    ///
    /// # Errors
    /// A patch without a spec is a configuration error; see also
    /// [`PatchFieldRegistry::construct`].
    pub fn from_specs(
        name: impl Into<String>,
        mesh: &MeshState,
        internal: Vec<T>,
        specs: &BTreeMap<String, PatchFieldSpec<T>>,
        registry: &PatchFieldRegistry<T>,
    ) -> Result<Self, FvError> {
        let name = name.into();
        let boundary = mesh
            .topology()
            .patches()
            .iter()
            .map(|patch| {
                let spec = specs.get(patch.name()).ok_or_else(|| FvError::InvalidConfiguration {
                    entry: format!("boundaryField.{}", patch.name()),
                    reason: format!("no patch field given for field '{name}'"),
                })?;
                registry.construct(&name, patch, spec)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, mesh, internal, boundary)
    }

    /// Uniform internal value with every patch built from `spec_for(patch)`.
    pub fn uniform(
        name: impl Into<String>,
        mesh: &MeshState,
        value: T,
        registry: &PatchFieldRegistry<T>,
        spec_for: impl Fn(&str) -> PatchFieldSpec<T>,
    ) -> Result<Self, FvError> {
        let specs: BTreeMap<String, PatchFieldSpec<T>> = mesh
            .topology()
            .patches()
            .iter()
            .map(|p| (p.name().to_string(), spec_for(p.name())))
            .collect();
        Self::from_specs(name, mesh, vec![value; mesh.topology().n_cells()], &specs, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// Mutable cell values; every patch goes stale.
    pub fn internal_mut(&mut self) -> &mut [T] {
        for pf in &mut self.boundary {
            pf.mark_stale();
        }
        &mut self.internal
    }

    pub fn n_patches(&self) -> usize {
        self.boundary.len()
    }

    pub fn boundary(&self, patch: PatchId) -> &dyn PatchField<T> {
        self.boundary[patch].as_ref()
    }

    pub fn boundary_mut(&mut self, patch: PatchId) -> &mut dyn PatchField<T> {
        self.boundary[patch].as_mut()
    }

    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    /// # Errors
    /// `StaleTopology` if the mesh was replaced after this field was built.
    pub fn check_topology(&self, mesh: &MeshState) -> Result<(), FvError> {
        if mesh.rebuild_required(self.topology_version) {
            return Err(FvError::StaleTopology {
                field: self.name.clone(),
                field_version: self.topology_version,
                mesh_version: mesh.topology_version(),
            });
        }
        Ok(())
    }

    /// Cell values adjacent to `patch`, in patch face order.
    pub fn patch_internal_field(&self, mesh: &MeshState, patch: PatchId) -> Vec<T> {
        mesh.topology()
            .face_cells(patch)
            .iter()
            .map(|&c| self.internal[c])
            .collect()
    }

    /// Start of an outer pass: every patch back to `Stale` with coefficients
    /// due for an update.
    pub fn reset_boundary_states(&mut self) {
        for pf in &mut self.boundary {
            pf.reset();
        }
    }

    fn evaluate_patch(&mut self, mesh: &MeshState, patch: PatchId) -> Result<(), FvError> {
        let topo = mesh.topology();
        let geo = mesh.geometry();
        let internal = self.patch_internal_field(mesh, patch);
        let ctx = PatchContext {
            patch_id: patch,
            patch: topo.patch(patch),
            internal: &internal,
            delta_coeffs: geo.patch_slice(topo, geo.delta_coeffs(), patch),
            weights: geo.patch_slice(topo, geo.weights(), patch),
        };
        self.boundary[patch].evaluate(&ctx)
    }

    /// Evaluate every uncoupled patch; coupled patches need a halo epoch.
    pub fn evaluate_uncoupled(&mut self, mesh: &MeshState) -> Result<(), FvError> {
        self.check_topology(mesh)?;
        for patch in 0..self.boundary.len() {
            if !self.boundary[patch].coupled() {
                self.evaluate_patch(mesh, patch)?;
            }
        }
        Ok(())
    }

    /// Exchange coupled-patch data in one halo epoch, then evaluate every
    /// patch.
    ///
    /// Coupled patches of the same field see each other's values from the
    /// start of the epoch; a pass over mutually coupled patches is therefore
    /// lagged by one exchange.
    pub fn correct_boundary_conditions<C: Communicator>(
        &mut self,
        mesh: &MeshState,
        halo: &HaloExchange<'_, C>,
    ) -> Result<(), FvError> {
        self.check_topology(mesh)?;
        let mut epoch = halo.begin::<T>();
        let mut tickets = Vec::new();
        for patch in 0..self.boundary.len() {
            if self.boundary[patch].coupled() {
                let values = self.patch_internal_field(mesh, patch);
                tickets.push(epoch.init_send(patch, &values)?);
            }
        }
        let mut done = epoch.flush()?;
        for ticket in tickets {
            let patch = ticket.patch();
            let values = done.receive(ticket)?;
            let type_name = self.boundary[patch].type_name();
            let Some(pf) = self.boundary[patch].as_coupled_mut() else {
                return Err(FvError::PatchKindMismatch {
                    field: self.name.clone(),
                    patch: mesh.topology().patch(patch).name().to_string(),
                    patch_field_type: type_name.to_string(),
                    required: "coupled",
                    found: "a coupled patch field without neighbour storage",
                });
            };
            pf.set_patch_neighbour_field(values)?;
        }
        for patch in 0..self.boundary.len() {
            self.evaluate_patch(mesh, patch)?;
        }
        Ok(())
    }

    /// Snapshot the cell values as the old time level.
    pub fn store_old_time(&mut self) {
        self.old_time = Some(self.internal.clone());
    }

    pub fn old_time(&self) -> Option<&[T]> {
        self.old_time.as_deref()
    }

    /// Old-time values, or the current values before the first snapshot.
    pub fn old_time_or_current(&self) -> &[T] {
        self.old_time.as_deref().unwrap_or(&self.internal)
    }

    /// Snapshot the cell values for under-relaxation.
    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.clone());
    }

    pub fn prev_iter(&self) -> Option<&[T]> {
        self.prev_iter.as_deref()
    }

    /// `x = x_prev + ω (x − x_prev)`.
    ///
    /// # Errors
    /// Fails if `omega` is outside `(0, 1]` or no previous iteration was stored.
    pub fn relax(&mut self, omega: Scalar) -> Result<(), FvError> {
        if !(omega > 0.0 && omega <= 1.0) {
            return Err(FvError::InvalidConfiguration {
                entry: format!("relaxationFactors.{}", self.name),
                reason: format!("factor {omega} is outside (0, 1]"),
            });
        }
        let Some(prev) = self.prev_iter.take() else {
            return Err(FvError::InvalidConfiguration {
                entry: format!("relax({})", self.name),
                reason: "no previous iteration stored; call store_prev_iter first".into(),
            });
        };
        for (x, p) in self.internal_mut().iter_mut().zip(&prev) {
            *x = *p + (*x - *p) * omega;
        }
        self.prev_iter = Some(prev);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::test_meshes::{line, periodic_line};

    fn fixed_ends(name: &str) -> PatchFieldSpec<Scalar> {
        match name {
            "left" => PatchFieldSpec::fixed_value(1.0),
            _ => PatchFieldSpec::zero_gradient(),
        }
    }

    #[test]
    fn construction_evaluates_uncoupled_patches() {
        let mesh = MeshState::with_unit_geometry(line(3));
        let reg = PatchFieldRegistry::with_builtin();
        let f = Field::uniform("T", &mesh, 0.5, &reg, fixed_ends).unwrap();
        assert_eq!(f.boundary(0).values(), &[1.0]);
        assert_eq!(f.boundary(1).values(), &[0.5]);
        assert!(f.boundary(1).updated());
    }

    #[test]
    fn internal_mutation_marks_patches_stale() {
        let mesh = MeshState::with_unit_geometry(line(3));
        let reg = PatchFieldRegistry::with_builtin();
        let mut f = Field::uniform("T", &mesh, 0.5, &reg, fixed_ends).unwrap();
        f.internal_mut()[2] = 4.0;
        assert!(!f.boundary(1).updated());
        f.evaluate_uncoupled(&mesh).unwrap();
        assert_eq!(f.boundary(1).values(), &[4.0]);
    }

    #[test]
    fn missing_spec_is_reported() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::<Scalar>::with_builtin();
        let mut specs = BTreeMap::new();
        specs.insert("left".to_string(), PatchFieldSpec::zero_gradient());
        let err = Field::from_specs("T", &mesh, vec![0.0; 2], &specs, &reg).unwrap_err();
        assert!(err.to_string().contains("boundaryField.right"));
    }

    #[test]
    fn periodic_patches_interpolate_across_the_seam() {
        let mesh = MeshState::with_unit_geometry(periodic_line(3));
        let reg = PatchFieldRegistry::with_builtin();
        let mut f =
            Field::from_specs("T", &mesh, vec![1.0, 2.0, 3.0], &coupled_specs(), &reg).unwrap();
        assert!(!f.boundary(0).updated());
        let halo = HaloExchange::new(mesh.topology_arc(), &NoComm);
        f.correct_boundary_conditions(&mesh, &halo).unwrap();
        assert_eq!(f.boundary(0).values(), &[2.0]);
        assert_eq!(f.boundary(1).values(), &[2.0]);
        assert!(f.boundary(0).updated() && f.boundary(1).updated());
    }

    fn coupled_specs() -> BTreeMap<String, PatchFieldSpec<Scalar>> {
        ["left", "right"]
            .into_iter()
            .map(|n| (n.to_string(), PatchFieldSpec::coupled()))
            .collect()
    }

    #[test]
    fn relax_moves_part_way_from_previous_iteration() {
        let mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::with_builtin();
        let mut f = Field::uniform("T", &mesh, 0.0, &reg, |_| PatchFieldSpec::zero_gradient()).unwrap();
        assert!(f.relax(0.5).is_err());
        f.store_prev_iter();
        f.internal_mut().copy_from_slice(&[2.0, 4.0]);
        f.relax(0.5).unwrap();
        assert_eq!(f.internal(), &[1.0, 2.0]);
    }

    #[test]
    fn stale_topology_is_detected() {
        let mut mesh = MeshState::with_unit_geometry(line(2));
        let reg = PatchFieldRegistry::with_builtin();
        let mut f = Field::uniform("T", &mesh, 0.0, &reg, |_| PatchFieldSpec::zero_gradient()).unwrap();
        let t = line(2);
        let g = crate::topology::MeshGeometry::uniform(&t, 1.0, 1.0, 1.0);
        mesh.update_topology(t, g).unwrap();
        assert!(matches!(f.evaluate_uncoupled(&mesh), Err(FvError::StaleTopology { .. })));
    }
}
