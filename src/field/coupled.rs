//! Patch field for processor, periodic and non-conformal patches.
//!
//! The neighbour-side values are staged by the halo layer through
//! [`CoupledPatchField::set_patch_neighbour_field`]; evaluation interpolates
//! between the owner cell and that neighbour value with the patch weights.

use super::patch_field::{PatchContext, PatchField, PatchStatus, per_face};
use crate::fv_error::FvError;
use crate::types::{FieldValue, Scalar};

#[derive(Clone, Debug)]
pub struct CoupledPatchField<T> {
    values: Vec<T>,
    neighbour: Option<Vec<T>>,
    status: PatchStatus,
}

impl<T: FieldValue> CoupledPatchField<T> {
    pub fn new(n_faces: usize) -> Self {
        Self {
            values: vec![T::zero(); n_faces],
            neighbour: None,
            status: PatchStatus::default(),
        }
    }

    /// Neighbour-side values from the last completed halo epoch.
    pub fn patch_neighbour_field(&self) -> Option<&[T]> {
        self.neighbour.as_deref()
    }

    /// Stage neighbour-side values; the patch must be evaluated again.
    ///
    /// # Errors
    /// Fails if `values` does not match the patch size.
    pub fn set_patch_neighbour_field(&mut self, values: Vec<T>) -> Result<(), FvError> {
        if values.len() != self.values.len() {
            return Err(FvError::size_mismatch("neighbour patch values", self.values.len(), values.len()));
        }
        self.neighbour = Some(values);
        self.mark_stale();
        Ok(())
    }
}

impl<T: FieldValue> PatchField<T> for CoupledPatchField<T> {
    fn type_name(&self) -> &'static str {
        "coupled"
    }
    fn values(&self) -> &[T] {
        &self.values
    }
    fn status(&self) -> &PatchStatus {
        &self.status
    }
    fn status_mut(&mut self) -> &mut PatchStatus {
        &mut self.status
    }
    fn coupled(&self) -> bool {
        true
    }

    fn compute_values(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FvError> {
        let Some(nbr) = self.neighbour.as_ref() else {
            return Err(FvError::HaloNotStaged {
                patch: ctx.patch.name().to_string(),
            });
        };
        for (f, v) in self.values.iter_mut().enumerate() {
            let w = ctx.weights[f];
            *v = ctx.internal[f] * w + nbr[f] * (1.0 - w);
        }
        Ok(())
    }

    fn value_internal_coeffs(&self, weights: &[Scalar], _delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(weights[f]))
    }
    fn value_boundary_coeffs(&self, weights: &[Scalar], _delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(1.0 - weights[f]))
    }
    fn gradient_internal_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(-delta_coeffs[f]))
    }
    fn gradient_boundary_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(delta_coeffs[f]))
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }

    fn as_coupled_mut(&mut self) -> Option<&mut CoupledPatchField<T>> {
        Some(self)
    }
}
