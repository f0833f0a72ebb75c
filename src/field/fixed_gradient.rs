//! Prescribed face-normal gradient (Neumann). `zeroGradient` is the special
//! case with a zero gradient.

use super::patch_field::{PatchContext, PatchField, PatchStatus, per_face};
use crate::fv_error::FvError;
use crate::types::{FieldValue, Scalar};

#[derive(Clone, Debug)]
pub struct FixedGradientPatchField<T> {
    type_name: &'static str,
    gradient: Vec<T>,
    values: Vec<T>,
    status: PatchStatus,
}

impl<T: FieldValue> FixedGradientPatchField<T> {
    pub fn new(gradient: Vec<T>) -> Self {
        let n = gradient.len();
        Self {
            type_name: "fixedGradient",
            gradient,
            values: vec![T::zero(); n],
            status: PatchStatus::default(),
        }
    }

    pub fn zero_gradient(n_faces: usize) -> Self {
        Self {
            type_name: "zeroGradient",
            ..Self::new(vec![T::zero(); n_faces])
        }
    }

    pub fn gradient(&self) -> &[T] {
        &self.gradient
    }

    pub fn set_gradient(&mut self, gradient: Vec<T>) {
        self.gradient = gradient;
        self.mark_stale();
    }
}

impl<T: FieldValue> PatchField<T> for FixedGradientPatchField<T> {
    fn type_name(&self) -> &'static str {
        self.type_name
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

    fn compute_values(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FvError> {
        for (f, v) in self.values.iter_mut().enumerate() {
            *v = ctx.internal[f] + self.gradient[f] * (1.0 / ctx.delta_coeffs[f]);
        }
        Ok(())
    }

    fn value_internal_coeffs(&self, _weights: &[Scalar], _delta_coeffs: &[Scalar]) -> Vec<T> {
        vec![T::uniform(1.0); self.gradient.len()]
    }
    fn value_boundary_coeffs(&self, _weights: &[Scalar], delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.gradient.len(), |f| self.gradient[f] * (1.0 / delta_coeffs[f]))
    }
    fn gradient_internal_coeffs(&self, _delta_coeffs: &[Scalar]) -> Vec<T> {
        vec![T::zero(); self.gradient.len()]
    }
    fn gradient_boundary_coeffs(&self, _delta_coeffs: &[Scalar]) -> Vec<T> {
        self.gradient.clone()
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}
