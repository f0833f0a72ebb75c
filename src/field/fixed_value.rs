//! Prescribed face value (Dirichlet).

use super::patch_field::{PatchContext, PatchField, PatchStatus, per_face};
use crate::fv_error::FvError;
use crate::types::{FieldValue, Scalar};

#[derive(Clone, Debug)]
pub struct FixedValuePatchField<T> {
    values: Vec<T>,
    status: PatchStatus,
}

impl<T: FieldValue> FixedValuePatchField<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            status: PatchStatus::default(),
        }
    }

    pub fn uniform(value: T, n_faces: usize) -> Self {
        Self::new(vec![value; n_faces])
    }

    /// Replace the prescribed values; the patch goes stale.
    pub fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
        self.mark_stale();
    }
}

impl<T: FieldValue> PatchField<T> for FixedValuePatchField<T> {
    fn type_name(&self) -> &'static str {
        "fixedValue"
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

    fn compute_values(&mut self, _ctx: &PatchContext<'_, T>) -> Result<(), FvError> {
        Ok(())
    }

    fn value_internal_coeffs(&self, _weights: &[Scalar], _delta_coeffs: &[Scalar]) -> Vec<T> {
        vec![T::zero(); self.values.len()]
    }
    fn value_boundary_coeffs(&self, _weights: &[Scalar], _delta_coeffs: &[Scalar]) -> Vec<T> {
        self.values.clone()
    }
    fn gradient_internal_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(-delta_coeffs[f]))
    }
    fn gradient_boundary_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| self.values[f] * delta_coeffs[f])
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_coeffs_linearise_towards_the_wall_value() {
        let pf = FixedValuePatchField::uniform(3.0 as Scalar, 2);
        let delta = [2.0, 4.0];
        let gi = pf.gradient_internal_coeffs(&delta);
        let gb = pf.gradient_boundary_coeffs(&delta);
        // (x_b - x_P)·δ with x_P = 1
        assert_eq!(gi[1] * 1.0 + gb[1], (3.0 - 1.0) * 4.0);
        assert_eq!(pf.value_internal_coeffs(&[0.5, 0.5], &delta), vec![0.0, 0.0]);
    }
}
