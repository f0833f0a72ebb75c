//! Blend of fixed value and fixed gradient, weighted per face by a value
//! fraction `f ∈ [0, 1]` (`f = 1` is pure fixed value).

use super::patch_field::{PatchContext, PatchField, PatchStatus, per_face};
use crate::fv_error::FvError;
use crate::types::{FieldValue, Scalar};

#[derive(Clone, Debug)]
pub struct MixedPatchField<T> {
    ref_value: Vec<T>,
    ref_gradient: Vec<T>,
    value_fraction: Vec<Scalar>,
    values: Vec<T>,
    status: PatchStatus,
}

impl<T: FieldValue> MixedPatchField<T> {
    /// # Errors
    /// All three arrays must have the same length.
    pub fn new(ref_value: Vec<T>, ref_gradient: Vec<T>, value_fraction: Vec<Scalar>) -> Result<Self, FvError> {
        let n = ref_value.len();
        if ref_gradient.len() != n {
            return Err(FvError::size_mismatch("mixed reference gradient", n, ref_gradient.len()));
        }
        if value_fraction.len() != n {
            return Err(FvError::size_mismatch("mixed value fraction", n, value_fraction.len()));
        }
        Ok(Self {
            values: ref_value.clone(),
            ref_value,
            ref_gradient,
            value_fraction,
            status: PatchStatus::default(),
        })
    }

    pub fn ref_value(&self) -> &[T] {
        &self.ref_value
    }
    pub fn ref_gradient(&self) -> &[T] {
        &self.ref_gradient
    }
    pub fn value_fraction(&self) -> &[Scalar] {
        &self.value_fraction
    }

    /// Mutable access to the blend parameters; the patch goes stale.
    pub fn coefficients_mut(&mut self) -> (&mut [T], &mut [T], &mut [Scalar]) {
        self.mark_stale();
        (&mut self.ref_value, &mut self.ref_gradient, &mut self.value_fraction)
    }
}

impl<T: FieldValue> PatchField<T> for MixedPatchField<T> {
    fn type_name(&self) -> &'static str {
        "mixed"
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
            let frac = self.value_fraction[f];
            let extrapolated = ctx.internal[f] + self.ref_gradient[f] * (1.0 / ctx.delta_coeffs[f]);
            *v = self.ref_value[f] * frac + extrapolated * (1.0 - frac);
        }
        Ok(())
    }

    fn value_internal_coeffs(&self, _weights: &[Scalar], _delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(1.0 - self.value_fraction[f]))
    }
    fn value_boundary_coeffs(&self, _weights: &[Scalar], delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| {
            let frac = self.value_fraction[f];
            self.ref_value[f] * frac + self.ref_gradient[f] * ((1.0 - frac) / delta_coeffs[f])
        })
    }
    fn gradient_internal_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| T::uniform(-self.value_fraction[f] * delta_coeffs[f]))
    }
    fn gradient_boundary_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T> {
        per_face(self.values.len(), |f| {
            let frac = self.value_fraction[f];
            self.ref_value[f] * (frac * delta_coeffs[f]) + self.ref_gradient[f] * (1.0 - frac)
        })
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}
