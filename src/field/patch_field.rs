//! Boundary patch fields: the polymorphic boundary-condition protocol.
//!
//! Every patch field walks the state machine `Stale → Evaluating → Evaluated`.
//! [`PatchField::update_coeffs`] is the physics hook and runs at most once
//! between resets; [`PatchField::evaluate`] runs it if needed, computes the
//! face values and leaves the patch `Evaluated` until the next mutation.
//!
//! The four coefficient functions linearise the face value and face-normal
//! gradient in terms of the owner-cell value `x_P`:
//!
//! ```text
//! x_f        = valueInternal · x_P + valueBoundary
//! (∇x)_f · n = gradientInternal · x_P + gradientBoundary
//! ```

use super::coupled::CoupledPatchField;
use crate::fv_error::FvError;
use crate::topology::{PatchDescriptor, PatchId};
use crate::types::{FieldValue, Scalar};
use std::fmt::Debug;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PatchState {
    #[default]
    Stale,
    Evaluating,
    Evaluated,
}

/// Bookkeeping shared by every patch field implementation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchStatus {
    state: PatchState,
    coeffs_updated: bool,
}

impl PatchStatus {
    pub fn state(&self) -> PatchState {
        self.state
    }
    pub fn coeffs_updated(&self) -> bool {
        self.coeffs_updated
    }
}

/// Everything a patch field may read while updating or evaluating.
#[derive(Clone, Copy, Debug)]
pub struct PatchContext<'a, T> {
    pub patch_id: PatchId,
    pub patch: &'a PatchDescriptor,
    /// Owner-cell values in patch face order.
    pub internal: &'a [T],
    pub delta_coeffs: &'a [Scalar],
    pub weights: &'a [Scalar],
}

/// A boundary condition attached to one patch of a [`Field`](super::Field).
///
/// Implementors provide the value computation and the coefficient functions;
/// the state machine is supplied by the provided methods.
pub trait PatchField<T: FieldValue>: Debug + Send + Sync {
    /// Registered type name, e.g. `"fixedValue"`.
    fn type_name(&self) -> &'static str;

    /// Current face values.
    fn values(&self) -> &[T];

    fn status(&self) -> &PatchStatus;
    fn status_mut(&mut self) -> &mut PatchStatus;

    /// Whether this patch field exchanges data with another side.
    fn coupled(&self) -> bool {
        false
    }

    /// Physics hook recomputing coefficients (e.g. a time-varying value).
    fn compute_coeffs(&mut self, _ctx: &PatchContext<'_, T>) -> Result<(), FvError> {
        Ok(())
    }

    /// Recompute the face values from the context.
    fn compute_values(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FvError>;

    fn value_internal_coeffs(&self, weights: &[Scalar], delta_coeffs: &[Scalar]) -> Vec<T>;
    fn value_boundary_coeffs(&self, weights: &[Scalar], delta_coeffs: &[Scalar]) -> Vec<T>;
    fn gradient_internal_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T>;
    fn gradient_boundary_coeffs(&self, delta_coeffs: &[Scalar]) -> Vec<T>;

    fn clone_box(&self) -> Box<dyn PatchField<T>>;

    /// Downcast to the coupled variant.
    fn as_coupled_mut(&mut self) -> Option<&mut CoupledPatchField<T>> {
        None
    }

    fn state(&self) -> PatchState {
        self.status().state
    }

    /// True only once evaluated and not mutated since.
    fn updated(&self) -> bool {
        self.state() == PatchState::Evaluated
    }

    /// Values must be recomputed; coefficients of this pass stay valid.
    fn mark_stale(&mut self) {
        self.status_mut().state = PatchState::Stale;
    }

    /// Start of an outer pass: values and coefficients both go stale.
    fn reset(&mut self) {
        *self.status_mut() = PatchStatus::default();
    }

    /// Run [`compute_coeffs`](Self::compute_coeffs) once per pass.
    fn update_coeffs(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FvError> {
        if self.status().coeffs_updated {
            return Ok(());
        }
        self.compute_coeffs(ctx)?;
        self.status_mut().coeffs_updated = true;
        Ok(())
    }

    /// Bring the face values up to date; a no-op while already evaluated.
    /// A failed evaluation leaves the patch stale.
    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FvError> {
        if self.updated() {
            return Ok(());
        }
        self.status_mut().state = PatchState::Evaluating;
        let result = self.update_coeffs(ctx).and_then(|()| self.compute_values(ctx));
        self.status_mut().state = match result {
            Ok(()) => PatchState::Evaluated,
            Err(_) => PatchState::Stale,
        };
        result
    }
}

impl<T: FieldValue> Clone for Box<dyn PatchField<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Value repeated over every face of a patch.
pub(crate) fn per_face<T: FieldValue>(n: usize, f: impl Fn(usize) -> T) -> Vec<T> {
    (0..n).map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::fixed_gradient::FixedGradientPatchField;
    use crate::topology::PatchDescriptor;

    #[derive(Debug, Clone)]
    struct Counting {
        inner: FixedGradientPatchField<Scalar>,
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl PatchField<Scalar> for Counting {
        fn type_name(&self) -> &'static str {
            "counting"
        }
        fn values(&self) -> &[Scalar] {
            self.inner.values()
        }
        fn status(&self) -> &PatchStatus {
            self.inner.status()
        }
        fn status_mut(&mut self) -> &mut PatchStatus {
            self.inner.status_mut()
        }
        fn compute_coeffs(&mut self, _ctx: &PatchContext<'_, Scalar>) -> Result<(), FvError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
        fn compute_values(&mut self, ctx: &PatchContext<'_, Scalar>) -> Result<(), FvError> {
            self.inner.compute_values(ctx)
        }
        fn value_internal_coeffs(&self, w: &[Scalar], d: &[Scalar]) -> Vec<Scalar> {
            self.inner.value_internal_coeffs(w, d)
        }
        fn value_boundary_coeffs(&self, w: &[Scalar], d: &[Scalar]) -> Vec<Scalar> {
            self.inner.value_boundary_coeffs(w, d)
        }
        fn gradient_internal_coeffs(&self, d: &[Scalar]) -> Vec<Scalar> {
            self.inner.gradient_internal_coeffs(d)
        }
        fn gradient_boundary_coeffs(&self, d: &[Scalar]) -> Vec<Scalar> {
            self.inner.gradient_boundary_coeffs(d)
        }
        fn clone_box(&self) -> Box<dyn PatchField<Scalar>> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn evaluate_is_idempotent_and_update_coeffs_runs_once_per_pass() {
        let patch = PatchDescriptor::wall("w", 1, 1);
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut pf = Counting {
            inner: FixedGradientPatchField::new(vec![2.0]),
            calls: calls.clone(),
        };
        let ctx = PatchContext {
            patch_id: 0,
            patch: &patch,
            internal: &[1.0],
            delta_coeffs: &[4.0],
            weights: &[0.5],
        };
        assert_eq!(pf.state(), PatchState::Stale);
        pf.evaluate(&ctx).unwrap();
        let first = pf.values().to_vec();
        assert!(pf.updated());
        pf.evaluate(&ctx).unwrap();
        assert_eq!(pf.values(), first.as_slice());

        pf.mark_stale();
        assert!(!pf.updated());
        pf.evaluate(&ctx).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        pf.reset();
        pf.update_coeffs(&ctx).unwrap();
        pf.update_coeffs(&ctx).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(first, vec![1.0 + 2.0 / 4.0]);
    }
}
