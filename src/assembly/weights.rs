//! Face interpolation weights for the convection operator.
//!
//! A weight `w` is the owner-side share of a face value:
//! `x_f = w·x_owner + (1 − w)·x_neighbour`. Linear weights come from
//! [`MeshGeometry::weights`](crate::topology::MeshGeometry::weights).

use crate::types::Scalar;

/// Upwind weights: the face takes the owner value when the flux leaves the
/// owner (`flux ≥ 0`), the neighbour value otherwise.
pub fn upwind_weights(flux: &[Scalar]) -> Vec<Scalar> {
    flux.iter().map(|&f| if f >= 0.0 { 1.0 } else { 0.0 }).collect()
}
