//! Geometric coefficients consumed by the assembler.
//!
//! Mesh generation is external; callers hand over the per-cell volumes and
//! per-face area, delta coefficient and interpolation weight. For boundary
//! faces the delta coefficient is the inverse owner-centre-to-face distance,
//! and the weight of a coupled face is the owner-side share of the face value.

use super::Topology;
use crate::fv_error::FvError;
use crate::types::Scalar;

/// Per-cell and per-face geometric data matching one [`Topology`].
#[derive(Clone, Debug, PartialEq)]
pub struct MeshGeometry {
    cell_volumes: Vec<Scalar>,
    face_areas: Vec<Scalar>,
    delta_coeffs: Vec<Scalar>,
    weights: Vec<Scalar>,
}

impl MeshGeometry {
    /// Validate array lengths against `topology` and wrap them.
    pub fn new(
        topology: &Topology,
        cell_volumes: Vec<Scalar>,
        face_areas: Vec<Scalar>,
        delta_coeffs: Vec<Scalar>,
        weights: Vec<Scalar>,
    ) -> Result<Self, FvError> {
        let geometry = Self {
            cell_volumes,
            face_areas,
            delta_coeffs,
            weights,
        };
        geometry.check_against(topology)?;
        Ok(geometry)
    }

    /// # Errors
    /// `SizeMismatch` naming the first array whose length differs from the
    /// cell or face count of `topology`.
    pub fn check_against(&self, topology: &Topology) -> Result<(), FvError> {
        let n_cells = topology.n_cells();
        let n_faces = topology.n_faces();
        if self.cell_volumes.len() != n_cells {
            return Err(FvError::size_mismatch("cell volumes", n_cells, self.cell_volumes.len()));
        }
        for (what, arr) in [
            ("face areas", &self.face_areas),
            ("delta coefficients", &self.delta_coeffs),
            ("interpolation weights", &self.weights),
        ] {
            if arr.len() != n_faces {
                return Err(FvError::size_mismatch(what, n_faces, arr.len()));
            }
        }
        Ok(())
    }

    /// Uniform geometry: every cell has `volume`, every face `area` and
    /// `delta`, and every face is interpolated half-and-half.
    pub fn uniform(topology: &Topology, volume: Scalar, area: Scalar, delta: Scalar) -> Self {
        Self {
            cell_volumes: vec![volume; topology.n_cells()],
            face_areas: vec![area; topology.n_faces()],
            delta_coeffs: vec![delta; topology.n_faces()],
            weights: vec![0.5; topology.n_faces()],
        }
    }

    pub fn cell_volumes(&self) -> &[Scalar] {
        &self.cell_volumes
    }
    pub fn face_areas(&self) -> &[Scalar] {
        &self.face_areas
    }
    pub fn delta_coeffs(&self) -> &[Scalar] {
        &self.delta_coeffs
    }
    /// Linear interpolation weights (owner side).
    pub fn weights(&self) -> &[Scalar] {
        &self.weights
    }

    /// Slice of a face-indexed array restricted to a patch.
    pub fn patch_slice<'a>(&self, topology: &Topology, arr: &'a [Scalar], patch: usize) -> &'a [Scalar] {
        &arr[topology.patch(patch).faces()]
    }
}
