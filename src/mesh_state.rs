//! Explicit mesh-state context.
//!
//! Instead of a process-wide registry of named objects, every operation that
//! needs the mesh receives a [`MeshState`]: the shared topology, its geometry,
//! the time-step state and a version counter bumped whenever the topology is
//! replaced. Several mesh states (regions, tests) coexist without interfering.

use crate::fv_error::FvError;
use crate::topology::{MeshGeometry, Topology};
use crate::types::Scalar;
use std::sync::Arc;

/// Time-step information needed by the time-derivative operator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeState {
    pub time: Scalar,
    pub delta_t: Scalar,
    pub time_index: u64,
}

impl Default for TimeState {
    fn default() -> Self {
        Self {
            time: 0.0,
            delta_t: 1.0,
            time_index: 0,
        }
    }
}

/// Mesh context shared read-only by every consumer during a time step.
#[derive(Clone, Debug)]
pub struct MeshState {
    topology: Arc<Topology>,
    geometry: Arc<MeshGeometry>,
    version: u64,
    time: TimeState,
}

impl MeshState {
    /// # Errors
    /// `SizeMismatch` when `geometry` was built for a different mesh.
    pub fn new(topology: Topology, geometry: MeshGeometry) -> Result<Self, FvError> {
        geometry.check_against(&topology)?;
        Ok(Self::assemble(topology, geometry))
    }

    /// Mesh with unit volumes, unit face areas and unit delta coefficients.
    pub fn with_unit_geometry(topology: Topology) -> Self {
        let geometry = MeshGeometry::uniform(&topology, 1.0, 1.0, 1.0);
        Self::assemble(topology, geometry)
    }

    fn assemble(topology: Topology, geometry: MeshGeometry) -> Self {
        Self {
            topology: Arc::new(topology),
            geometry: Arc::new(geometry),
            version: 0,
            time: TimeState::default(),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn topology_arc(&self) -> Arc<Topology> {
        Arc::clone(&self.topology)
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    /// Monotonic counter identifying the current topology.
    pub fn topology_version(&self) -> u64 {
        self.version
    }

    /// Whether data built against `topology_version` must be rebuilt.
    pub fn rebuild_required(&self, topology_version: u64) -> bool {
        topology_version != self.version
    }

    /// Replace the topology after a mesh change (moving/adaptive meshes).
    pub fn update_topology(&mut self, topology: Topology, geometry: MeshGeometry) -> Result<(), FvError> {
        geometry.check_against(&topology)?;
        self.topology = Arc::new(topology);
        self.geometry = Arc::new(geometry);
        self.version += 1;
        log::debug!("mesh topology replaced, now at version {}", self.version);
        Ok(())
    }

    /// Replace only the geometry (e.g. mesh motion without connectivity change).
    pub fn update_geometry(&mut self, geometry: MeshGeometry) -> Result<(), FvError> {
        geometry.check_against(&self.topology)?;
        self.geometry = Arc::new(geometry);
        Ok(())
    }

    pub fn time(&self) -> TimeState {
        self.time
    }

    pub fn set_delta_t(&mut self, delta_t: Scalar) {
        self.time.delta_t = delta_t;
    }

    /// Advance to the next time level.
    pub fn advance(&mut self) {
        self.time.time += self.time.delta_t;
        self.time.time_index += 1;
    }
}
