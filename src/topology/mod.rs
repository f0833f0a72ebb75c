//! Face-addressed mesh connectivity.
//!
//! A [`Topology`] stores, for every face, the owner cell, and for every
//! internal face the neighbour cell. Faces are ordered internal first, then
//! patch by patch; each [`PatchDescriptor`] covers a contiguous face range and
//! carries a [`CouplingKind`] describing where the "other side" lives.
//!
//! The structure is immutable once built. Derived addressing (faces sorted by
//! neighbour, per-cell face lists) is computed on first use and cached.

pub mod addressing;
pub mod geometry;
pub mod validation;

use crate::fv_error::FvError;
use crate::types::{Scalar, Tensor};
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub use addressing::LduAddressing;
pub use geometry::MeshGeometry;

/// Index of a boundary patch within its topology.
pub type PatchId = usize;

/// Per-face interpolation stencil of a non-conformal patch:
/// for each local face, `(partner_face, weight)` pairs.
pub type InterpolationStencil = Vec<Vec<(usize, Scalar)>>;

/// Value transform applied when data crosses a periodic patch pair.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchTransform {
    /// Pure translation; values are carried unchanged.
    Translational,
    /// Rotation applied to vector and tensor values on arrival.
    Rotational(Tensor),
}

impl PatchTransform {
    pub fn rotation(&self) -> Option<&Tensor> {
        match self {
            PatchTransform::Translational => None,
            PatchTransform::Rotational(r) => Some(r),
        }
    }
}

/// How a boundary patch is connected to data outside this partition's cells.
#[derive(Clone, Debug, PartialEq)]
pub enum CouplingKind {
    /// Physical boundary.
    None,
    /// Partition boundary; the other side lives on `neighbour_rank`.
    ///
    /// Both sides of a processor pair list their faces in the same order and
    /// use the same `tag`.
    Processor { neighbour_rank: usize, tag: u16 },
    /// Cyclic pairing with another patch of this topology.
    Periodic {
        partner: PatchId,
        transform: PatchTransform,
    },
    /// Non-matching pairing with another patch of this topology.
    NonConformal {
        partner: PatchId,
        stencil: Arc<InterpolationStencil>,
    },
}

impl CouplingKind {
    pub fn is_coupled(&self) -> bool {
        !matches!(self, CouplingKind::None)
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            CouplingKind::None => "uncoupled",
            CouplingKind::Processor { .. } => "processor",
            CouplingKind::Periodic { .. } => "periodic",
            CouplingKind::NonConformal { .. } => "nonConformal",
        }
    }

    /// Patch on this rank holding the other side, if the transfer is local.
    pub fn local_partner(&self) -> Option<PatchId> {
        match self {
            CouplingKind::Periodic { partner, .. } | CouplingKind::NonConformal { partner, .. } => {
                Some(*partner)
            }
            _ => None,
        }
    }
}

/// A named, contiguous group of boundary faces.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchDescriptor {
    name: String,
    start_face: usize,
    size: usize,
    coupling: CouplingKind,
}

impl PatchDescriptor {
    pub fn new(name: impl Into<String>, start_face: usize, size: usize, coupling: CouplingKind) -> Self {
        Self {
            name: name.into(),
            start_face,
            size,
            coupling,
        }
    }

    /// Uncoupled (physical) patch.
    pub fn wall(name: impl Into<String>, start_face: usize, size: usize) -> Self {
        Self::new(name, start_face, size, CouplingKind::None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn start_face(&self) -> usize {
        self.start_face
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn faces(&self) -> std::ops::Range<usize> {
        self.start_face..self.start_face + self.size
    }
    pub fn coupling(&self) -> &CouplingKind {
        &self.coupling
    }
    pub fn is_coupled(&self) -> bool {
        self.coupling.is_coupled()
    }
}

/// Immutable face-addressed connectivity for one mesh state.
#[derive(Debug)]
pub struct Topology {
    n_cells: usize,
    /// Owner cell of every face, internal and boundary.
    owner: Vec<usize>,
    /// Neighbour cell of every internal face.
    neighbour: Vec<usize>,
    patches: Vec<PatchDescriptor>,
    addressing: OnceCell<LduAddressing>,
}

/// Validate and assemble a [`Topology`].
///
/// `face_owner` lists the owner of every face (internal faces first);
/// `face_neighbour` lists the neighbour of every internal face, so its length
/// fixes the internal face count.
///
/// # Errors
/// Returns a topology error if a face references an invalid cell, an internal
/// face is degenerate or not owner-ordered, the patch ranges do not partition
/// the boundary faces, or a coupled patch has an inconsistent partner.
pub fn build_topology(
    n_cells: usize,
    face_owner: Vec<usize>,
    face_neighbour: Vec<usize>,
    patches: Vec<PatchDescriptor>,
) -> Result<Topology, FvError> {
    validation::validate_faces(n_cells, &face_owner, &face_neighbour)?;
    validation::validate_patches(face_owner.len(), face_neighbour.len(), &patches)?;
    validation::validate_couplings(&patches)?;
    log::debug!(
        "built topology: {n_cells} cells, {} internal faces, {} patches",
        face_neighbour.len(),
        patches.len()
    );
    Ok(Topology {
        n_cells,
        owner: face_owner,
        neighbour: face_neighbour,
        patches,
        addressing: OnceCell::new(),
    })
}

impl Topology {
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.owner.len()
    }
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }
    #[inline]
    pub fn is_internal(&self, face: usize) -> bool {
        face < self.neighbour.len()
    }

    /// Owner cell of any face.
    #[inline]
    pub fn owner_of(&self, face: usize) -> usize {
        self.owner[face]
    }

    /// Neighbour cell of an internal face.
    ///
    /// # Panics
    /// Panics if `face` is a boundary face; check [`is_internal`](Self::is_internal) first.
    #[inline]
    pub fn neighbour_of(&self, face: usize) -> usize {
        self.neighbour[face]
    }

    #[inline]
    pub fn try_neighbour_of(&self, face: usize) -> Option<usize> {
        self.neighbour.get(face).copied()
    }

    /// Owner addressing restricted to internal faces ("lower" addressing).
    #[inline]
    pub fn lower_addr(&self) -> &[usize] {
        &self.owner[..self.neighbour.len()]
    }

    /// Neighbour addressing of internal faces ("upper" addressing).
    #[inline]
    pub fn upper_addr(&self) -> &[usize] {
        &self.neighbour
    }

    pub fn patches(&self) -> &[PatchDescriptor] {
        &self.patches
    }

    pub fn patch(&self, patch: PatchId) -> &PatchDescriptor {
        &self.patches[patch]
    }

    pub fn find_patch(&self, name: &str) -> Option<PatchId> {
        self.patches.iter().position(|p| p.name() == name)
    }

    /// Cells adjacent to the faces of a patch, in patch face order.
    #[inline]
    pub fn face_cells(&self, patch: PatchId) -> &[usize] {
        let range = self.patches[patch].faces();
        &self.owner[range]
    }

    /// Lazily computed derived addressing.
    pub fn addressing(&self) -> &LduAddressing {
        self.addressing
            .get_or_init(|| LduAddressing::new(self.n_cells, self.lower_addr(), self.upper_addr()))
    }
}
