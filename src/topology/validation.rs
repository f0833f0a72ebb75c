//! Construction-time checks for [`Topology`](super::Topology).
//!
//! Every check here is fatal: a topology that fails validation is never built.

use super::{CouplingKind, PatchDescriptor};
use crate::fv_error::FvError;
use hashbrown::HashMap;

/// Every face names valid cells; internal faces are non-degenerate and
/// owner-ordered.
pub fn validate_faces(n_cells: usize, owner: &[usize], neighbour: &[usize]) -> Result<(), FvError> {
    if neighbour.len() > owner.len() {
        return Err(FvError::size_mismatch(
            "face owner list (must cover every internal face)",
            neighbour.len(),
            owner.len(),
        ));
    }
    for (face, &cell) in owner.iter().enumerate() {
        if cell >= n_cells {
            return Err(FvError::InvalidCellIndex { face, cell, n_cells });
        }
    }
    for (face, (&o, &n)) in owner.iter().zip(neighbour).enumerate() {
        if n >= n_cells {
            return Err(FvError::InvalidCellIndex {
                face,
                cell: n,
                n_cells,
            });
        }
        if o >= n {
            return Err(FvError::FaceOrdering {
                face,
                owner: o,
                neighbour: n,
            });
        }
    }
    Ok(())
}

/// Patch ranges start after the internal faces, are contiguous and disjoint,
/// and cover every boundary face.
pub fn validate_patches(
    n_faces: usize,
    n_internal: usize,
    patches: &[PatchDescriptor],
) -> Result<(), FvError> {
    let mut next = n_internal;
    for p in patches {
        if p.start_face() != next {
            return Err(FvError::PatchRange {
                patch: p.name().to_string(),
                reason: format!("starts at face {} but the next unassigned face is {next}", p.start_face()),
            });
        }
        next += p.size();
    }
    if next != n_faces {
        let patch = patches.last().map(|p| p.name().to_string()).unwrap_or_else(|| "<none>".into());
        return Err(FvError::PatchRange {
            patch,
            reason: format!("ranges end at face {next} but the mesh has {n_faces} faces"),
        });
    }
    let mut names: Vec<&str> = patches.iter().map(|p| p.name()).collect();
    names.sort_unstable();
    if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(FvError::PatchRange {
            patch: w[0].to_string(),
            reason: "is declared more than once".into(),
        });
    }
    Ok(())
}

/// Local coupling partners exist, reciprocate and agree on size; stencils stay
/// in range. Processor patches have distinct `(neighbour_rank, tag)` pairs.
pub fn validate_couplings(patches: &[PatchDescriptor]) -> Result<(), FvError> {
    let err = |p: &PatchDescriptor, reason: String| FvError::CouplingPartner {
        patch: p.name().to_string(),
        reason,
    };
    let mut channels: HashMap<(usize, u16), &str> = HashMap::new();
    for p in patches {
        if let CouplingKind::Processor { neighbour_rank, tag } = *p.coupling() {
            if let Some(first) = channels.insert((neighbour_rank, tag), p.name()) {
                return Err(err(
                    p,
                    format!("reuses rank {neighbour_rank} tag {tag} already taken by '{first}'"),
                ));
            }
        }
    }
    for (id, p) in patches.iter().enumerate() {
        let Some(partner) = p.coupling().local_partner() else {
            continue;
        };
        let Some(other) = patches.get(partner) else {
            return Err(err(p, format!("names partner patch {partner}, which does not exist")));
        };
        if partner == id {
            return Err(err(p, "is paired with itself".into()));
        }
        if other.coupling().local_partner() != Some(id)
            || std::mem::discriminant(other.coupling()) != std::mem::discriminant(p.coupling())
        {
            return Err(err(p, format!("is not reciprocated by partner '{}'", other.name())));
        }
        match p.coupling() {
            CouplingKind::Periodic { .. } if other.size() != p.size() => {
                return Err(err(
                    p,
                    format!("has {} faces but partner '{}' has {}", p.size(), other.name(), other.size()),
                ));
            }
            CouplingKind::NonConformal { stencil, .. } => {
                if stencil.len() != p.size() {
                    return Err(err(
                        p,
                        format!("stencil covers {} faces, patch has {}", stencil.len(), p.size()),
                    ));
                }
                if let Some(&(bad, _)) = stencil.iter().flatten().find(|(f, _)| *f >= other.size()) {
                    return Err(err(
                        p,
                        format!("stencil references face {bad} of partner '{}' (size {})", other.name(), other.size()),
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::PatchTransform;
    use std::sync::Arc;

    #[test]
    fn degenerate_face_is_rejected() {
        let err = validate_faces(3, &[1, 0], &[1]).unwrap_err();
        assert!(matches!(err, FvError::FaceOrdering { face: 0, .. }));
    }

    #[test]
    fn unreciprocated_periodic_partner_is_rejected() {
        let patches = vec![
            PatchDescriptor::new(
                "a",
                0,
                1,
                CouplingKind::Periodic {
                    partner: 1,
                    transform: PatchTransform::Translational,
                },
            ),
            PatchDescriptor::wall("b", 1, 1),
        ];
        assert!(matches!(
            validate_couplings(&patches),
            Err(FvError::CouplingPartner { .. })
        ));
    }

    #[test]
    fn stencil_out_of_range_is_rejected() {
        let a = CouplingKind::NonConformal {
            partner: 1,
            stencil: Arc::new(vec![vec![(3, 1.0)]]),
        };
        let b = CouplingKind::NonConformal {
            partner: 0,
            stencil: Arc::new(vec![vec![(0, 1.0)], vec![(0, 1.0)]]),
        };
        let patches = vec![PatchDescriptor::new("a", 0, 1, a), PatchDescriptor::new("b", 1, 2, b)];
        let err = validate_couplings(&patches).unwrap_err();
        assert!(err.to_string().contains("stencil references face 3"));
    }

    #[test]
    fn processor_channels_must_be_distinct() {
        let processor = |name, start, neighbour_rank, tag| {
            PatchDescriptor::new(name, start, 1, CouplingKind::Processor { neighbour_rank, tag })
        };
        let ok = vec![processor("p0", 0, 1, 7), processor("p1", 1, 1, 8), processor("p2", 2, 2, 7)];
        validate_couplings(&ok).unwrap();

        let clash = vec![processor("p0", 0, 1, 7), processor("p1", 1, 1, 7)];
        let err = validate_couplings(&clash).unwrap_err();
        assert_eq!(err.kind(), crate::fv_error::ErrorKind::Topology);
        assert!(err.to_string().contains("'p1' reuses rank 1 tag 7 already taken by 'p0'"), "{err}");
    }

    #[test]
    fn duplicate_patch_names_are_rejected() {
        let patches = vec![PatchDescriptor::wall("w", 1, 1), PatchDescriptor::wall("w", 2, 1)];
        assert!(validate_patches(3, 1, &patches).is_err());
    }
}
