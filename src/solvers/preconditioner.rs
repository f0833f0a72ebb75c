//! Preconditioners for the Krylov solvers.
//!
//! - `none`: identity.
//! - `diagonal`: Jacobi, `w = r / diag`.
//! - `DIC`: diagonal incomplete Cholesky, symmetric matrices only.
//! - `DILU`: diagonal incomplete LU; reduces to DIC on symmetric matrices.
//!
//! Only the diagonal of the factorisation is stored; the sweeps reuse the
//! matrix off-diagonals. Interfaces do not take part (block-Jacobi across
//! partitions). A singular pivot gets a zero reciprocal, so its row of `w`
//! stays zero.

use super::StructureClass;
use super::system::{LduSystem, is_singular_pivot};
use crate::fv_error::FvError;
use crate::types::Scalar;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PreconditionerKind {
    None,
    Diagonal,
    Dic,
    Dilu,
}

impl PreconditionerKind {
    pub const SYMMETRIC: &'static [&'static str] = &["DIC", "DILU", "diagonal", "none"];
    pub const ASYMMETRIC: &'static [&'static str] = &["DILU", "diagonal", "none"];

    /// # Errors
    /// `UnknownName` listing the preconditioners valid for `class`.
    pub fn parse(name: &str, class: StructureClass) -> Result<Self, FvError> {
        let kind = match name {
            "none" => Some(PreconditionerKind::None),
            "diagonal" => Some(PreconditionerKind::Diagonal),
            "DIC" if class != StructureClass::Asymmetric => Some(PreconditionerKind::Dic),
            "DILU" => Some(PreconditionerKind::Dilu),
            _ => None,
        };
        kind.ok_or_else(|| {
            let (family, valid) = match class {
                StructureClass::Asymmetric => ("asymmetric matrix preconditioner", Self::ASYMMETRIC),
                _ => ("symmetric matrix preconditioner", Self::SYMMETRIC),
            };
            FvError::UnknownName {
                family,
                name: name.to_string(),
                context: String::new(),
                valid: valid.iter().map(|s| s.to_string()).collect(),
            }
        })
    }
}

fn reciprocal(d: Scalar) -> Scalar {
    if is_singular_pivot(d) { 0.0 } else { 1.0 / d }
}

/// A preconditioner bound to one system.
pub struct Preconditioner<'s, 'a> {
    kind: PreconditionerKind,
    system: &'s LduSystem<'a>,
    r_d: Vec<Scalar>,
}

impl<'s, 'a> Preconditioner<'s, 'a> {
    pub fn new(kind: PreconditionerKind, system: &'s LduSystem<'a>) -> Self {
        let r_d = match kind {
            PreconditionerKind::None => Vec::new(),
            PreconditionerKind::Diagonal => system.diag().iter().map(|&d| reciprocal(d)).collect(),
            PreconditionerKind::Dic => Self::reciprocal_d(system, system.upper()),
            PreconditionerKind::Dilu => Self::reciprocal_d(system, system.lower()),
        };
        Self { kind, system, r_d }
    }

    /// Reciprocal of the factorised diagonal:
    /// `rD[u] -= upper·lower / rD[l]` in neighbour order, then `1/rD`.
    fn reciprocal_d(system: &LduSystem<'_>, lower: &[Scalar]) -> Vec<Scalar> {
        let mut r_d = system.diag().to_vec();
        let l = system.topology().lower_addr();
        let u = system.topology().upper_addr();
        let upper = system.upper();
        for &f in system.topology().addressing().losort() {
            if !is_singular_pivot(r_d[l[f]]) {
                r_d[u[f]] -= upper[f] * lower[f] / r_d[l[f]];
            }
        }
        for d in &mut r_d {
            *d = reciprocal(*d);
        }
        r_d
    }

    /// `w = M⁻¹ r`.
    pub fn precondition(&self, w: &mut [Scalar], r: &[Scalar]) {
        match self.kind {
            PreconditionerKind::None => w.copy_from_slice(r),
            PreconditionerKind::Diagonal => {
                for ((wi, ri), d) in w.iter_mut().zip(r).zip(&self.r_d) {
                    *wi = ri * d;
                }
            }
            PreconditionerKind::Dic => self.sweep(w, r, self.system.upper()),
            PreconditionerKind::Dilu => self.sweep(w, r, self.system.lower()),
        }
    }

    fn sweep(&self, w: &mut [Scalar], r: &[Scalar], lower: &[Scalar]) {
        let topo = self.system.topology();
        let l = topo.lower_addr();
        let u = topo.upper_addr();
        let upper = self.system.upper();
        let r_d = &self.r_d;
        for ((wi, ri), d) in w.iter_mut().zip(r).zip(r_d) {
            *wi = ri * d;
        }
        for &f in topo.addressing().losort() {
            w[u[f]] -= r_d[u[f]] * lower[f] * w[l[f]];
        }
        for &f in topo.addressing().owner_sort().iter().rev() {
            w[l[f]] -= r_d[l[f]] * upper[f] * w[u[f]];
        }
    }
}
