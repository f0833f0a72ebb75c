//! Scalar LDU system seen by the linear solvers.
//!
//! Rows are cells. Off-diagonal entries live on internal faces: `upper[f]`
//! couples row `lower_addr[f]` to column `upper_addr[f]`, `lower[f]` the
//! transpose position. Coupled patches add interface coefficients acting on
//! the neighbour-side values, which are fetched through [`ParallelOps`] on
//! every product:
//!
//! ```text
//! (A·x)[c] = diag[c]·x[c] + Σ off-diagonal terms − Σ coeff[f]·x_nbr[f]
//! ```

use crate::algs::halo::ParallelOps;
use crate::fv_error::FvError;
use crate::topology::{PatchId, Topology};
use crate::types::{SMALL, Scalar, VSMALL};
use std::borrow::Cow;

/// Coefficients of one coupled patch for one solved component.
#[derive(Clone, Debug)]
pub struct Interface<'a> {
    pub patch: PatchId,
    pub face_cells: &'a [usize],
    pub coeffs: Vec<Scalar>,
}

pub struct LduSystem<'a> {
    topology: &'a Topology,
    diag: Vec<Scalar>,
    upper: Cow<'a, [Scalar]>,
    lower: Cow<'a, [Scalar]>,
    interfaces: Vec<Interface<'a>>,
    ops: &'a dyn ParallelOps,
}

impl<'a> LduSystem<'a> {
    /// # Errors
    /// Array lengths must match the topology.
    pub fn new(
        topology: &'a Topology,
        diag: Vec<Scalar>,
        upper: Cow<'a, [Scalar]>,
        lower: Cow<'a, [Scalar]>,
        interfaces: Vec<Interface<'a>>,
        ops: &'a dyn ParallelOps,
    ) -> Result<Self, FvError> {
        if diag.len() != topology.n_cells() {
            return Err(FvError::size_mismatch("matrix diagonal", topology.n_cells(), diag.len()));
        }
        for (what, arr) in [("matrix upper", &upper), ("matrix lower", &lower)] {
            if arr.len() != topology.n_internal_faces() {
                return Err(FvError::size_mismatch(what, topology.n_internal_faces(), arr.len()));
            }
        }
        for i in &interfaces {
            if i.coeffs.len() != i.face_cells.len() {
                return Err(FvError::size_mismatch(
                    format!("interface coefficients of patch '{}'", topology.patch(i.patch).name()),
                    i.face_cells.len(),
                    i.coeffs.len(),
                ));
            }
        }
        Ok(Self {
            topology,
            diag,
            upper,
            lower,
            interfaces,
            ops,
        })
    }

    pub fn n_cells(&self) -> usize {
        self.diag.len()
    }
    pub fn topology(&self) -> &Topology {
        self.topology
    }
    pub fn diag(&self) -> &[Scalar] {
        &self.diag
    }
    pub fn upper(&self) -> &[Scalar] {
        &self.upper
    }
    pub fn lower(&self) -> &[Scalar] {
        &self.lower
    }
    pub fn interfaces(&self) -> &[Interface<'a>] {
        &self.interfaces
    }
    pub fn ops(&self) -> &dyn ParallelOps {
        self.ops
    }

    /// Neighbour-side values of `x` on every interface, in interface order.
    pub fn interface_values(&self, x: &[Scalar]) -> Result<Vec<Vec<Scalar>>, FvError> {
        if self.interfaces.is_empty() {
            return Ok(Vec::new());
        }
        let staged: Vec<(PatchId, Vec<Scalar>)> = self
            .interfaces
            .iter()
            .map(|i| (i.patch, i.face_cells.iter().map(|&c| x[c]).collect()))
            .collect();
        self.ops.swap_patch_values(&staged)
    }

    /// `out = A·x`.
    pub fn amul(&self, x: &[Scalar], out: &mut [Scalar]) -> Result<(), FvError> {
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            out.par_iter_mut()
                .zip(x.par_iter().zip(self.diag.par_iter()))
                .for_each(|(o, (xi, d))| *o = d * xi);
        }
        #[cfg(not(feature = "rayon"))]
        for ((o, xi), d) in out.iter_mut().zip(x).zip(&self.diag) {
            *o = d * xi;
        }

        let l = self.topology.lower_addr();
        let u = self.topology.upper_addr();
        for f in 0..l.len() {
            out[u[f]] += self.lower[f] * x[l[f]];
            out[l[f]] += self.upper[f] * x[u[f]];
        }

        let nbr = self.interface_values(x)?;
        for (i, values) in self.interfaces.iter().zip(&nbr) {
            for ((&c, coeff), v) in i.face_cells.iter().zip(&i.coeffs).zip(values) {
                out[c] -= coeff * v;
            }
        }
        Ok(())
    }

    /// Row sums of `A`, interfaces included.
    pub fn sum_a(&self) -> Vec<Scalar> {
        let mut out = self.diag.clone();
        let l = self.topology.lower_addr();
        let u = self.topology.upper_addr();
        for f in 0..l.len() {
            out[l[f]] += self.upper[f];
            out[u[f]] += self.lower[f];
        }
        for i in &self.interfaces {
            for (&c, coeff) in i.face_cells.iter().zip(&i.coeffs) {
                out[c] -= coeff;
            }
        }
        out
    }

    /// `out = b − A·x`.
    pub fn residual(&self, x: &[Scalar], b: &[Scalar], out: &mut [Scalar]) -> Result<(), FvError> {
        self.amul(x, out)?;
        for (r, bi) in out.iter_mut().zip(b) {
            *r = bi - *r;
        }
        Ok(())
    }

    /// Normalisation factor making residuals comparable across problems:
    /// `Σ(|A·x − A·x̄| + |b − A·x̄|) + SMALL`, with `x̄` the global mean of `x`.
    pub fn norm_factor(&self, x: &[Scalar], b: &[Scalar], ax: &[Scalar]) -> Result<Scalar, FvError> {
        let n_total = self.ops.sum(x.len() as Scalar)?;
        let x_ref = if n_total > 0.0 {
            self.ops.sum(x.iter().sum())? / n_total
        } else {
            0.0
        };
        let sum_a = self.sum_a();
        let local: Scalar = sum_a
            .iter()
            .zip(ax)
            .zip(b)
            .map(|((sa, axi), bi)| {
                let a_ref = sa * x_ref;
                (axi - a_ref).abs() + (bi - a_ref).abs()
            })
            .sum();
        Ok(self.ops.sum(local)? + SMALL)
    }

    /// Global number of rows whose diagonal is too small to divide by.
    pub fn count_singular_rows(&self) -> Result<usize, FvError> {
        let local = self.diag.iter().filter(|d| is_singular_pivot(**d)).count();
        Ok(self.ops.sum(local as Scalar)? as usize)
    }

    pub fn g_sum_mag(&self, v: &[Scalar]) -> Result<Scalar, FvError> {
        self.ops.sum(v.iter().map(|x| x.abs()).sum())
    }

    pub fn g_sum_prod(&self, a: &[Scalar], b: &[Scalar]) -> Result<Scalar, FvError> {
        self.ops.sum(a.iter().zip(b).map(|(x, y)| x * y).sum())
    }

    pub fn g_sum_sqr(&self, v: &[Scalar]) -> Result<Scalar, FvError> {
        self.ops.sum(v.iter().map(|x| x * x).sum())
    }
}

/// A diagonal entry the solvers refuse to divide by.
#[inline]
pub fn is_singular_pivot(d: Scalar) -> bool {
    d.abs() <= VSMALL
}
