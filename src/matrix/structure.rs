//! Off-diagonal storage and the structure classes used for solver dispatch.

use crate::types::Scalar;

/// Shape of an assembled operator, as far as solver selection cares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructureClass {
    /// No off-diagonal and no interface coefficients.
    DiagonalOnly,
    /// `upper == lower` on every internal face.
    Symmetric,
    Asymmetric,
}

impl StructureClass {
    pub(crate) fn solver_family(self) -> &'static str {
        match self {
            StructureClass::DiagonalOnly => "diagonal matrix solver",
            StructureClass::Symmetric => "symmetric matrix solver",
            StructureClass::Asymmetric => "asymmetric matrix solver",
        }
    }

    pub(crate) fn rank(self) -> Scalar {
        match self {
            StructureClass::DiagonalOnly => 0.0,
            StructureClass::Symmetric => 1.0,
            StructureClass::Asymmetric => 2.0,
        }
    }

    pub(crate) fn from_rank(rank: Scalar) -> Self {
        if rank >= 2.0 {
            StructureClass::Asymmetric
        } else if rank >= 1.0 {
            StructureClass::Symmetric
        } else {
            StructureClass::DiagonalOnly
        }
    }
}

/// Internal-face coefficients. A symmetric operator keeps one array.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OffDiagonal {
    #[default]
    None,
    Symmetric(Vec<Scalar>),
    Asymmetric { upper: Vec<Scalar>, lower: Vec<Scalar> },
}

fn axpy(a: &mut [Scalar], b: &[Scalar], s: Scalar) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += s * y;
    }
}

fn scaled(b: &[Scalar], s: Scalar) -> Vec<Scalar> {
    b.iter().map(|y| s * y).collect()
}

impl OffDiagonal {
    pub fn upper(&self) -> Option<&[Scalar]> {
        match self {
            OffDiagonal::None => None,
            OffDiagonal::Symmetric(u) => Some(u),
            OffDiagonal::Asymmetric { upper, .. } => Some(upper),
        }
    }

    pub fn lower(&self) -> Option<&[Scalar]> {
        match self {
            OffDiagonal::None => None,
            OffDiagonal::Symmetric(u) => Some(u),
            OffDiagonal::Asymmetric { lower, .. } => Some(lower),
        }
    }

    /// Upper coefficients; a symmetric operator stays symmetric.
    pub fn upper_mut(&mut self, n_faces: usize) -> &mut [Scalar] {
        if let OffDiagonal::None = self {
            *self = OffDiagonal::Symmetric(vec![0.0; n_faces]);
        }
        match self {
            OffDiagonal::Symmetric(u) => u,
            OffDiagonal::Asymmetric { upper, .. } => upper,
            OffDiagonal::None => &mut [],
        }
    }

    /// Lower coefficients; converts to asymmetric storage.
    pub fn lower_mut(&mut self, n_faces: usize) -> &mut [Scalar] {
        let current = std::mem::take(self);
        *self = match current {
            OffDiagonal::None => OffDiagonal::Asymmetric {
                upper: vec![0.0; n_faces],
                lower: vec![0.0; n_faces],
            },
            OffDiagonal::Symmetric(u) => OffDiagonal::Asymmetric {
                lower: u.clone(),
                upper: u,
            },
            asym => asym,
        };
        match self {
            OffDiagonal::Asymmetric { lower, .. } => lower,
            _ => &mut [],
        }
    }

    /// `self += s·other`.
    pub fn combine(&mut self, other: &OffDiagonal, s: Scalar) {
        *self = match (std::mem::take(self), other) {
            (this, OffDiagonal::None) => this,
            (OffDiagonal::None, OffDiagonal::Symmetric(b)) => OffDiagonal::Symmetric(scaled(b, s)),
            (OffDiagonal::None, OffDiagonal::Asymmetric { upper, lower }) => OffDiagonal::Asymmetric {
                upper: scaled(upper, s),
                lower: scaled(lower, s),
            },
            (OffDiagonal::Symmetric(mut a), OffDiagonal::Symmetric(b)) => {
                axpy(&mut a, b, s);
                OffDiagonal::Symmetric(a)
            }
            (OffDiagonal::Symmetric(a), OffDiagonal::Asymmetric { upper, lower }) => {
                let mut u = a.clone();
                let mut l = a;
                axpy(&mut u, upper, s);
                axpy(&mut l, lower, s);
                OffDiagonal::Asymmetric { upper: u, lower: l }
            }
            (OffDiagonal::Asymmetric { mut upper, mut lower }, OffDiagonal::Symmetric(b)) => {
                axpy(&mut upper, b, s);
                axpy(&mut lower, b, s);
                OffDiagonal::Asymmetric { upper, lower }
            }
            (
                OffDiagonal::Asymmetric { mut upper, mut lower },
                OffDiagonal::Asymmetric { upper: bu, lower: bl },
            ) => {
                axpy(&mut upper, bu, s);
                axpy(&mut lower, bl, s);
                OffDiagonal::Asymmetric { upper, lower }
            }
        };
    }

    pub fn negate(&mut self) {
        match self {
            OffDiagonal::None => {}
            OffDiagonal::Symmetric(u) => u.iter_mut().for_each(|x| *x = -*x),
            OffDiagonal::Asymmetric { upper, lower } => {
                upper.iter_mut().chain(lower.iter_mut()).for_each(|x| *x = -*x)
            }
        }
    }

    /// Class of the internal-face part alone.
    pub fn class(&self) -> StructureClass {
        match self {
            OffDiagonal::None => StructureClass::DiagonalOnly,
            OffDiagonal::Symmetric(u) => {
                if u.iter().all(|x| *x == 0.0) {
                    StructureClass::DiagonalOnly
                } else {
                    StructureClass::Symmetric
                }
            }
            OffDiagonal::Asymmetric { upper, lower } => {
                if upper != lower {
                    StructureClass::Asymmetric
                } else if upper.iter().all(|x| *x == 0.0) {
                    StructureClass::DiagonalOnly
                } else {
                    StructureClass::Symmetric
                }
            }
        }
    }
}
