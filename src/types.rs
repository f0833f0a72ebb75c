//! Working precision and the value types a field can carry.
//!
//! All coefficient arithmetic is carried out in [`Scalar`]. The precision is a
//! build-time choice (`single-precision` feature); the engine never mixes
//! precisions inside one build.
//!
//! Field values implement [`FieldValue`], which exposes the per-component view
//! the segregated solver needs and the rotation hook periodic patches use.

use bytemuck::{Pod, Zeroable};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Floating-point type used for every coefficient and field component.
#[cfg(not(feature = "single-precision"))]
pub type Scalar = f64;
/// Floating-point type used for every coefficient and field component.
#[cfg(feature = "single-precision")]
pub type Scalar = f32;

/// Added to residual normalisation factors so all-zero systems stay finite.
#[cfg(not(feature = "single-precision"))]
pub const SMALL: Scalar = 1e-20;
#[cfg(feature = "single-precision")]
pub const SMALL: Scalar = 1e-6;

/// Threshold below which a Krylov inner product is treated as singular.
#[cfg(not(feature = "single-precision"))]
pub const VSMALL: Scalar = 1e-300;
#[cfg(feature = "single-precision")]
pub const VSMALL: Scalar = 1e-37;

/// A value stored per cell or per face: scalar, vector or tensor.
pub trait FieldValue:
    Copy
    + Debug
    + Default
    + PartialEq
    + Pod
    + Send
    + Sync
    + Zero
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<Scalar, Output = Self>
    + AddAssign
    + SubAssign
    + 'static
{
    /// Number of independent components solved for in a segregated solve.
    const N_COMPONENTS: usize;
    /// Short name used in log lines and error messages.
    const TYPE_NAME: &'static str;
    /// Suffix appended to the field name when solving for one component.
    const COMPONENT_NAMES: &'static [&'static str];

    fn component(&self, d: usize) -> Scalar;
    fn set_component(&mut self, d: usize, value: Scalar);

    /// Value with every component equal to `value`.
    fn uniform(value: Scalar) -> Self;

    /// Component-wise product.
    fn cmpt_mul(self, other: Self) -> Self;

    /// Euclidean magnitude over all components.
    fn mag(&self) -> Scalar;

    /// Apply a rotation (`R·v` for vectors, `R·T·Rᵀ` for tensors).
    fn transform(&self, rotation: &Tensor) -> Self;

    /// Diagonal part of the rotation acting on component `d`.
    ///
    /// Segregated solves cannot couple components, so a rotational coupling is
    /// folded into the interface coefficient through this factor.
    fn transform_factor(rotation: &Tensor, d: usize) -> Scalar;
}

impl FieldValue for Scalar {
    const N_COMPONENTS: usize = 1;
    const TYPE_NAME: &'static str = "scalar";
    const COMPONENT_NAMES: &'static [&'static str] = &[""];

    #[inline]
    fn component(&self, _d: usize) -> Scalar {
        *self
    }
    #[inline]
    fn set_component(&mut self, _d: usize, value: Scalar) {
        *self = value;
    }
    #[inline]
    fn uniform(value: Scalar) -> Self {
        value
    }
    #[inline]
    fn cmpt_mul(self, other: Self) -> Self {
        self * other
    }
    #[inline]
    fn mag(&self) -> Scalar {
        self.abs()
    }
    #[inline]
    fn transform(&self, _rotation: &Tensor) -> Self {
        *self
    }
    #[inline]
    fn transform_factor(_rotation: &Tensor, _d: usize) -> Scalar {
        1.0
    }
}

/// Three-component vector.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vector(pub [Scalar; 3]);

/// Nine-component (3×3, row-major) tensor.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Tensor(pub [Scalar; 9]);

macro_rules! impl_array_value {
    ($ty:ident, $n:expr) => {
        impl Add for $ty {
            type Output = $ty;
            #[inline]
            fn add(mut self, rhs: $ty) -> $ty {
                self += rhs;
                self
            }
        }
        impl Sub for $ty {
            type Output = $ty;
            #[inline]
            fn sub(mut self, rhs: $ty) -> $ty {
                self -= rhs;
                self
            }
        }
        impl Neg for $ty {
            type Output = $ty;
            #[inline]
            fn neg(self) -> $ty {
                $ty(self.0.map(|c| -c))
            }
        }
        impl Mul<Scalar> for $ty {
            type Output = $ty;
            #[inline]
            fn mul(self, rhs: Scalar) -> $ty {
                $ty(self.0.map(|c| c * rhs))
            }
        }
        impl AddAssign for $ty {
            #[inline]
            fn add_assign(&mut self, rhs: $ty) {
                for (a, b) in self.0.iter_mut().zip(rhs.0) {
                    *a += b;
                }
            }
        }
        impl SubAssign for $ty {
            #[inline]
            fn sub_assign(&mut self, rhs: $ty) {
                for (a, b) in self.0.iter_mut().zip(rhs.0) {
                    *a -= b;
                }
            }
        }
        impl Zero for $ty {
            #[inline]
            fn zero() -> Self {
                $ty([0.0; $n])
            }
            #[inline]
            fn is_zero(&self) -> bool {
                self.0.iter().all(|c| *c == 0.0)
            }
        }
    };
}

impl_array_value!(Vector, 3);
impl_array_value!(Tensor, 9);

impl Vector {
    pub const fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Vector([x, y, z])
    }
}

impl Tensor {
    pub const IDENTITY: Tensor = Tensor([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    #[inline]
    pub fn at(&self, i: usize, j: usize) -> Scalar {
        self.0[3 * i + j]
    }

    /// Rotation by `angle` radians about the z axis.
    pub fn rotation_z(angle: Scalar) -> Self {
        let (s, c) = angle.sin_cos();
        Tensor([c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn transpose(&self) -> Self {
        let mut out = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                out[3 * j + i] = self.at(i, j);
            }
        }
        Tensor(out)
    }

    pub fn dot(&self, other: &Tensor) -> Tensor {
        let mut out = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                out[3 * i + j] = (0..3).map(|k| self.at(i, k) * other.at(k, j)).sum();
            }
        }
        Tensor(out)
    }

    pub fn dot_vector(&self, v: &Vector) -> Vector {
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (0..3).map(|k| self.at(i, k) * v.0[k]).sum();
        }
        Vector(out)
    }
}

impl FieldValue for Vector {
    const N_COMPONENTS: usize = 3;
    const TYPE_NAME: &'static str = "vector";
    const COMPONENT_NAMES: &'static [&'static str] = &["x", "y", "z"];

    #[inline]
    fn component(&self, d: usize) -> Scalar {
        self.0[d]
    }
    #[inline]
    fn set_component(&mut self, d: usize, value: Scalar) {
        self.0[d] = value;
    }
    #[inline]
    fn uniform(value: Scalar) -> Self {
        Vector([value; 3])
    }
    #[inline]
    fn cmpt_mul(self, other: Self) -> Self {
        Vector([self.0[0] * other.0[0], self.0[1] * other.0[1], self.0[2] * other.0[2]])
    }
    fn mag(&self) -> Scalar {
        self.0.iter().map(|c| c * c).sum::<Scalar>().sqrt()
    }
    fn transform(&self, rotation: &Tensor) -> Self {
        rotation.dot_vector(self)
    }
    fn transform_factor(rotation: &Tensor, d: usize) -> Scalar {
        rotation.at(d, d)
    }
}

impl FieldValue for Tensor {
    const N_COMPONENTS: usize = 9;
    const TYPE_NAME: &'static str = "tensor";
    const COMPONENT_NAMES: &'static [&'static str] = &["xx", "xy", "xz", "yx", "yy", "yz", "zx", "zy", "zz"];

    #[inline]
    fn component(&self, d: usize) -> Scalar {
        self.0[d]
    }
    #[inline]
    fn set_component(&mut self, d: usize, value: Scalar) {
        self.0[d] = value;
    }
    #[inline]
    fn uniform(value: Scalar) -> Self {
        Tensor([value; 9])
    }
    fn cmpt_mul(self, other: Self) -> Self {
        let mut out = self;
        for (a, b) in out.0.iter_mut().zip(other.0) {
            *a *= b;
        }
        out
    }
    fn mag(&self) -> Scalar {
        self.0.iter().map(|c| c * c).sum::<Scalar>().sqrt()
    }
    fn transform(&self, rotation: &Tensor) -> Self {
        rotation.dot(self).dot(&rotation.transpose())
    }
    fn transform_factor(rotation: &Tensor, d: usize) -> Scalar {
        rotation.at(d / 3, d / 3) * rotation.at(d % 3, d % 3)
    }
}
