//! Fixed, versioned, little-endian wire records for halo traffic.
//!
//! A halo message is one [`HaloHdr`] followed by `n_faces * n_components`
//! scalars, each encoded little-endian.

use crate::fv_error::FvError;
use crate::types::{FieldValue, Scalar};
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

const SCALAR_BYTES: usize = size_of::<Scalar>();

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct HaloHdr {
    pub version_le: u16,
    pub n_components_le: u16,
    pub n_faces_le: u32,
    pub epoch_le: u64,
}

static_assertions::const_assert_eq!(size_of::<HaloHdr>(), 16);

impl HaloHdr {
    pub fn new(n_faces: usize, n_components: usize, epoch: u64) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            n_components_le: (n_components as u16).to_le(),
            n_faces_le: (n_faces as u32).to_le(),
            epoch_le: epoch.to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn n_components(&self) -> usize {
        u16::from_le(self.n_components_le) as usize
    }
    pub fn n_faces(&self) -> usize {
        u32::from_le(self.n_faces_le) as usize
    }
    pub fn epoch(&self) -> u64 {
        u64::from_le(self.epoch_le)
    }
}

/// Total encoded size of a message carrying `n_faces` values of `T`.
pub fn message_len<T: FieldValue>(n_faces: usize) -> usize {
    size_of::<HaloHdr>() + n_faces * T::N_COMPONENTS * SCALAR_BYTES
}

pub fn encode_values<T: FieldValue>(values: &[T], epoch: u64) -> Vec<u8> {
    let hdr = HaloHdr::new(values.len(), T::N_COMPONENTS, epoch);
    let mut out = Vec::with_capacity(message_len::<T>(values.len()));
    out.extend_from_slice(bytemuck::bytes_of(&hdr));
    for v in values {
        for d in 0..T::N_COMPONENTS {
            out.extend_from_slice(&v.component(d).to_le_bytes());
        }
    }
    out
}

/// Decode a halo message, checking version, value type, face count and epoch.
pub fn decode_values<T: FieldValue>(
    data: &[u8],
    expected_faces: usize,
    epoch: u64,
    peer: usize,
) -> Result<Vec<T>, FvError> {
    let bad = |reason: String| FvError::CommError { neighbor: peer, reason };
    if data.len() < size_of::<HaloHdr>() {
        return Err(bad(format!("halo message of {} bytes is shorter than its header", data.len())));
    }
    let hdr: HaloHdr = bytemuck::pod_read_unaligned(&data[..size_of::<HaloHdr>()]);
    if hdr.version() != WIRE_VERSION {
        return Err(bad(format!("wire version {} (expected {WIRE_VERSION})", hdr.version())));
    }
    if hdr.n_components() != T::N_COMPONENTS {
        return Err(bad(format!(
            "received {} components per value, expected {} ({})",
            hdr.n_components(),
            T::N_COMPONENTS,
            T::TYPE_NAME
        )));
    }
    if hdr.n_faces() != expected_faces {
        return Err(FvError::size_mismatch(
            format!("halo values from rank {peer}"),
            expected_faces,
            hdr.n_faces(),
        ));
    }
    if hdr.epoch() != epoch {
        return Err(bad(format!("message belongs to epoch {}, expected {epoch}", hdr.epoch())));
    }
    let payload = &data[size_of::<HaloHdr>()..];
    if payload.len() != expected_faces * T::N_COMPONENTS * SCALAR_BYTES {
        return Err(bad(format!("payload of {} bytes does not match header", payload.len())));
    }
    let mut scalars = payload.chunks_exact(SCALAR_BYTES).map(|c| {
        let mut b = [0u8; SCALAR_BYTES];
        b.copy_from_slice(c);
        Scalar::from_le_bytes(b)
    });
    let mut out = vec![T::default(); expected_faces];
    for v in out.iter_mut() {
        for d in 0..T::N_COMPONENTS {
            v.set_component(d, scalars.next().unwrap_or_default());
        }
    }
    Ok(out)
}
