//! Typed materialization of raw plane buffers

use crate::error::{LifError, Result};
use ndarray::{Array2, Array5};
use num_traits::Zero;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// A little-endian pixel sample type a raw LIF buffer can be read as.
///
/// Implemented for the unsigned widths the format declares (8 to 64 bit);
/// the caller picks the type matching the descriptor's byte depth.
pub trait LePixel: Copy + Zero + sealed::Sealed {
    /// Sample width in bytes
    const BYTES: usize;

    /// Decode one sample from a little-endian byte group
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_le_pixel {
    ($($ty:ty),*) => {
        $(impl LePixel for $ty {
            const BYTES: usize = std::mem::size_of::<$ty>();

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        })*
    };
}

impl_le_pixel!(u8, u16, u32, u64);

/// Decode a raw little-endian buffer into typed samples
pub fn bytes_to_samples<T: LePixel>(bytes: &[u8]) -> Result<Vec<T>> {
    if bytes.len() % T::BYTES != 0 {
        return Err(LifError::InvalidFormat(format!(
            "buffer of {} bytes is not a whole number of {}-byte samples",
            bytes.len(),
            T::BYTES
        )));
    }
    Ok(bytes.chunks_exact(T::BYTES).map(T::from_le_slice).collect())
}

/// Materialize one 2-D plane buffer as a typed `height x width` array
pub fn plane_to_array<T: LePixel>(bytes: &[u8], height: usize, width: usize) -> Result<Array2<T>> {
    let expected = height * width * T::BYTES;
    if bytes.len() != expected {
        return Err(LifError::InvalidFormat(format!(
            "plane buffer is {} bytes, expected {expected} for {height}x{width} samples",
            bytes.len()
        )));
    }
    let samples = bytes_to_samples(bytes)?;
    Array2::from_shape_vec((height, width), samples)
        .map_err(|e| LifError::InvalidFormat(e.to_string()))
}

/// Materialize a tile stack buffer as a typed C x Z x T x Y x X array
pub fn stack_to_array<T: LePixel>(
    bytes: &[u8],
    dims: [usize; 5],
) -> Result<Array5<T>> {
    let expected: usize = dims.iter().product::<usize>() * T::BYTES;
    if bytes.len() != expected {
        return Err(LifError::InvalidFormat(format!(
            "stack buffer is {} bytes, expected {expected} for dims {dims:?}",
            bytes.len()
        )));
    }
    let samples = bytes_to_samples(bytes)?;
    Array5::from_shape_vec(dims, samples).map_err(|e| LifError::InvalidFormat(e.to_string()))
}

/// A zero-filled plane of the given shape, matching what truncated blocks
/// read as
pub fn zero_plane<T: LePixel>(height: usize, width: usize) -> Array2<T> {
    Array2::zeros((height, width))
}
