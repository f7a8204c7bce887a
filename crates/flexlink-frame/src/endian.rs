//! Big-endian conversion between byte sequences and fixed-width numbers.
//!
//! Every numeric field in a frame, header and payload alike, is big-endian.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width numeric type that can be carried in a frame.
pub trait Scalar: Copy + sealed::Sealed {
    /// Encoded width in bytes.
    const WIDTH: usize;
    /// Short type name used in diagnostic traces.
    const NAME: &'static str;

    /// Append the big-endian encoding of `self`.
    fn put_be(self, dst: &mut BytesMut);

    /// Decode from the first `WIDTH` bytes of `src`, or `None` if it is too short.
    fn from_be_slice(src: &[u8]) -> Option<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Scalar for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            const NAME: &'static str = stringify!($ty);

            #[inline]
            fn put_be(self, dst: &mut BytesMut) {
                dst.put_slice(&self.to_be_bytes());
            }

            #[inline]
            fn from_be_slice(src: &[u8]) -> Option<Self> {
                let raw = src.get(..Self::WIDTH)?;
                Some(<$ty>::from_be_bytes(raw.try_into().ok()?))
            }
        }
    )*};
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Decode a big-endian value from the front of `src`.
pub fn read_be<T: Scalar>(src: &[u8]) -> Result<T> {
    T::from_be_slice(src).ok_or(FrameError::CodecRange {
        requested: T::WIDTH,
        remaining: src.len(),
    })
}

/// Decode a big-endian value at `offset` within `src`.
pub fn read_be_at<T: Scalar>(src: &[u8], offset: usize) -> Result<T> {
    let tail = src.get(offset..).ok_or(FrameError::CodecRange {
        requested: offset.saturating_add(T::WIDTH),
        remaining: src.len(),
    })?;
    read_be(tail)
}

/// Append the big-endian encoding of `value` to `dst`.
pub fn write_be<T: Scalar>(value: T, dst: &mut BytesMut) {
    value.put_be(dst);
}
