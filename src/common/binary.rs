//! Little-endian field readers shared by the record and string codecs.
//!
//! Every BIFF field is little-endian. These helpers bounds-check the slice
//! before handing the bytes to `zerocopy`, so a short payload surfaces as a
//! [`BinaryError`] instead of a panic.

use thiserror::Error;
use zerocopy::{F64, FromBytes, LE, U16, U32};

/// Failure to read a fixed-width field out of a payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinaryError {
    /// The field ends past the end of the slice
    #[error("field needs {expected} bytes, slice has {available}")]
    InsufficientData { expected: usize, available: usize },
    /// The bytes could not be reinterpreted as the field type
    #[error("cannot read {0} field")]
    ParseError(&'static str),
}

pub type BinaryResult<T> = Result<T, BinaryError>;

/// The `width` bytes starting at `offset`.
#[inline]
fn field(data: &[u8], offset: usize, width: usize) -> BinaryResult<&[u8]> {
    let short = || BinaryError::InsufficientData {
        expected: offset.saturating_add(width),
        available: data.len(),
    };
    let end = offset.checked_add(width).ok_or_else(short)?;
    data.get(offset..end).ok_or_else(short)
}

#[inline]
fn read_le<T: FromBytes>(data: &[u8], offset: usize, name: &'static str) -> BinaryResult<T> {
    T::read_from_bytes(field(data, offset, size_of::<T>())?)
        .map_err(|_| BinaryError::ParseError(name))
}

/// `u16` at `offset`.
///
/// # Examples
///
/// ```
/// use loquat::common::binary::read_u16_le;
///
/// let payload = [0x09, 0x08, 0x00, 0x06];
/// assert_eq!(read_u16_le(&payload, 0).unwrap(), 0x0809);
/// assert_eq!(read_u16_le(&payload, 2).unwrap(), 0x0600);
/// assert!(read_u16_le(&payload, 3).is_err());
/// ```
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> BinaryResult<u16> {
    read_le::<U16<LE>>(data, offset, "u16").map(|v| v.get())
}

/// `u32` at `offset`.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> BinaryResult<u32> {
    read_le::<U32<LE>>(data, offset, "u32").map(|v| v.get())
}

/// IEEE 754 double at `offset`, as stored in NUMBER records.
#[inline]
pub fn read_f64_le(data: &[u8], offset: usize) -> BinaryResult<f64> {
    read_le::<F64<LE>>(data, offset, "f64").map(|v| v.get())
}

#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> BinaryResult<u8> {
    field(data, offset, 1).map(|b| b[0])
}
