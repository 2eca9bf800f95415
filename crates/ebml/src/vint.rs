//! EBML primitive codec.
//!
//! Variable-length sizes ("vints"), element IDs, fixed-width big-endian
//! integers and IEEE754 doubles.
//!
//! A vint stores its byte width in the leading byte: a width of `n` bytes is
//! marked by a single set bit followed by `n - 1` zero bits, e.g.
//!
//! ```text
//! 1xxx xxxx                      -> 7 value bits
//! 01xx xxxx  xxxx xxxx           -> 14 value bits
//! 0000 0001  xxxx xxxx ... (x7)  -> 56 value bits
//! ```
//!
//! For every width the value with all value bits set is reserved as the
//! "unknown size" marker and is never written for a real size.

use byteorder::{BigEndian, ByteOrder};
use bytes::BufMut;

use crate::{EbmlError, Result};

/// Maximum width of a size vint in bytes (EBMLMaxSizeLength).
pub const MAX_VINT_WIDTH: usize = 8;

/// Maximum width of an element ID in bytes (EBMLMaxIDLength).
pub const MAX_ID_WIDTH: usize = 4;

/// The one-byte unknown-size marker.
pub const UNKNOWN_SIZE_BYTE: u8 = 0xFF;

/// Largest size that can be written as a known size.
pub const MAX_KNOWN_SIZE: u64 = (1 << 56) - 2;

/// The size field of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSize {
    Known(u64),
    /// All value bits set: the element extends until its parent ends or the
    /// stream ends.
    Unknown,
}

impl ElementSize {
    pub fn known(self) -> Option<u64> {
        match self {
            ElementSize::Known(size) => Some(size),
            ElementSize::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, ElementSize::Unknown)
    }
}

#[inline]
fn reserved_value(width: usize) -> u64 {
    (1u64 << (7 * width)) - 1
}

/// Returns the minimal vint width for `size`, skipping any width whose
/// reserved all-ones value would collide with `size`.
pub fn size_width(size: u64) -> Result<usize> {
    (1..=MAX_VINT_WIDTH)
        .find(|&width| size < reserved_value(width))
        .ok_or(EbmlError::SizeTooLarge(size))
}

/// Append `size` as a minimal-width vint. Returns the number of bytes written.
pub fn put_size<B: BufMut>(buf: &mut B, size: u64) -> Result<usize> {
    let width = size_width(size)?;
    let marked = size | (1u64 << (7 * width));
    buf.put_slice(&marked.to_be_bytes()[MAX_VINT_WIDTH - width..]);
    Ok(width)
}

/// Encode `size` as a minimal-width vint.
pub fn encode_size(size: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_VINT_WIDTH);
    put_size(&mut out, size)?;
    Ok(out)
}

/// Decode a size vint from the start of `data`.
///
/// Returns the size and the number of bytes consumed.
pub fn decode_size(data: &[u8]) -> Result<(ElementSize, usize)> {
    let first = *data.first().ok_or(EbmlError::InsufficientData {
        expected: 1,
        actual: 0,
    })?;
    if first == 0 {
        // Marker would sit beyond the 8th bit
        return Err(EbmlError::MalformedVint(first));
    }

    let width = first.leading_zeros() as usize + 1;
    if data.len() < width {
        return Err(EbmlError::InsufficientData {
            expected: width,
            actual: data.len(),
        });
    }

    let mut value = u64::from(first & (0xFFu16 >> width) as u8);
    for &byte in &data[1..width] {
        value = (value << 8) | u64::from(byte);
    }

    if value == reserved_value(width) {
        Ok((ElementSize::Unknown, width))
    } else {
        Ok((ElementSize::Known(value), width))
    }
}

/// Returns the canonical byte width of an element ID.
///
/// The width is given by the class-marker bit of the leading byte; an ID whose
/// marker does not agree with its significant byte count is rejected.
pub fn id_width(id: u32) -> Result<usize> {
    let width = match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    let leading = (id >> (8 * (width - 1))) as u8;
    if leading.leading_zeros() as usize + 1 != width {
        return Err(EbmlError::InvalidId(id));
    }
    Ok(width)
}

/// Append an element ID as its literal big-endian bytes.
pub fn put_id<B: BufMut>(buf: &mut B, id: u32) -> Result<usize> {
    let width = id_width(id)?;
    buf.put_slice(&id.to_be_bytes()[MAX_ID_WIDTH - width..]);
    Ok(width)
}

pub fn encode_id(id: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_ID_WIDTH);
    put_id(&mut out, id)?;
    Ok(out)
}

/// Decode an element ID (marker bits kept) from the start of `data`.
pub fn decode_id(data: &[u8]) -> Result<(u32, usize)> {
    let first = *data.first().ok_or(EbmlError::InsufficientData {
        expected: 1,
        actual: 0,
    })?;
    let width = first.leading_zeros() as usize + 1;
    if first == 0 || width > MAX_ID_WIDTH {
        return Err(EbmlError::MalformedVint(first));
    }
    if data.len() < width {
        return Err(EbmlError::InsufficientData {
            expected: width,
            actual: data.len(),
        });
    }

    let id = data[..width]
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
    Ok((id, width))
}

/// Smallest of the 1/2/4/8-byte widths that holds `value`.
pub fn uint_width(value: u64) -> usize {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFFFF_FFFF => 4,
        _ => 8,
    }
}

/// Append `value` as a big-endian unsigned integer of exactly `width` bytes.
pub fn put_fixed<B: BufMut>(buf: &mut B, value: u64, width: usize) -> Result<()> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(EbmlError::InvalidWidth(width));
    }
    if width < 8 && value >> (8 * width) != 0 {
        return Err(EbmlError::ValueOutOfRange { value, width });
    }
    buf.put_uint(value, width);
    Ok(())
}

pub fn encode_fixed(value: u64, width: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(width);
    put_fixed(&mut out, value, width)?;
    Ok(out)
}

/// 8-byte IEEE754 big-endian.
pub fn encode_double(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decode a big-endian unsigned integer of 0 to 8 bytes.
pub fn decode_uint(data: &[u8]) -> Result<u64> {
    match data.len() {
        0 => Ok(0),
        len @ 1..=8 => Ok(BigEndian::read_uint(data, len)),
        len => Err(EbmlError::InvalidWidth(len)),
    }
}

/// Decode a 0, 4 or 8 byte big-endian float.
pub fn decode_double(data: &[u8]) -> Result<f64> {
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(f64::from(BigEndian::read_f32(data))),
        8 => Ok(BigEndian::read_f64(data)),
        len => Err(EbmlError::InvalidFloatWidth(len)),
    }
}
