//! EBML element builder.
//!
//! Elements are described as a small tree of tagged values and serialized by a
//! single writer, instead of assembling byte arrays field by field.

use bytes::{BufMut, Bytes, BytesMut};

use crate::Result;
use crate::vint::{self, UNKNOWN_SIZE_BYTE};

/// Value carried by an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Big-endian unsigned integer, written in 1, 2, 4 or 8 bytes.
    UnsignedInt(u64),
    /// UTF-8 string, written without a terminator.
    Text(String),
    /// Opaque bytes.
    Binary(Bytes),
    /// 8-byte IEEE754 double.
    Float(f64),
    /// Nested child elements.
    Master(Vec<Element>),
}

/// An element with a known-size payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: u32,
    pub value: ElementValue,
}

impl Element {
    pub fn new(id: u32, value: ElementValue) -> Self {
        Self { id, value }
    }

    pub fn uint(id: u32, value: u64) -> Self {
        Self::new(id, ElementValue::UnsignedInt(value))
    }

    pub fn text(id: u32, value: impl Into<String>) -> Self {
        Self::new(id, ElementValue::Text(value.into()))
    }

    pub fn binary(id: u32, value: impl Into<Bytes>) -> Self {
        Self::new(id, ElementValue::Binary(value.into()))
    }

    pub fn float(id: u32, value: f64) -> Self {
        Self::new(id, ElementValue::Float(value))
    }

    pub fn master(id: u32, children: Vec<Element>) -> Self {
        Self::new(id, ElementValue::Master(children))
    }

    /// Number of payload bytes, excluding the ID and size fields.
    pub fn payload_len(&self) -> Result<u64> {
        Ok(match &self.value {
            ElementValue::UnsignedInt(value) => vint::uint_width(*value) as u64,
            ElementValue::Text(text) => text.len() as u64,
            ElementValue::Binary(data) => data.len() as u64,
            ElementValue::Float(_) => 8,
            ElementValue::Master(children) => children
                .iter()
                .map(Element::encoded_len)
                .sum::<Result<u64>>()?,
        })
    }

    /// Number of bytes the fully serialized element occupies.
    pub fn encoded_len(&self) -> Result<u64> {
        let payload_len = self.payload_len()?;
        Ok(header_len(self.id, payload_len)? as u64 + payload_len)
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        put_element_header(buf, self.id, self.payload_len()?)?;
        match &self.value {
            ElementValue::UnsignedInt(value) => {
                vint::put_fixed(buf, *value, vint::uint_width(*value))?
            }
            ElementValue::Text(text) => buf.put_slice(text.as_bytes()),
            ElementValue::Binary(data) => buf.put_slice(data),
            ElementValue::Float(value) => buf.put_slice(&vint::encode_double(*value)),
            ElementValue::Master(children) => {
                for child in children {
                    child.write_to(buf)?;
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len()? as usize);
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Size of the ID and size fields for an element with `payload_len` bytes.
pub fn header_len(id: u32, payload_len: u64) -> Result<usize> {
    Ok(vint::id_width(id)? + vint::size_width(payload_len)?)
}

/// Append the ID and size fields for an element whose payload follows separately.
pub fn put_element_header<B: BufMut>(buf: &mut B, id: u32, payload_len: u64) -> Result<usize> {
    let id_len = vint::put_id(buf, id)?;
    let size_len = vint::put_size(buf, payload_len)?;
    Ok(id_len + size_len)
}

/// `id ++ size(payload) ++ payload`
pub fn build_element(id: u32, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(vint::MAX_ID_WIDTH + vint::MAX_VINT_WIDTH + payload.len());
    put_element_header(&mut buf, id, payload.len() as u64)?;
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// `id ++ 0xFF`: an element opener whose size is never written.
///
/// Children are appended after it for as long as the stream runs.
pub fn build_unknown_size_element(id: u32) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(vint::MAX_ID_WIDTH + 1);
    vint::put_id(&mut buf, id)?;
    buf.put_u8(UNKNOWN_SIZE_BYTE);
    Ok(buf.freeze())
}
