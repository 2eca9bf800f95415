//! Minimal EBML element decoding over in-memory buffers.

use bytes::Bytes;

use crate::vint::{self, ElementSize};
use crate::{EbmlError, Result};

/// ID and size fields of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u32,
    pub size: ElementSize,
    /// Bytes taken by the ID and size fields.
    pub header_len: usize,
}

impl ElementHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (id, id_len) = vint::decode_id(data)?;
        let (size, size_len) = vint::decode_size(&data[id_len..])?;
        Ok(Self {
            id,
            size,
            header_len: id_len + size_len,
        })
    }
}

/// A decoded element with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub id: u32,
    pub size: ElementSize,
    pub payload: Bytes,
}

impl RawElement {
    pub fn as_uint(&self) -> Result<u64> {
        vint::decode_uint(&self.payload)
    }

    pub fn as_float(&self) -> Result<f64> {
        vint::decode_double(&self.payload)
    }

    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.payload)
            .trim_end_matches('\0')
            .to_string()
    }

    /// Iterate the children of a master element.
    pub fn children(&self) -> ElementIter {
        ElementIter::new(self.payload.clone())
    }

    pub fn find_child(&self, id: u32) -> Result<Option<RawElement>> {
        find_child(&self.payload, id)
    }
}

/// Decode the element at the start of `data`.
///
/// An unknown-size element takes the rest of `data` as its payload. Returns the
/// element and the number of bytes consumed.
pub fn decode_element(data: &Bytes) -> Result<(RawElement, usize)> {
    let header = ElementHeader::parse(data)?;
    let end = match header.size {
        ElementSize::Known(size) => {
            let end = header.header_len as u64 + size;
            if end > data.len() as u64 {
                return Err(EbmlError::InsufficientData {
                    expected: usize::try_from(end).unwrap_or(usize::MAX),
                    actual: data.len(),
                });
            }
            end as usize
        }
        ElementSize::Unknown => data.len(),
    };

    Ok((
        RawElement {
            id: header.id,
            size: header.size,
            payload: data.slice(header.header_len..end),
        },
        end,
    ))
}

/// Iterator over consecutive elements in a buffer.
///
/// Stops after the first decode error.
pub struct ElementIter {
    data: Bytes,
    offset: usize,
    failed: bool,
}

impl ElementIter {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for ElementIter {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let remaining = self.data.slice(self.offset..);
        match decode_element(&remaining) {
            Ok((element, consumed)) => {
                self.offset += consumed;
                Some(Ok(element))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Find the first child with the given ID inside a master payload.
pub fn find_child(payload: &Bytes, id: u32) -> Result<Option<RawElement>> {
    for element in ElementIter::new(payload.clone()) {
        let element = element?;
        if element.id == id {
            return Ok(Some(element));
        }
    }
    Ok(None)
}
