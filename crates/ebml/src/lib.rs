//! EBML (Extensible Binary Meta Language) codec
//!
//! This crate provides the primitive encoders used to write Matroska streams:
//! variable-length sizes, element IDs, fixed-width integers and doubles, an
//! element builder over tagged element values, and a small in-memory reader
//! for the inverse path.

pub mod element;
pub mod error;
pub mod ids;
pub mod reader;
pub mod vint;

pub use element::{
    Element, ElementValue, build_element, build_unknown_size_element, put_element_header,
};
pub use error::EbmlError;
pub use reader::{ElementHeader, ElementIter, RawElement, decode_element, find_child};
pub use vint::{
    ElementSize, decode_double, decode_id, decode_size, decode_uint, encode_double, encode_fixed,
    encode_id, encode_size,
};

/// Result type for EBML operations
pub type Result<T> = std::result::Result<T, EbmlError>;
