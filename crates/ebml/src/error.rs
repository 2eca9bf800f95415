use thiserror::Error;

/// Error type for EBML encoding and decoding
#[derive(Error, Debug)]
pub enum EbmlError {
    /// The leading byte of a vint carries no width marker bit.
    #[error("malformed vint: no width marker found in leading byte 0x{0:02X}")]
    MalformedVint(u8),

    #[error("invalid element id 0x{0:X}: class marker does not match its byte width")]
    InvalidId(u32),

    /// The value cannot be represented as a known size (8-byte vint limit).
    #[error("size {0} cannot be encoded as an EBML vint")]
    SizeTooLarge(u64),

    #[error("value {value} does not fit in {width} bytes")]
    ValueOutOfRange { value: u64, width: usize },

    #[error("unsupported fixed integer width: {0}")]
    InvalidWidth(usize),

    #[error("unsupported float width: {0}")]
    InvalidFloatWidth(usize),

    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("element 0x{0:X} has unknown size where a known size is required")]
    UnknownSize(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
