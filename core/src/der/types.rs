//! der/types.rs
//! Tag constants, parsed TLV views and the DER error type.

use std::fmt;

/// Universal single-byte tags used by the envelope.
pub mod tags {
    pub const END_OF_CONTENTS: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const ENUMERATED: u8 = 0x0a;
    pub const SEQUENCE: u8 = 0x30;
}

/// Marker byte for indefinite length (BER, used only by the payload wrapper).
pub const INDEFINITE_LENGTH: u8 = 0x80;

/// Longest long-form length we accept (4 bytes, 4 GiB).
pub const MAX_LENGTH_OCTETS: usize = 4;

/// Tag + length prefix of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    pub tag: u8,
    /// Bytes taken by tag + length octets.
    pub header_len: usize,
    /// Content length; `None` for indefinite length.
    pub length: Option<usize>,
}

impl TlvHeader {
    /// Full encoded size (definite lengths only).
    #[inline]
    pub fn total_len(&self) -> Option<usize> {
        self.length.map(|l| self.header_len + l)
    }

    #[inline]
    pub fn is_end_of_contents(&self) -> bool {
        self.tag == tags::END_OF_CONTENTS && self.length == Some(0)
    }
}

/// Borrowed view of one decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    /// Content octets.
    pub value: &'a [u8],
    /// Complete encoding (tag + length + content).
    pub raw: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    /// Input ended inside an element.
    Truncated { have: usize, need: usize },
    /// A different element was expected at this position.
    UnexpectedTag { expected: u8, found: u8 },
    /// Length octets are malformed or exceed `MAX_LENGTH_OCTETS`.
    InvalidLength(String),
    /// Indefinite length where a definite one is required.
    IndefiniteLength,
    /// High-tag-number form is not supported.
    MultiByteTag(u8),
    /// Negative INTEGER where an unsigned one is required.
    NegativeInteger,
    /// INTEGER does not fit the target width.
    IntegerOverflow { len: usize },
    /// OID text or encoding is malformed.
    InvalidOid(String),
    /// Bytes left over after a complete structure.
    TrailingData { remaining: usize },
}

impl fmt::Display for DerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerError::Truncated { have, need } =>
                write!(f, "truncated element: have={}, need={}", have, need),
            DerError::UnexpectedTag { expected, found } =>
                write!(f, "unexpected tag: expected=0x{:02x}, found=0x{:02x}", expected, found),
            DerError::InvalidLength(msg) => write!(f, "invalid length: {}", msg),
            DerError::IndefiniteLength => write!(f, "indefinite length not allowed here"),
            DerError::MultiByteTag(b) => write!(f, "multi-byte tag not supported: 0x{:02x}", b),
            DerError::NegativeInteger => write!(f, "negative integer"),
            DerError::IntegerOverflow { len } => write!(f, "integer too large: {} octets", len),
            DerError::InvalidOid(msg) => write!(f, "invalid object identifier: {}", msg),
            DerError::TrailingData { remaining } => write!(f, "trailing data: {} bytes", remaining),
        }
    }
}

impl std::error::Error for DerError {}
