//! der/mod.rs
//! Minimal DER codec for the envelope's chunk records.
//!
//! Covers INTEGER, ENUMERATED, BOOLEAN, NULL, OCTET STRING, OBJECT IDENTIFIER,
//! SEQUENCE and raw ANY passthrough. Not a general ASN.1 library: no
//! high-tag-number form, no constructed strings, no REAL/time types.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::*;
pub use decode::{decode_single, peek_element, peek_header, DerReader};
