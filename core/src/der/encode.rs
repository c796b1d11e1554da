//! der/encode.rs
//!
//! DER encoding helpers.
//!
//! Design notes:
//! - Every helper returns the complete TLV so callers compose structures by
//!   concatenation (`sequence(&[&a, &b])`).
//! - Lengths are always definite and minimal; the only BER construct in the
//!   envelope (the `30 80` payload opener) is written verbatim by the writer.

use crate::der::types::{tags, DerError};

/// Append minimal DER length octets.
pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Append one element.
pub fn write_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    encode_length(value.len(), out);
    out.extend_from_slice(value);
}

pub fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 6);
    write_tlv(&mut out, tag, value);
    out
}

/// Minimal two's-complement content for a non-negative integer given as
/// big-endian magnitude.
fn unsigned_content(magnitude: &[u8]) -> Vec<u8> {
    let skip = magnitude.iter().take_while(|&&b| b == 0).count();
    let trimmed = &magnitude[skip..];
    let mut content = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.is_empty() || trimmed[0] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(trimmed);
    content
}

pub fn integer_u64(v: u64) -> Vec<u8> {
    tlv(tags::INTEGER, &unsigned_content(&v.to_be_bytes()))
}

/// INTEGER from an unsigned big-endian magnitude (nonces, serials).
pub fn integer_unsigned(magnitude: &[u8]) -> Vec<u8> {
    tlv(tags::INTEGER, &unsigned_content(magnitude))
}

pub fn enumerated(v: u64) -> Vec<u8> {
    tlv(tags::ENUMERATED, &unsigned_content(&v.to_be_bytes()))
}

pub fn octet_string(value: &[u8]) -> Vec<u8> {
    tlv(tags::OCTET_STRING, value)
}

pub fn null() -> Vec<u8> {
    vec![tags::NULL, 0x00]
}

pub fn boolean(v: bool) -> Vec<u8> {
    tlv(tags::BOOLEAN, &[if v { 0xff } else { 0x00 }])
}

pub fn sequence(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len()).sum();
    let mut content = Vec::with_capacity(len);
    for p in parts {
        content.extend_from_slice(p);
    }
    tlv(tags::SEQUENCE, &content)
}

fn push_base128(mut v: u64, out: &mut Vec<u8>) {
    let mut stack = [0u8; 10];
    let mut n = 0;
    loop {
        stack[n] = (v & 0x7f) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let cont = if i > 0 { 0x80 } else { 0x00 };
        out.push(stack[i] | cont);
    }
}

/// Content octets of an OID given in dotted form.
pub fn oid_content(dotted: &str) -> Result<Vec<u8>, DerError> {
    let arcs = dotted
        .split('.')
        .map(|s| s.parse::<u64>().map_err(|_| DerError::InvalidOid(dotted.to_string())))
        .collect::<Result<Vec<u64>, DerError>>()?;

    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        return Err(DerError::InvalidOid(dotted.to_string()));
    }

    let mut content = Vec::with_capacity(arcs.len() * 2);
    push_base128(arcs[0] * 40 + arcs[1], &mut content);
    for &arc in &arcs[2..] {
        push_base128(arc, &mut content);
    }
    Ok(content)
}

pub fn oid(dotted: &str) -> Result<Vec<u8>, DerError> {
    Ok(tlv(tags::OBJECT_IDENTIFIER, &oid_content(dotted)?))
}

/// `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`
pub fn algorithm_identifier(dotted: &str, parameters: Option<&[u8]>) -> Result<Vec<u8>, DerError> {
    let oid = oid(dotted)?;
    Ok(match parameters {
        Some(p) => sequence(&[&oid, p]),
        None => sequence(&[&oid]),
    })
}
