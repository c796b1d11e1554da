//! der/decode.rs
//!
//! DER decoding: an incremental header peek for streaming input and a
//! borrowing cursor for complete structures.
//!
//! Design notes:
//! - `peek_header` / `peek_element` return `Ok(None)` when more input is
//!   needed; they never fail on a short buffer.
//! - `DerReader` borrows its input, so decoded octet strings are slices into
//!   the caller's buffer until explicitly copied.

use crate::der::types::{tags, DerError, Tlv, TlvHeader, INDEFINITE_LENGTH, MAX_LENGTH_OCTETS};

/// Parse the tag + length prefix at the start of `buf`.
///
/// # Returns
/// - `Ok(Some(header))` when the prefix is complete.
/// - `Ok(None)` when `buf` ends inside the prefix.
pub fn peek_header(buf: &[u8]) -> Result<Option<TlvHeader>, DerError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let tag = buf[0];
    if tag & 0x1f == 0x1f {
        return Err(DerError::MultiByteTag(tag));
    }

    let first = buf[1];
    if first < 0x80 {
        return Ok(Some(TlvHeader { tag, header_len: 2, length: Some(first as usize) }));
    }
    if first == INDEFINITE_LENGTH {
        return Ok(Some(TlvHeader { tag, header_len: 2, length: None }));
    }

    let n = (first & 0x7f) as usize;
    if n > MAX_LENGTH_OCTETS {
        return Err(DerError::InvalidLength(format!("{} length octets", n)));
    }
    if buf.len() < 2 + n {
        return Ok(None);
    }
    let length = buf[2..2 + n].iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok(Some(TlvHeader { tag, header_len: 2 + n, length: Some(length) }))
}

/// Like [`peek_header`], but only succeeds once the whole element is buffered.
pub fn peek_element(buf: &[u8]) -> Result<Option<TlvHeader>, DerError> {
    match peek_header(buf)? {
        None => Ok(None),
        Some(h) => match h.total_len() {
            None => Ok(Some(h)),
            Some(total) if buf.len() >= total => Ok(Some(h)),
            Some(_) => Ok(None),
        },
    }
}

/// Decode an unsigned INTEGER/ENUMERATED content into u64.
pub fn content_to_u64(content: &[u8]) -> Result<u64, DerError> {
    if content.is_empty() {
        return Err(DerError::InvalidLength("empty integer".into()));
    }
    if content[0] & 0x80 != 0 {
        return Err(DerError::NegativeInteger);
    }
    let skip = content.iter().take_while(|&&b| b == 0).count();
    let significant = &content[skip..];
    if significant.len() > 8 {
        return Err(DerError::IntegerOverflow { len: significant.len() });
    }
    Ok(significant.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Dotted text of OID content octets.
pub fn oid_to_string(content: &[u8]) -> Result<String, DerError> {
    if content.is_empty() {
        return Err(DerError::InvalidOid("empty".into()));
    }
    let mut arcs: Vec<u64> = Vec::with_capacity(content.len() + 1);
    let mut acc: u64 = 0;
    let mut in_arc = false;
    for &b in content {
        if acc > (u64::MAX >> 7) {
            return Err(DerError::InvalidOid("arc overflow".into()));
        }
        acc = (acc << 7) | (b & 0x7f) as u64;
        in_arc = b & 0x80 != 0;
        if !in_arc {
            if arcs.is_empty() {
                let (first, second) = match acc {
                    0..=39 => (0, acc),
                    40..=79 => (1, acc - 40),
                    _ => (2, acc - 80),
                };
                arcs.push(first);
                arcs.push(second);
            } else {
                arcs.push(acc);
            }
            acc = 0;
        }
    }
    if in_arc {
        return Err(DerError::InvalidOid("unterminated arc".into()));
    }
    Ok(arcs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join("."))
}

/// Borrowing cursor over a run of DER elements.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Read the next definite-length element, whatever its tag.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, DerError> {
        let rest = self.remaining();
        let header = peek_header(rest)?.ok_or(DerError::Truncated { have: rest.len(), need: 2 })?;
        let total = header.total_len().ok_or(DerError::IndefiniteLength)?;
        if rest.len() < total {
            return Err(DerError::Truncated { have: rest.len(), need: total });
        }
        self.pos += total;
        Ok(Tlv {
            tag: header.tag,
            value: &rest[header.header_len..total],
            raw: &rest[..total],
        })
    }

    /// Read the next element and require `tag`; returns its content.
    pub fn read_expected(&mut self, tag: u8) -> Result<&'a [u8], DerError> {
        let found = self.peek_tag().ok_or(DerError::Truncated { have: 0, need: 2 })?;
        if found != tag {
            return Err(DerError::UnexpectedTag { expected: tag, found });
        }
        Ok(self.read_tlv()?.value)
    }

    pub fn read_u64(&mut self) -> Result<u64, DerError> {
        content_to_u64(self.read_expected(tags::INTEGER)?)
    }

    pub fn read_enumerated(&mut self) -> Result<u64, DerError> {
        content_to_u64(self.read_expected(tags::ENUMERATED)?)
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8], DerError> {
        self.read_expected(tags::OCTET_STRING)
    }

    pub fn read_oid(&mut self) -> Result<String, DerError> {
        oid_to_string(self.read_expected(tags::OBJECT_IDENTIFIER)?)
    }

    pub fn read_null(&mut self) -> Result<(), DerError> {
        let content = self.read_expected(tags::NULL)?;
        if !content.is_empty() {
            return Err(DerError::InvalidLength("NULL with content".into()));
        }
        Ok(())
    }

    pub fn read_boolean(&mut self) -> Result<bool, DerError> {
        let content = self.read_expected(tags::BOOLEAN)?;
        match content {
            [b] => Ok(*b != 0),
            _ => Err(DerError::InvalidLength("BOOLEAN must be one octet".into())),
        }
    }

    /// Enter a SEQUENCE; the returned reader covers its content.
    pub fn read_sequence(&mut self) -> Result<DerReader<'a>, DerError> {
        Ok(DerReader::new(self.read_expected(tags::SEQUENCE)?))
    }

    /// Complete encoding of the next element, tag included.
    pub fn read_any_raw(&mut self) -> Result<&'a [u8], DerError> {
        Ok(self.read_tlv()?.raw)
    }

    /// Require that every byte was consumed.
    pub fn finish(self) -> Result<(), DerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DerError::TrailingData { remaining: self.buf.len() - self.pos })
        }
    }
}

/// Decode exactly one element spanning all of `buf`.
pub fn decode_single(buf: &[u8]) -> Result<Tlv<'_>, DerError> {
    let mut r = DerReader::new(buf);
    let tlv = r.read_tlv()?;
    r.finish()?;
    Ok(tlv)
}
