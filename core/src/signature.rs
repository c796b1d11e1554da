//! signature.rs
//! Stream prefix: 15-byte magic + 1-byte format version.
//!
//! The prefix is not part of the fingerprint; it only routes the rest of the
//! stream to a versioned delegate.

use crate::constants::{FORMAT_VERSION, MAGIC, SIGNATURE_LEN};
use crate::types::EnvelopeError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub version: u8,
}

impl Default for SignatureHeader {
    fn default() -> Self {
        Self { version: FORMAT_VERSION }
    }
}

impl SignatureHeader {
    pub fn new(version: u8) -> Self {
        Self { version }
    }

    pub fn encode(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..MAGIC.len()].copy_from_slice(&MAGIC);
        out[MAGIC.len()] = self.version;
        out
    }

    /// Parse from the start of `buf`.
    ///
    /// # Returns
    /// - `Ok(None)` when fewer than `SIGNATURE_LEN` bytes are available.
    /// - `Err(InvalidMagic)` as soon as a buffered byte disagrees with the magic.
    pub fn parse(buf: &[u8]) -> Result<Option<Self>, EnvelopeError> {
        let seen = buf.len().min(MAGIC.len());
        if buf[..seen] != MAGIC[..seen] {
            return Err(EnvelopeError::InvalidMagic);
        }
        if buf.len() < SIGNATURE_LEN {
            return Ok(None);
        }
        Ok(Some(Self { version: buf[MAGIC.len()] }))
    }
}

/// Versions with a delegate.
pub const SUPPORTED_VERSIONS: &[u8] = &[FORMAT_VERSION];

/// Route a format version to its delegate.
pub fn delegate_version(version: u8) -> Result<u8, EnvelopeError> {
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(version)
    } else {
        Err(EnvelopeError::UnsupportedVersion { version })
    }
}
