//! crypto/digest.rs
//! Hash and HMAC state dispatched over the registry's hash algorithms.

use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha224, Sha256, Sha384, Sha512};

use crate::crypto::registry::HashAlgorithm;
use crate::crypto::types::CryptoError;

/// Internal hashing state.
#[derive(Clone)]
pub enum DigestState {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestState {
    pub fn new(alg: HashAlgorithm) -> Self {
        match alg {
            HashAlgorithm::Sha224 => DigestState::Sha224(Sha224::new()),
            HashAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => DigestState::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => DigestState::Sha512(Sha512::new()),
        }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Sha224(h) => h.update(data),
            DigestState::Sha256(h) => h.update(data),
            DigestState::Sha384(h) => h.update(data),
            DigestState::Sha512(h) => h.update(data),
        }
    }

    #[inline]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            DigestState::Sha224(h) => h.finalize().to_vec(),
            DigestState::Sha256(h) => h.finalize().to_vec(),
            DigestState::Sha384(h) => h.finalize().to_vec(),
            DigestState::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

impl std::fmt::Debug for DigestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DigestState::Sha224(_) => "sha224",
            DigestState::Sha256(_) => "sha256",
            DigestState::Sha384(_) => "sha384",
            DigestState::Sha512(_) => "sha512",
        };
        f.debug_tuple("DigestState").field(&name).finish()
    }
}

/// Keyed MAC accumulator (encrypt-then-MAC over ciphertext).
pub enum MacState {
    Sha224(Hmac<Sha224>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

impl MacState {
    pub fn new(alg: HashAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let bad_key = |_| CryptoError::Failure("hmac key rejected".into());
        Ok(match alg {
            HashAlgorithm::Sha224 => MacState::Sha224(Hmac::new_from_slice(key).map_err(bad_key)?),
            HashAlgorithm::Sha256 => MacState::Sha256(Hmac::new_from_slice(key).map_err(bad_key)?),
            HashAlgorithm::Sha384 => MacState::Sha384(Hmac::new_from_slice(key).map_err(bad_key)?),
            HashAlgorithm::Sha512 => MacState::Sha512(Hmac::new_from_slice(key).map_err(bad_key)?),
        })
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        match self {
            MacState::Sha224(m) => m.update(data),
            MacState::Sha256(m) => m.update(data),
            MacState::Sha384(m) => m.update(data),
            MacState::Sha512(m) => m.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            MacState::Sha224(m) => m.finalize().into_bytes().to_vec(),
            MacState::Sha256(m) => m.finalize().into_bytes().to_vec(),
            MacState::Sha384(m) => m.finalize().into_bytes().to_vec(),
            MacState::Sha512(m) => m.finalize().into_bytes().to_vec(),
        }
    }

    /// Constant-time comparison against an expected tag.
    pub fn verify(self, expected: &[u8]) -> bool {
        match self {
            MacState::Sha224(m) => m.verify_slice(expected).is_ok(),
            MacState::Sha256(m) => m.verify_slice(expected).is_ok(),
            MacState::Sha384(m) => m.verify_slice(expected).is_ok(),
            MacState::Sha512(m) => m.verify_slice(expected).is_ok(),
        }
    }
}

/// One-shot digest.
pub fn digest(alg: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let mut state = DigestState::new(alg);
    state.update(data);
    state.finalize()
}
