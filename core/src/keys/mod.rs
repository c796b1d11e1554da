//! keys/mod.rs
//! Asymmetric key capability objects consumed by writer and reader.
//!
//! Design notes:
//! - The envelope never manages key storage; it only asks a key what it can
//!   do (`is_private`, `can_public_encrypt`, ...) and calls it.
//! - Optional capabilities default to `KeyError::Unsupported`, so a family
//!   implements only what it supports.
//!
//! Families:
//! - `EcKey`  : P-256, ECDSA signatures, ephemeral-static ECDH.
//! - `RsaKey` : RSA, PKCS#1 v1.5 signatures, OAEP-SHA256 key wrap.

pub mod ec;
pub mod rsa;

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::HashAlgorithm;
use crate::der::{DerError, DerReader};
use crate::types::AsymAlgorithmType;

pub use self::ec::EcKey;
pub use self::rsa::RsaKey;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("operation not supported by this key: {0}")]
    Unsupported(&'static str),

    #[error("private key required")]
    MissingPrivateKey,

    #[error("key encoding: {0}")]
    Encoding(String),

    #[error("{0}")]
    Operation(String),
}

/// Shared handle used by params and delegates.
pub type KeyRef = Arc<dyn AsymmetricKey>;

/// Capability interface of one asymmetric key (or key pair).
pub trait AsymmetricKey: Send + Sync + fmt::Debug {
    fn algorithm_type(&self) -> AsymAlgorithmType;

    fn is_private(&self) -> bool;

    /// A private key always carries its public half.
    fn is_public(&self) -> bool {
        true
    }

    fn can_sign(&self) -> bool {
        self.is_private()
    }

    /// Direct public-key encryption (key transport).
    fn can_public_encrypt(&self) -> bool {
        false
    }

    fn can_private_decrypt(&self) -> bool {
        self.can_public_encrypt() && self.is_private()
    }

    fn can_key_agreement(&self) -> bool {
        false
    }

    /// Sign a precomputed digest.
    fn sign(&self, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>, KeyError>;

    fn verify(&self, hash: HashAlgorithm, digest: &[u8], signature: &[u8]) -> Result<bool, KeyError>;

    fn public_encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        Err(KeyError::Unsupported("public encrypt"))
    }

    fn private_decrypt(&self, _ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        Err(KeyError::Unsupported("private decrypt"))
    }

    /// Fresh key pair with the same domain parameters.
    fn generate_key_pair(&self) -> Result<Box<dyn AsymmetricKey>, KeyError> {
        Err(KeyError::Unsupported("key generation"))
    }

    /// Raw shared secret with the peer's SubjectPublicKeyInfo.
    fn dh_compute_secret(&self, _peer_spki_der: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        Err(KeyError::Unsupported("key agreement"))
    }

    /// SubjectPublicKeyInfo DER of the public half.
    fn export_spki_der(&self) -> Result<Vec<u8>, KeyError>;

    /// AlgorithmIdentifier DER taken from the SubjectPublicKeyInfo.
    fn algorithm_identifier_der(&self) -> Result<Vec<u8>, KeyError> {
        spki_algorithm_identifier(&self.export_spki_der()?)
    }
}

/// First element of a SubjectPublicKeyInfo.
pub fn spki_algorithm_identifier(spki: &[u8]) -> Result<Vec<u8>, KeyError> {
    let bad = |e: DerError| KeyError::Encoding(format!("spki: {}", e));
    let mut outer = DerReader::new(spki);
    let mut seq = outer.read_sequence().map_err(bad)?;
    let algorithm = seq.read_any_raw().map_err(bad)?;
    Ok(algorithm.to_vec())
}
