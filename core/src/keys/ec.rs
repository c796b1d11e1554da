//! keys/ec.rs
//! P-256 keys: ECDSA over a prehashed fingerprint and ephemeral-static ECDH.

use std::fmt;

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::crypto::HashAlgorithm;
use crate::keys::{AsymmetricKey, KeyError};
use crate::types::AsymAlgorithmType;

#[derive(Clone)]
pub struct EcKey {
    secret: Option<SecretKey>,
    public: PublicKey,
}

impl EcKey {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret: Some(secret), public }
    }

    pub fn from_public(public: PublicKey) -> Self {
        Self { secret: None, public }
    }

    /// Public half only (what a signature verifier or encrypting sender holds).
    pub fn public_key(&self) -> Self {
        Self::from_public(self.public)
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        SecretKey::from_pkcs8_der(der)
            .map(Self::from_secret)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, KeyError> {
        SecretKey::from_pkcs8_pem(pem)
            .map(Self::from_secret)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_public_key_der(der: &[u8]) -> Result<Self, KeyError> {
        PublicKey::from_public_key_der(der)
            .map(Self::from_public)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_public_key_pem(pem: &str) -> Result<Self, KeyError> {
        PublicKey::from_public_key_pem(pem)
            .map(Self::from_public)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    fn secret(&self) -> Result<&SecretKey, KeyError> {
        self.secret.as_ref().ok_or(KeyError::MissingPrivateKey)
    }
}

impl fmt::Debug for EcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKey")
            .field("curve", &"P-256")
            .field("private", &self.secret.is_some())
            .finish()
    }
}

impl AsymmetricKey for EcKey {
    fn algorithm_type(&self) -> AsymAlgorithmType {
        AsymAlgorithmType::Ec
    }

    fn is_private(&self) -> bool {
        self.secret.is_some()
    }

    fn can_key_agreement(&self) -> bool {
        true
    }

    fn sign(&self, _hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signing = SigningKey::from(self.secret()?);
        let signature: Signature = signing
            .sign_prehash(digest)
            .map_err(|e| KeyError::Operation(format!("ecdsa sign: {}", e)))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn verify(&self, _hash: HashAlgorithm, digest: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let Ok(signature) = Signature::from_der(signature) else {
            return Ok(false);
        };
        let verifying = VerifyingKey::from(&self.public);
        Ok(verifying.verify_prehash(digest, &signature).is_ok())
    }

    fn generate_key_pair(&self) -> Result<Box<dyn AsymmetricKey>, KeyError> {
        Ok(Box::new(EcKey::generate()))
    }

    fn dh_compute_secret(&self, peer_spki_der: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let peer = PublicKey::from_public_key_der(peer_spki_der)
            .map_err(|e| KeyError::Encoding(format!("peer key: {}", e)))?;
        let shared = p256::ecdh::diffie_hellman(self.secret()?.to_nonzero_scalar(), peer.as_affine());
        Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
    }

    fn export_spki_der(&self) -> Result<Vec<u8>, KeyError> {
        self.public
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }
}
