//! keys/rsa.rs
//! RSA keys: PKCS#1 v1.5 signatures and OAEP-SHA256 data-key transport.

use std::fmt;

use ::rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use ::rsa::traits::PublicKeyParts;
use ::rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use rand::rngs::OsRng;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::crypto::HashAlgorithm;
use crate::keys::{AsymmetricKey, KeyError};
use crate::types::AsymAlgorithmType;

#[derive(Clone)]
pub struct RsaKey {
    private: Option<RsaPrivateKey>,
    public: RsaPublicKey,
}

fn pkcs1v15(hash: HashAlgorithm) -> Pkcs1v15Sign {
    match hash {
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

impl RsaKey {
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(Self::from_private)
            .map_err(|e| KeyError::Operation(format!("rsa keygen: {}", e)))
    }

    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        Self { private: Some(private), public }
    }

    pub fn from_public(public: RsaPublicKey) -> Self {
        Self { private: None, public }
    }

    pub fn public_key(&self) -> Self {
        Self::from_public(self.public.clone())
    }

    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self::from_private)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(Self::from_private)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_public_key_der(der: &[u8]) -> Result<Self, KeyError> {
        RsaPublicKey::from_public_key_der(der)
            .map(Self::from_public)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_public_key_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPublicKey::from_public_key_pem(pem)
            .map(Self::from_public)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    fn private(&self) -> Result<&RsaPrivateKey, KeyError> {
        self.private.as_ref().ok_or(KeyError::MissingPrivateKey)
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("bits", &self.bits())
            .field("private", &self.private.is_some())
            .finish()
    }
}

impl AsymmetricKey for RsaKey {
    fn algorithm_type(&self) -> AsymAlgorithmType {
        AsymAlgorithmType::Rsa
    }

    fn is_private(&self) -> bool {
        self.private.is_some()
    }

    fn can_public_encrypt(&self) -> bool {
        true
    }

    fn sign(&self, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.private()?
            .sign(pkcs1v15(hash), digest)
            .map_err(|e| KeyError::Operation(format!("rsa sign: {}", e)))
    }

    fn verify(&self, hash: HashAlgorithm, digest: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        Ok(self.public.verify(pkcs1v15(hash), digest, signature).is_ok())
    }

    fn public_encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| KeyError::Operation(format!("rsa encrypt: {}", e)))
    }

    fn private_decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        self.private()?
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| KeyError::Operation(format!("rsa decrypt: {}", e)))
    }

    fn generate_key_pair(&self) -> Result<Box<dyn AsymmetricKey>, KeyError> {
        Ok(Box::new(RsaKey::generate(self.bits())?))
    }

    fn export_spki_der(&self) -> Result<Vec<u8>, KeyError> {
        self.public
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }
}
