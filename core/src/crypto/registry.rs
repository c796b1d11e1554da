//! crypto/registry.rs
//! Table-driven symmetric algorithm registry.
//!
//! Design notes:
//! - Ciphers and hashes are looked up by canonical name ("aes-256-gcm") or by
//!   dotted OID, the form carried inside the envelope.
//! - Each cipher owns the codec for its envelope-embedded parameter spec:
//!   CBC: `OCTET STRING iv`
//!   GCM: `SEQUENCE { OCTET STRING nonce, INTEGER icvLen DEFAULT 12 }`

use rand::RngCore;

use crate::constants::{oids, CBC_IV_LEN, GCM_DEFAULT_ICV_LEN, GCM_NONCE_LEN};
use crate::crypto::cipher::{StreamDecryptor, StreamEncryptor};
use crate::crypto::digest::{DigestState, MacState};
use crate::crypto::types::{CryptoError, MIN_ICV_LEN, TAG_LEN};
use crate::der::{encode, tags, DerReader};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes192Gcm,
    Aes256Gcm,
}

/// Raw cipher parameters (IV or nonce + ICV length).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSpec {
    pub iv: Vec<u8>,
    /// GCM only: tag length in bytes.
    pub icv_len: Option<usize>,
}

impl CipherAlgorithm {
    pub const ALL: [CipherAlgorithm; 6] = [
        CipherAlgorithm::Aes128Cbc,
        CipherAlgorithm::Aes192Cbc,
        CipherAlgorithm::Aes256Cbc,
        CipherAlgorithm::Aes128Gcm,
        CipherAlgorithm::Aes192Gcm,
        CipherAlgorithm::Aes256Gcm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CipherAlgorithm::Aes128Cbc => "aes-128-cbc",
            CipherAlgorithm::Aes192Cbc => "aes-192-cbc",
            CipherAlgorithm::Aes256Cbc => "aes-256-cbc",
            CipherAlgorithm::Aes128Gcm => "aes-128-gcm",
            CipherAlgorithm::Aes192Gcm => "aes-192-gcm",
            CipherAlgorithm::Aes256Gcm => "aes-256-gcm",
        }
    }

    pub fn oid(self) -> &'static str {
        match self {
            CipherAlgorithm::Aes128Cbc => oids::AES_128_CBC,
            CipherAlgorithm::Aes192Cbc => oids::AES_192_CBC,
            CipherAlgorithm::Aes256Cbc => oids::AES_256_CBC,
            CipherAlgorithm::Aes128Gcm => oids::AES_128_GCM,
            CipherAlgorithm::Aes192Gcm => oids::AES_192_GCM,
            CipherAlgorithm::Aes256Gcm => oids::AES_256_GCM,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            CipherAlgorithm::Aes128Cbc | CipherAlgorithm::Aes128Gcm => 16,
            CipherAlgorithm::Aes192Cbc | CipherAlgorithm::Aes192Gcm => 24,
            CipherAlgorithm::Aes256Cbc | CipherAlgorithm::Aes256Gcm => 32,
        }
    }

    #[inline]
    pub fn is_gcm(self) -> bool {
        matches!(
            self,
            CipherAlgorithm::Aes128Gcm | CipherAlgorithm::Aes192Gcm | CipherAlgorithm::Aes256Gcm
        )
    }

    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| CryptoError::UnknownAlgorithm(name.to_string()))
    }

    pub fn from_oid(oid: &str) -> Result<Self, CryptoError> {
        Self::ALL
            .into_iter()
            .find(|a| a.oid() == oid)
            .ok_or_else(|| CryptoError::UnknownAlgorithm(oid.to_string()))
    }

    /// Fresh random parameters for a new envelope.
    pub fn generate_parameter_spec(self) -> ParameterSpec {
        let mut rng = rand::thread_rng();
        if self.is_gcm() {
            let mut iv = vec![0u8; GCM_NONCE_LEN];
            rng.fill_bytes(&mut iv);
            ParameterSpec { iv, icv_len: Some(GCM_DEFAULT_ICV_LEN) }
        } else {
            let mut iv = vec![0u8; CBC_IV_LEN];
            rng.fill_bytes(&mut iv);
            ParameterSpec { iv, icv_len: None }
        }
    }

    pub fn encode_parameter_spec(self, spec: &ParameterSpec) -> Vec<u8> {
        if self.is_gcm() {
            let nonce = encode::octet_string(&spec.iv);
            let icv = encode::integer_u64(spec.icv_len.unwrap_or(GCM_DEFAULT_ICV_LEN) as u64);
            encode::sequence(&[&nonce, &icv])
        } else {
            encode::octet_string(&spec.iv)
        }
    }

    pub fn parse_parameter_spec(self, der: &[u8]) -> Result<ParameterSpec, CryptoError> {
        let mut outer = DerReader::new(der);
        let spec = if self.is_gcm() {
            let mut seq = outer.read_sequence()?;
            let iv = seq.read_octet_string()?.to_vec();
            // icvLen is the second element; absent means the default.
            let icv_len = if seq.peek_tag() == Some(tags::INTEGER) {
                seq.read_u64()? as usize
            } else {
                GCM_DEFAULT_ICV_LEN
            };
            seq.finish()?;
            ParameterSpec { iv, icv_len: Some(icv_len) }
        } else {
            ParameterSpec { iv: outer.read_octet_string()?.to_vec(), icv_len: None }
        };
        outer.finish()?;
        Ok(spec)
    }

    fn check(self, key: &[u8], spec: &ParameterSpec) -> Result<(), CryptoError> {
        if key.len() != self.key_len() {
            return Err(CryptoError::InvalidKeyLen { expected: self.key_len(), actual: key.len() });
        }
        if self.is_gcm() {
            if spec.iv.is_empty() {
                return Err(CryptoError::InvalidIvLen { expected: GCM_NONCE_LEN, actual: 0 });
            }
            let icv = spec.icv_len.unwrap_or(GCM_DEFAULT_ICV_LEN);
            if !(MIN_ICV_LEN..=TAG_LEN).contains(&icv) {
                return Err(CryptoError::InvalidIcvLen(icv));
            }
        } else if spec.iv.len() != CBC_IV_LEN {
            return Err(CryptoError::InvalidIvLen { expected: CBC_IV_LEN, actual: spec.iv.len() });
        }
        Ok(())
    }

    /// Streaming encryptor. `aad` binds associated data (GCM only).
    pub fn encryptor(self, key: &[u8], spec: &ParameterSpec, aad: &[u8]) -> Result<StreamEncryptor, CryptoError> {
        self.check(key, spec)?;
        if self.is_gcm() {
            StreamEncryptor::gcm(key, &spec.iv, aad, spec.icv_len.unwrap_or(GCM_DEFAULT_ICV_LEN))
        } else {
            StreamEncryptor::cbc(key, &spec.iv)
        }
    }

    pub fn decryptor(self, key: &[u8], spec: &ParameterSpec, aad: &[u8]) -> Result<StreamDecryptor, CryptoError> {
        self.check(key, spec)?;
        if self.is_gcm() {
            StreamDecryptor::gcm(key, &spec.iv, aad, spec.icv_len.unwrap_or(GCM_DEFAULT_ICV_LEN))
        } else {
            StreamDecryptor::cbc(key, &spec.iv)
        }
    }

    /// One-shot encryption (auth-key protected chunks).
    pub fn seal(self, key: &[u8], spec: &ParameterSpec, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut enc = self.encryptor(key, spec, &[])?;
        let mut out = enc.update(plaintext);
        let sealed = enc.finalize();
        out.extend_from_slice(&sealed.tail);
        if let Some(tag) = sealed.tag {
            out.extend_from_slice(&tag);
        }
        Ok(out)
    }

    /// Inverse of [`CipherAlgorithm::seal`].
    pub fn open(self, key: &[u8], spec: &ParameterSpec, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut dec = self.decryptor(key, spec, &[])?;
        if self.is_gcm() {
            let icv = spec.icv_len.unwrap_or(GCM_DEFAULT_ICV_LEN);
            if ciphertext.len() < icv {
                return Err(CryptoError::TagMismatch);
            }
            let (body, tag) = ciphertext.split_at(ciphertext.len() - icv);
            let mut out = dec.update(body);
            out.extend_from_slice(&dec.finalize(Some(tag))?);
            Ok(out)
        } else {
            let mut out = dec.update(ciphertext);
            out.extend_from_slice(&dec.finalize(None)?);
            Ok(out)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Sha224,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha224,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha224 => "sha224",
        }
    }

    pub fn oid(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => oids::SHA256,
            HashAlgorithm::Sha384 => oids::SHA384,
            HashAlgorithm::Sha512 => oids::SHA512,
            HashAlgorithm::Sha224 => oids::SHA224,
        }
    }

    /// Digest size in bytes (drives HKDF block counts).
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Sha224 => 28,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| CryptoError::UnknownAlgorithm(name.to_string()))
    }

    pub fn from_oid(oid: &str) -> Result<Self, CryptoError> {
        Self::ALL
            .into_iter()
            .find(|a| a.oid() == oid)
            .ok_or_else(|| CryptoError::UnknownAlgorithm(oid.to_string()))
    }

    pub fn hasher(self) -> DigestState {
        DigestState::new(self)
    }

    pub fn hmac(self, key: &[u8]) -> Result<MacState, CryptoError> {
        MacState::new(self, key)
    }
}
