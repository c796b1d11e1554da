//! chunks/types.rs
//! Chunk ids, flags, payload variants and the chunk error type.
//!
//! Design notes:
//! - `Chunk` is a two-variant sum: a `PlainChunk` carries a decoded
//!   `ChunkPayload`, an `EncryptedChunk` carries opaque ciphertext that only
//!   the auth-key cipher can open.
//! - `ChunkPayload` is closed; ids at or above `CUSTOM_BEGIN` all map to
//!   `ChunkPayload::Custom`.

use std::fmt;

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

use crate::constants::{chunk_ids, DATA_KEY_INFO_SIGNATURE};
use crate::crypto::{CipherAlgorithm, CryptoError, DataKeys, HashAlgorithm, Pbkdf2Params};
use crate::der::DerError;
use crate::types::AsymAlgorithmType;

/// Protocol chunk ids (below the custom range).
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive)]
pub enum ChunkId {
    DefaultHeader = chunk_ids::DEFAULT_HEADER,
    AuthKeyCheckData = chunk_ids::AUTH_KEY_CHECK_DATA,
    AsymAlgorithmIdentifier = chunk_ids::ASYM_ALGORITHM_IDENTIFIER,
    DataCryptoAlgorithmParameterSpec = chunk_ids::DATA_CRYPTO_ALGORITHM_PARAMETER_SPEC,
    DataMacAlgorithm = chunk_ids::DATA_MAC_ALGORITHM,
    EphemeralEcPublicKey = chunk_ids::EPHEMERAL_EC_PUBLIC_KEY,
    DataKeyInfo = chunk_ids::DATA_KEY_INFO,
    EncryptedDataKeyInfo = chunk_ids::ENCRYPTED_DATA_KEY_INFO,
    DhCheckData = chunk_ids::DH_CHECK_DATA,
    Data = chunk_ids::DATA,
    MacOfEncryptedData = chunk_ids::MAC_OF_ENCRYPTED_DATA,
    Fingerprint = chunk_ids::FINGERPRINT,
    SignedFingerprint = chunk_ids::SIGNED_FINGERPRINT,
    Timestamp = chunk_ids::TIMESTAMP,
}

impl ChunkId {
    #[inline]
    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// Wire id of a custom chunk given the caller-visible id.
#[inline]
pub fn custom_wire_id(caller_id: u32) -> Option<u32> {
    caller_id.checked_add(chunk_ids::CUSTOM_BEGIN)
}

#[inline]
pub fn is_custom_id(wire_id: u32) -> bool {
    wire_id >= chunk_ids::CUSTOM_BEGIN
}

bitflags! {
    /// Per-chunk flag bits.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ChunkFlags: u32 {
        /// Chunk data is encrypted under the auth-key derived key.
        const ENCRYPT_WITH_AUTH_KEY = 0x01;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("unknown chunk id: 0x{id:02x}")]
    UnknownChunkId { id: u32 },

    #[error("chunk id 0x{id:02x} already registered")]
    AlreadyRegistered { id: u32 },

    #[error("chunk id 0x{id:02x} is in the custom range")]
    ReservedForCustom { id: u32 },

    #[error("invalid payload for chunk 0x{id:02x}: {reason}")]
    InvalidPayload { id: u32, reason: String },

    #[error("der: {0}")]
    Der(#[from] DerError),

    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
}

/// First chunk of every payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultHeader {
    pub sub_version: u64,
    pub asym_algorithm_type: AsymAlgorithmType,
    /// Cipher for auth-key flagged chunks.
    pub chunk_crypto_algorithm: CipherAlgorithm,
    pub data_crypto_algorithm: CipherAlgorithm,
    pub fingerprint_algorithm: HashAlgorithm,
    pub auth_key_iv: Vec<u8>,
}

/// Password check for the auth key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthKeyCheck {
    pub params: Pbkdf2Params,
    pub key: Vec<u8>,
}

/// Symmetric data key + mac key, prefixed by a fixed signature.
#[derive(Clone)]
pub struct DataKeyInfo {
    pub signature: Vec<u8>,
    pub keys: DataKeys,
}

impl DataKeyInfo {
    pub fn new(keys: DataKeys) -> Self {
        Self { signature: DATA_KEY_INFO_SIGNATURE.to_vec(), keys }
    }

    /// A wrong unwrap key yields garbage here rather than a decode error.
    pub fn is_valid(&self) -> bool {
        self.signature == DATA_KEY_INFO_SIGNATURE
    }
}

impl fmt::Debug for DataKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKeyInfo")
            .field("signature", &hex::encode(&self.signature))
            .field("keys", &"<redacted>")
            .finish()
    }
}

/// Closed set of chunk payloads.
#[derive(Clone, Debug)]
pub enum ChunkPayload {
    DefaultHeader(DefaultHeader),
    AuthKeyCheck(AuthKeyCheck),
    /// Raw AlgorithmIdentifier of the asymmetric key.
    AsymAlgorithmIdentifier(Vec<u8>),
    /// Raw cipher parameter spec; decoded against the header's data cipher.
    DataCryptoParameterSpec(Vec<u8>),
    /// MAC algorithm OID.
    DataMacAlgorithm(String),
    /// SubjectPublicKeyInfo DER of the ephemeral key.
    EphemeralEcPublicKey(Vec<u8>),
    DataKeyInfo(DataKeyInfo),
    EncryptedDataKeyInfo(Vec<u8>),
    DhCheckData(Vec<u8>),
    Data(Vec<u8>),
    MacOfEncryptedData(Vec<u8>),
    Fingerprint(Vec<u8>),
    SignedFingerprint(Vec<u8>),
    /// RFC3161 TimeStampToken, raw DER.
    Timestamp(Vec<u8>),
    Custom(Vec<u8>),
}

impl ChunkPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ChunkPayload::DefaultHeader(_) => "DefaultHeader",
            ChunkPayload::AuthKeyCheck(_) => "AuthKeyCheckData",
            ChunkPayload::AsymAlgorithmIdentifier(_) => "AsymAlgorithmIdentifier",
            ChunkPayload::DataCryptoParameterSpec(_) => "DataCryptoAlgorithmParameterSpec",
            ChunkPayload::DataMacAlgorithm(_) => "DataMacAlgorithm",
            ChunkPayload::EphemeralEcPublicKey(_) => "EphemeralECPublicKey",
            ChunkPayload::DataKeyInfo(_) => "DataKeyInfo",
            ChunkPayload::EncryptedDataKeyInfo(_) => "EncryptedDataKeyInfo",
            ChunkPayload::DhCheckData(_) => "DHCheckData",
            ChunkPayload::Data(_) => "Data",
            ChunkPayload::MacOfEncryptedData(_) => "MacOfEncryptedData",
            ChunkPayload::Fingerprint(_) => "Fingerprint",
            ChunkPayload::SignedFingerprint(_) => "SignedFingerprint",
            ChunkPayload::Timestamp(_) => "Timestamp",
            ChunkPayload::Custom(_) => "CustomData",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlainChunk {
    /// Wire id (custom chunks include the custom base).
    pub id: u32,
    pub flags: ChunkFlags,
    pub payload: ChunkPayload,
}

impl PlainChunk {
    pub fn new(id: ChunkId, payload: ChunkPayload) -> Self {
        Self { id: id.raw(), flags: ChunkFlags::empty(), payload }
    }

    pub fn with_flags(mut self, flags: ChunkFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn wants_auth_encryption(&self) -> bool {
        self.flags.contains(ChunkFlags::ENCRYPT_WITH_AUTH_KEY)
    }
}

/// Chunk whose data is still auth-key ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub id: u32,
    pub flags: ChunkFlags,
    pub ciphertext: Vec<u8>,
}

#[derive(Clone, Debug)]
pub enum Chunk {
    Plain(PlainChunk),
    Encrypted(EncryptedChunk),
}

impl Chunk {
    pub fn id(&self) -> u32 {
        match self {
            Chunk::Plain(c) => c.id,
            Chunk::Encrypted(c) => c.id,
        }
    }

    pub fn flags(&self) -> ChunkFlags {
        match self {
            Chunk::Plain(c) => c.flags,
            Chunk::Encrypted(c) => c.flags,
        }
    }
}
