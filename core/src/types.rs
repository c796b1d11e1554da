//! types.rs
//! Crate-wide error type and the small enums shared by writer and reader.

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::{
    chunks::ChunkError,
    crypto::CryptoError,
    der::DerError,
    keys::KeyError,
    tsa::TimestampError,
};

/// Unified envelope error.
/// - Protocol taxonomy first, wrapped sub-module errors after.
/// - `From<T>` impls let `?` cross the der/chunk/crypto/key layers.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Stream declares a format version with no delegate.
    #[error("unsupported envelope version: {version}")]
    UnsupportedVersion { version: u8 },

    /// Chunk id is neither registered nor in the custom range.
    #[error("unknown chunk id: 0x{id:02x}")]
    UnknownChunkId { id: u32 },

    /// Supplied auth key fails the password check.
    #[error("auth key mismatch")]
    AuthKeyMismatch,

    /// Key agreement check or data-key unwrap failed.
    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    /// Tag, MAC, fingerprint or signature check failed at finalization.
    #[error("validation failed: {0}")]
    ValidateFailed(String),

    /// Operation needs key material or a completed init step.
    #[error("missing key material: {0}")]
    MissingKeyMaterial(&'static str),

    /// Custom chunk added once payload data has been written.
    #[error("custom chunks are not allowed after data")]
    NotAllowedAfterData,

    /// Stream does not start with the envelope signature.
    #[error("invalid envelope signature")]
    InvalidMagic,

    /// Lookup attempted before the header section was fully read.
    #[error("header read not completed")]
    HeaderIncomplete,

    /// Key lacks the capability the requested operation needs.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Structural violation in the stream.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Reader input stays paused because `init` failed.
    #[error("reader init failed: {0}")]
    InitFailed(String),

    /// Downstream consumer went away.
    #[error("output stream closed")]
    Closed,

    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("der error: {0}")]
    Der(#[from] DerError),

    #[error("chunk error: {0}")]
    Chunk(ChunkError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

impl From<ChunkError> for EnvelopeError {
    fn from(e: ChunkError) -> Self {
        // Surface the protocol-level variant instead of burying it.
        match e {
            ChunkError::UnknownChunkId { id } => EnvelopeError::UnknownChunkId { id },
            other => EnvelopeError::Chunk(other),
        }
    }
}

/// Envelope operation, fixed for the lifetime of one envelope.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum OperationType {
    Sign = 1,
    PublicEncrypt = 2,
}

impl OperationType {
    #[inline]
    pub fn is_sign(self) -> bool {
        self == OperationType::Sign
    }

    #[inline]
    pub fn is_public_encrypt(self) -> bool {
        self == OperationType::PublicEncrypt
    }

    pub fn verify(raw: u64) -> Result<Self, EnvelopeError> {
        u8::try_from(raw)
            .ok()
            .and_then(|v| OperationType::try_from(v).ok())
            .ok_or_else(|| EnvelopeError::Malformed(format!("unknown operation type {}", raw)))
    }
}

/// Asymmetric key family carried in the DefaultHeader chunk.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum AsymAlgorithmType {
    Ec = 1,
    Rsa = 2,
}

impl AsymAlgorithmType {
    pub fn verify(raw: u64) -> Result<Self, EnvelopeError> {
        u8::try_from(raw)
            .ok()
            .and_then(|v| AsymAlgorithmType::try_from(v).ok())
            .ok_or_else(|| EnvelopeError::Malformed(format!("unknown asymmetric algorithm type {}", raw)))
    }
}
