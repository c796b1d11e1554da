// ## 📂 File: `src/crypto/types.rs`

use crate::der::DerError;

/// AES block size (bytes), shared by CBC and GCM.
pub const BLOCK_LEN: usize = 16;

/// Full GHASH tag length; shorter ICVs are truncations of it.
pub const TAG_LEN: usize = 16;

/// Smallest ICV length we accept for GCM.
pub const MIN_ICV_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Name or OID not present in the algorithm registry.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Invalid key length provided to cipher.
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    /// IV / nonce length not usable for the selected mode.
    #[error("invalid iv length: expected={expected}, actual={actual}")]
    InvalidIvLen { expected: usize, actual: usize },

    /// GCM ICV length outside 12..=16.
    #[error("invalid icv length: {0}")]
    InvalidIcvLen(usize),

    /// CBC padding did not verify.
    #[error("bad padding")]
    BadPadding,

    /// AEAD tag mismatch (authentication failure).
    #[error("AEAD tag mismatch")]
    TagMismatch,

    /// Parameter spec missing for a mode that needs one.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Parameter spec did not decode.
    #[error("parameter spec: {0}")]
    ParameterSpec(#[from] DerError),

    /// General derivation or runtime error with context.
    #[error("crypto failure: {0}")]
    Failure(String),
}
