//! constants.rs
//! Wire-level constants shared by the writer and reader.
//!
//! Industry notes:
//! - Magic prefix + version byte lets a reader route to the right delegate
//!   before touching any payload byte.
//! - Algorithm OIDs are the standard NIST/PKCS arcs so envelopes stay
//!   self-describing to any DER tooling.

/// Fixed stream signature (15 bytes).
pub const MAGIC: [u8; 15] = [
    0x0a, 0x9b, 0xd8, 0x13, 0x97, 0x1f, 0x93, 0xe8, 0x6b, 0x7e, 0xdf, 0x05, 0x70, 0x54, 0x02,
];

/// Magic + 1-byte format version.
pub const SIGNATURE_LEN: usize = MAGIC.len() + 1;

/// The only implemented envelope format.
pub const FORMAT_VERSION: u8 = 4;

/// Sub-version written inside the payload and the DefaultHeader chunk.
pub const PAYLOAD_SUB_VERSION: u64 = 4;
pub const DEFAULT_HEADER_SUB_VERSION: u64 = 1;

/// `0x30 0x80`: indefinite-length SEQUENCE opening the payload.
pub const PAYLOAD_OPEN: [u8; 2] = [0x30, 0x80];
/// End-of-contents marker closing the payload.
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Constant prefix of DataKeyInfo, used to detect a wrong unwrap key.
pub const DATA_KEY_INFO_SIGNATURE: [u8; 4] = [0x01, 0xcf, 0xcb, 0xff];

pub const DATA_KEY_LEN: usize = 32;
pub const MAC_KEY_LEN: usize = 32;
pub const DH_CHECK_LEN: usize = 32;

/// Auth-key KDF parameters.
pub const AUTH_KEY_SALT_LEN: usize = 16;
pub const AUTH_KEY_ITERATIONS: u32 = 4000;
pub const AUTH_KEY_CHECK_LEN: usize = 256;
pub const AUTH_KEY_IV_LEN: usize = 16;
/// HKDF output split in half: encrypt key | mac key.
pub const AUTH_KEY_POOL_LEN: usize = 64;

pub const CBC_IV_LEN: usize = 16;
pub const GCM_NONCE_LEN: usize = 12;
pub const GCM_DEFAULT_ICV_LEN: usize = 12;

/// Defaults for the async fronts.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 16;
pub const DEFAULT_TSA_TIMEOUT_MS: u64 = 3000;

/// Protocol chunk identifiers.
pub mod chunk_ids {
    pub const DEFAULT_HEADER: u32 = 0x01;
    pub const AUTH_KEY_CHECK_DATA: u32 = 0x02;
    pub const ASYM_ALGORITHM_IDENTIFIER: u32 = 0x21;
    pub const DATA_CRYPTO_ALGORITHM_PARAMETER_SPEC: u32 = 0x31;
    pub const DATA_MAC_ALGORITHM: u32 = 0x32;
    pub const EPHEMERAL_EC_PUBLIC_KEY: u32 = 0x33;
    pub const DATA_KEY_INFO: u32 = 0x34;
    pub const ENCRYPTED_DATA_KEY_INFO: u32 = 0x35;
    pub const DH_CHECK_DATA: u32 = 0x39;
    pub const DATA: u32 = 0x70;
    pub const MAC_OF_ENCRYPTED_DATA: u32 = 0x72;
    pub const FINGERPRINT: u32 = 0x76;
    pub const SIGNED_FINGERPRINT: u32 = 0x77;
    pub const TIMESTAMP: u32 = 0x79;
    /// Wire ids at or above this value carry caller-defined chunks.
    pub const CUSTOM_BEGIN: u32 = 0x80;
}

/// Object identifiers (dotted form).
pub mod oids {
    pub const AES_128_CBC: &str = "2.16.840.1.101.3.4.1.2";
    pub const AES_192_CBC: &str = "2.16.840.1.101.3.4.1.22";
    pub const AES_256_CBC: &str = "2.16.840.1.101.3.4.1.42";
    pub const AES_128_GCM: &str = "2.16.840.1.101.3.4.1.6";
    pub const AES_192_GCM: &str = "2.16.840.1.101.3.4.1.26";
    pub const AES_256_GCM: &str = "2.16.840.1.101.3.4.1.46";

    pub const SHA256: &str = "2.16.840.1.101.3.4.2.1";
    pub const SHA384: &str = "2.16.840.1.101.3.4.2.2";
    pub const SHA512: &str = "2.16.840.1.101.3.4.2.3";
    pub const SHA224: &str = "2.16.840.1.101.3.4.2.4";

    pub const HMAC_WITH_SHA256: &str = "1.2.840.113549.2.9";
    /// GMAC (ISO/IEC 9797-3), marks "tag comes from the AEAD".
    pub const GMAC: &str = "1.0.9797.3.4";

    pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
    pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
}
