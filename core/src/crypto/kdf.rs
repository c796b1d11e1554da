// ## src/crypto/kdf.rs

//! crypto/kdf.rs
//! Key derivation: HKDF (RFC 5869) and the PBKDF2 auth-key check.
//!
//! Design:
//! - Auth key -> HKDF-SHA256(zero salt, empty info) -> 64 bytes,
//!   split into `authEncryptKey | authMacKey`.
//! - ECDH secret -> HKDF-SHA256(empty salt) -> 96 bytes,
//!   split into `dataKey | macKey | dhCheck`.
//! - Auth-key check value -> PBKDF2-HMAC-SHA256(authKey, random salt, 4000) -> 256 bytes.
//!
//! Industry notes:
//! - An empty HKDF salt and a HashLen zero salt produce the same PRK
//!   (HMAC pads short keys with zeros), so both paths share one extractor.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{
    AUTH_KEY_CHECK_LEN, AUTH_KEY_ITERATIONS, AUTH_KEY_POOL_LEN, AUTH_KEY_SALT_LEN, DATA_KEY_LEN,
    DH_CHECK_LEN, MAC_KEY_LEN,
};
use crate::crypto::registry::HashAlgorithm;
use crate::crypto::types::CryptoError;

/// HKDF extract-then-expand into `len` bytes.
///
/// Errors:
/// - `len` beyond 255 * HashLen returns `CryptoError::Failure`.
pub fn hkdf_expand(
    alg: HashAlgorithm,
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut okm = vec![0u8; len];
    let failed = |_| CryptoError::Failure(format!("HKDF expand failed ({}, {} bytes)", alg.name(), len));
    match alg {
        HashAlgorithm::Sha224 => Hkdf::<Sha224>::new(salt, ikm).expand(info, &mut okm).map_err(failed)?,
        HashAlgorithm::Sha256 => Hkdf::<Sha256>::new(salt, ikm).expand(info, &mut okm).map_err(failed)?,
        HashAlgorithm::Sha384 => Hkdf::<Sha384>::new(salt, ikm).expand(info, &mut okm).map_err(failed)?,
        HashAlgorithm::Sha512 => Hkdf::<Sha512>::new(salt, ikm).expand(info, &mut okm).map_err(failed)?,
    }
    Ok(okm)
}

/// Keys protecting auth-key-flagged chunks.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthKeys {
    pub encrypt_key: [u8; 32],
    /// Derived for parity with the key schedule; chunk encryption is unauthenticated CBC.
    pub mac_key: [u8; 32],
}

pub fn derive_auth_keys(auth_key: &[u8]) -> Result<AuthKeys, CryptoError> {
    let mut pool = hkdf_expand(HashAlgorithm::Sha256, auth_key, None, &[], AUTH_KEY_POOL_LEN)?;
    let mut keys = AuthKeys { encrypt_key: [0u8; 32], mac_key: [0u8; 32] };
    keys.encrypt_key.copy_from_slice(&pool[..32]);
    keys.mac_key.copy_from_slice(&pool[32..64]);
    pool.zeroize();
    Ok(keys)
}

/// Symmetric secrets protecting the payload.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKeys {
    pub data_key: [u8; DATA_KEY_LEN],
    pub mac_key: [u8; MAC_KEY_LEN],
}

impl DataKeys {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut keys = DataKeys { data_key: [0u8; DATA_KEY_LEN], mac_key: [0u8; MAC_KEY_LEN] };
        rng.fill_bytes(&mut keys.data_key);
        rng.fill_bytes(&mut keys.mac_key);
        keys
    }

    pub fn from_slices(data_key: &[u8], mac_key: &[u8]) -> Result<Self, CryptoError> {
        if data_key.len() != DATA_KEY_LEN {
            return Err(CryptoError::InvalidKeyLen { expected: DATA_KEY_LEN, actual: data_key.len() });
        }
        if mac_key.len() != MAC_KEY_LEN {
            return Err(CryptoError::InvalidKeyLen { expected: MAC_KEY_LEN, actual: mac_key.len() });
        }
        let mut keys = DataKeys { data_key: [0u8; DATA_KEY_LEN], mac_key: [0u8; MAC_KEY_LEN] };
        keys.data_key.copy_from_slice(data_key);
        keys.mac_key.copy_from_slice(mac_key);
        Ok(keys)
    }
}

/// Data keys + DH check value expanded from an ECDH shared secret.
pub fn derive_ecdh_keys(shared_secret: &[u8]) -> Result<(DataKeys, [u8; DH_CHECK_LEN]), CryptoError> {
    let total = DATA_KEY_LEN + MAC_KEY_LEN + DH_CHECK_LEN;
    let mut okm = hkdf_expand(HashAlgorithm::Sha256, shared_secret, Some(&[]), &[], total)?;
    let keys = DataKeys::from_slices(&okm[..DATA_KEY_LEN], &okm[DATA_KEY_LEN..DATA_KEY_LEN + MAC_KEY_LEN])?;
    let mut check = [0u8; DH_CHECK_LEN];
    check.copy_from_slice(&okm[DATA_KEY_LEN + MAC_KEY_LEN..]);
    okm.zeroize();
    Ok((keys, check))
}

/// PBKDF2 parameters as carried in the AuthKeyCheck chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pbkdf2Params {
    pub salt: Vec<u8>,
    pub iterations: u32,
    /// PRF OID; only hmacWithSHA256 is produced or accepted.
    pub prf_oid: String,
}

impl Pbkdf2Params {
    pub fn random() -> Self {
        let mut salt = vec![0u8; AUTH_KEY_SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self {
            salt,
            iterations: AUTH_KEY_ITERATIONS,
            prf_oid: crate::constants::oids::HMAC_WITH_SHA256.to_string(),
        }
    }
}

/// Password-derived check value.
pub fn auth_key_check_value(auth_key: &[u8], params: &Pbkdf2Params) -> Result<Vec<u8>, CryptoError> {
    if params.prf_oid != crate::constants::oids::HMAC_WITH_SHA256 {
        return Err(CryptoError::UnknownAlgorithm(params.prf_oid.clone()));
    }
    if params.iterations == 0 {
        return Err(CryptoError::Failure("pbkdf2 iteration count is zero".into()));
    }
    let mut out = vec![0u8; AUTH_KEY_CHECK_LEN];
    pbkdf2_hmac::<Sha256>(auth_key, &params.salt, params.iterations, &mut out);
    Ok(out)
}

/// Recompute and compare in constant time.
pub fn verify_auth_key(auth_key: &[u8], params: &Pbkdf2Params, expected: &[u8]) -> Result<bool, CryptoError> {
    let computed = auth_key_check_value(auth_key, params)?;
    Ok(computed.len() == expected.len() && bool::from(computed.ct_eq(expected)))
}
