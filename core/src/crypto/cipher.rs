//! crypto/cipher.rs
//!
//! Streaming AES ciphers for envelope payloads.
//!
//! Design notes:
//! - Input arrives in arbitrary slices; output is produced as soon as whole
//!   blocks are available, so memory stays bounded by one block per state.
//! - CBC uses PKCS#7. The decryptor withholds the last full block until
//!   `finalize` because it may carry padding.
//! - GCM is composed from CTR (32-bit big-endian counter) and GHASH so tag
//!   computation can run incrementally; J0 follows SP 800-38D for any nonce
//!   length, ICVs are truncations of the full 16-byte tag.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;

use crate::crypto::types::{CryptoError, BLOCK_LEN, TAG_LEN};

fn key_rejected(len: usize) -> CryptoError {
    CryptoError::InvalidKeyLen { expected: 32, actual: len }
}

/// Raw block cipher, used for H = E(0) and E(J0).
enum AesBlock {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesBlock {
    fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let block = match key.len() {
            16 => Aes128::new_from_slice(key).map(AesBlock::Aes128),
            24 => Aes192::new_from_slice(key).map(AesBlock::Aes192),
            32 => Aes256::new_from_slice(key).map(AesBlock::Aes256),
            n => return Err(key_rejected(n)),
        };
        block.map_err(|_| key_rejected(key.len()))
    }

    fn encrypt(&self, block: &mut [u8; BLOCK_LEN]) {
        let b = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(b),
            AesBlock::Aes192(c) => c.encrypt_block(b),
            AesBlock::Aes256(c) => c.encrypt_block(b),
        }
    }
}

enum CbcEnc {
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

impl CbcEnc {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let mode = match key.len() {
            16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv).map(CbcEnc::Aes128),
            24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv).map(CbcEnc::Aes192),
            32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv).map(CbcEnc::Aes256),
            n => return Err(key_rejected(n)),
        };
        mode.map_err(|_| CryptoError::InvalidIvLen { expected: BLOCK_LEN, actual: iv.len() })
    }

    fn process(&mut self, block: &mut [u8]) {
        let b = GenericArray::from_mut_slice(block);
        match self {
            CbcEnc::Aes128(c) => c.encrypt_block_mut(b),
            CbcEnc::Aes192(c) => c.encrypt_block_mut(b),
            CbcEnc::Aes256(c) => c.encrypt_block_mut(b),
        }
    }
}

enum CbcDec {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

impl CbcDec {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let mode = match key.len() {
            16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv).map(CbcDec::Aes128),
            24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv).map(CbcDec::Aes192),
            32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv).map(CbcDec::Aes256),
            n => return Err(key_rejected(n)),
        };
        mode.map_err(|_| CryptoError::InvalidIvLen { expected: BLOCK_LEN, actual: iv.len() })
    }

    fn process(&mut self, block: &mut [u8]) {
        let b = GenericArray::from_mut_slice(block);
        match self {
            CbcDec::Aes128(c) => c.decrypt_block_mut(b),
            CbcDec::Aes192(c) => c.decrypt_block_mut(b),
            CbcDec::Aes256(c) => c.decrypt_block_mut(b),
        }
    }
}

enum Ctr {
    Aes128(ctr::Ctr32BE<Aes128>),
    Aes192(ctr::Ctr32BE<Aes192>),
    Aes256(ctr::Ctr32BE<Aes256>),
}

impl Ctr {
    fn new(key: &[u8], counter: &[u8; BLOCK_LEN]) -> Result<Self, CryptoError> {
        let ctr = match key.len() {
            16 => ctr::Ctr32BE::<Aes128>::new_from_slices(key, counter).map(Ctr::Aes128),
            24 => ctr::Ctr32BE::<Aes192>::new_from_slices(key, counter).map(Ctr::Aes192),
            32 => ctr::Ctr32BE::<Aes256>::new_from_slices(key, counter).map(Ctr::Aes256),
            n => return Err(key_rejected(n)),
        };
        ctr.map_err(|_| key_rejected(key.len()))
    }

    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Ctr::Aes128(c) => c.apply_keystream(buf),
            Ctr::Aes192(c) => c.apply_keystream(buf),
            Ctr::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

/// Take every complete block out of `pending`, leaving at least `keep`
/// bytes behind.
fn drain_blocks(pending: &mut Vec<u8>, keep: usize) -> Vec<u8> {
    let avail = pending.len().saturating_sub(keep);
    let ready = avail / BLOCK_LEN * BLOCK_LEN;
    pending.drain(..ready).collect()
}

// ---------------------------------------------------------------------------
// CBC
// ---------------------------------------------------------------------------

pub struct CbcEncryptor {
    mode: CbcEnc,
    pending: Vec<u8>,
}

impl CbcEncryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self { mode: CbcEnc::new(key, iv)?, pending: Vec::with_capacity(BLOCK_LEN) })
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(input);
        let mut out = drain_blocks(&mut self.pending, 0);
        for block in out.chunks_exact_mut(BLOCK_LEN) {
            self.mode.process(block);
        }
        out
    }

    /// PKCS#7 pad and emit the final block (always exactly one block).
    pub fn finalize(mut self) -> Vec<u8> {
        let pad = BLOCK_LEN - self.pending.len();
        let mut block = std::mem::take(&mut self.pending);
        block.resize(BLOCK_LEN, pad as u8);
        self.mode.process(&mut block);
        block
    }
}

pub struct CbcDecryptor {
    mode: CbcDec,
    pending: Vec<u8>,
}

impl CbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self { mode: CbcDec::new(key, iv)?, pending: Vec::with_capacity(2 * BLOCK_LEN) })
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(input);
        // Withhold the last block: it may be the padded one.
        let keep = match self.pending.len() % BLOCK_LEN {
            0 => BLOCK_LEN,
            r => r,
        };
        let mut out = drain_blocks(&mut self.pending, keep);
        for block in out.chunks_exact_mut(BLOCK_LEN) {
            self.mode.process(block);
        }
        out
    }

    pub fn finalize(mut self) -> Result<Vec<u8>, CryptoError> {
        if self.pending.len() != BLOCK_LEN {
            return Err(CryptoError::BadPadding);
        }
        let mut block = std::mem::take(&mut self.pending);
        self.mode.process(&mut block);

        let pad = block[BLOCK_LEN - 1] as usize;
        if pad == 0 || pad > BLOCK_LEN || !block[BLOCK_LEN - pad..].iter().all(|&b| b as usize == pad) {
            return Err(CryptoError::BadPadding);
        }
        block.truncate(BLOCK_LEN - pad);
        Ok(block)
    }
}

// ---------------------------------------------------------------------------
// GCM
// ---------------------------------------------------------------------------

/// Incremental GHASH over AAD then ciphertext.
struct Ghash {
    inner: GHash,
    pending: Vec<u8>,
    aad_len: u64,
    ct_len: u64,
}

impl Ghash {
    fn new(h: &[u8; BLOCK_LEN], aad: &[u8]) -> Self {
        let mut inner = GHash::new(GenericArray::from_slice(h));
        inner.update_padded(aad);
        Self { inner, pending: Vec::with_capacity(BLOCK_LEN), aad_len: aad.len() as u64, ct_len: 0 }
    }

    fn absorb(&mut self, ciphertext: &[u8]) {
        self.ct_len += ciphertext.len() as u64;
        self.pending.extend_from_slice(ciphertext);
        let full = drain_blocks(&mut self.pending, 0);
        if !full.is_empty() {
            self.inner.update_padded(&full);
        }
    }

    fn finish(mut self) -> [u8; BLOCK_LEN] {
        if !self.pending.is_empty() {
            self.inner.update_padded(&self.pending);
        }
        let mut lengths = [0u8; BLOCK_LEN];
        lengths[..8].copy_from_slice(&(self.aad_len * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(self.ct_len * 8).to_be_bytes());
        self.inner.update_padded(&lengths);

        let mut out = [0u8; BLOCK_LEN];
        out.copy_from_slice(self.inner.finalize().as_slice());
        out
    }
}

struct GcmCore {
    ctr: Ctr,
    ghash: Ghash,
    /// E(K, J0), XORed into the GHASH output.
    tag_mask: [u8; BLOCK_LEN],
    icv_len: usize,
}

impl GcmCore {
    fn new(key: &[u8], nonce: &[u8], aad: &[u8], icv_len: usize) -> Result<Self, CryptoError> {
        if icv_len > TAG_LEN {
            return Err(CryptoError::InvalidIcvLen(icv_len));
        }
        let block = AesBlock::new(key)?;

        let mut h = [0u8; BLOCK_LEN];
        block.encrypt(&mut h);

        let mut j0 = [0u8; BLOCK_LEN];
        if nonce.len() == 12 {
            j0[..12].copy_from_slice(nonce);
            j0[15] = 1;
        } else {
            let mut g = GHash::new(GenericArray::from_slice(&h));
            g.update_padded(nonce);
            let mut lengths = [0u8; BLOCK_LEN];
            lengths[8..].copy_from_slice(&((nonce.len() as u64) * 8).to_be_bytes());
            g.update_padded(&lengths);
            j0.copy_from_slice(g.finalize().as_slice());
        }

        let mut tag_mask = j0;
        block.encrypt(&mut tag_mask);

        // Payload keystream starts at inc32(J0).
        let mut counter = j0;
        let c = u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]).wrapping_add(1);
        counter[12..].copy_from_slice(&c.to_be_bytes());

        Ok(Self { ctr: Ctr::new(key, &counter)?, ghash: Ghash::new(&h, aad), tag_mask, icv_len })
    }

    fn tag(self) -> Vec<u8> {
        let s = self.ghash.finish();
        s.iter()
            .zip(self.tag_mask.iter())
            .take(self.icv_len)
            .map(|(a, b)| a ^ b)
            .collect()
    }
}

pub struct GcmEncryptor {
    core: GcmCore,
}

impl GcmEncryptor {
    pub fn new(key: &[u8], nonce: &[u8], aad: &[u8], icv_len: usize) -> Result<Self, CryptoError> {
        Ok(Self { core: GcmCore::new(key, nonce, aad, icv_len)? })
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = input.to_vec();
        self.core.ctr.apply(&mut out);
        self.core.ghash.absorb(&out);
        out
    }

    pub fn finalize(self) -> Vec<u8> {
        self.core.tag()
    }
}

pub struct GcmDecryptor {
    core: GcmCore,
}

impl GcmDecryptor {
    pub fn new(key: &[u8], nonce: &[u8], aad: &[u8], icv_len: usize) -> Result<Self, CryptoError> {
        Ok(Self { core: GcmCore::new(key, nonce, aad, icv_len)? })
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.core.ghash.absorb(input);
        let mut out = input.to_vec();
        self.core.ctr.apply(&mut out);
        out
    }

    pub fn finalize(self, tag: &[u8]) -> Result<(), CryptoError> {
        let expected = self.core.tag();
        if expected.len() == tag.len() && bool::from(expected.ct_eq(tag)) {
            Ok(())
        } else {
            Err(CryptoError::TagMismatch)
        }
    }
}

// ---------------------------------------------------------------------------
// Mode-erased fronts
// ---------------------------------------------------------------------------

/// Trailing output of an encryptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Final ciphertext bytes (CBC padding block; empty for GCM).
    pub tail: Vec<u8>,
    /// Authentication tag (GCM only).
    pub tag: Option<Vec<u8>>,
}

pub enum StreamEncryptor {
    Cbc(CbcEncryptor),
    Gcm(GcmEncryptor),
}

impl StreamEncryptor {
    pub fn cbc(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(StreamEncryptor::Cbc(CbcEncryptor::new(key, iv)?))
    }

    pub fn gcm(key: &[u8], nonce: &[u8], aad: &[u8], icv_len: usize) -> Result<Self, CryptoError> {
        Ok(StreamEncryptor::Gcm(GcmEncryptor::new(key, nonce, aad, icv_len)?))
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        match self {
            StreamEncryptor::Cbc(c) => c.update(input),
            StreamEncryptor::Gcm(c) => c.update(input),
        }
    }

    pub fn finalize(self) -> Sealed {
        match self {
            StreamEncryptor::Cbc(c) => Sealed { tail: c.finalize(), tag: None },
            StreamEncryptor::Gcm(c) => Sealed { tail: Vec::new(), tag: Some(c.finalize()) },
        }
    }
}

pub enum StreamDecryptor {
    Cbc(CbcDecryptor),
    Gcm(GcmDecryptor),
}

impl StreamDecryptor {
    pub fn cbc(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        Ok(StreamDecryptor::Cbc(CbcDecryptor::new(key, iv)?))
    }

    pub fn gcm(key: &[u8], nonce: &[u8], aad: &[u8], icv_len: usize) -> Result<Self, CryptoError> {
        Ok(StreamDecryptor::Gcm(GcmDecryptor::new(key, nonce, aad, icv_len)?))
    }

    #[inline]
    pub fn is_aead(&self) -> bool {
        matches!(self, StreamDecryptor::Gcm(_))
    }

    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        match self {
            StreamDecryptor::Cbc(c) => c.update(input),
            StreamDecryptor::Gcm(c) => c.update(input),
        }
    }

    /// Flush remaining plaintext. GCM requires `tag` and fails on mismatch.
    pub fn finalize(self, tag: Option<&[u8]>) -> Result<Vec<u8>, CryptoError> {
        match self {
            StreamDecryptor::Cbc(c) => c.finalize(),
            StreamDecryptor::Gcm(c) => {
                let tag = tag.ok_or(CryptoError::MissingParameter("authentication tag"))?;
                c.finalize(tag)?;
                Ok(Vec::new())
            }
        }
    }
}
