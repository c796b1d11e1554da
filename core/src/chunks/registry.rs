//! chunks/registry.rs
//! Explicit id -> decoder table.
//!
//! Design notes:
//! - Built once from a static descriptor list and handed to readers by value
//!   (cheap `Arc` clone); there is no process-global table.
//! - Registration is append-only. Ids at or above `CUSTOM_BEGIN` never enter
//!   the table; they always resolve to the custom decoder.
//! - The `ENCRYPT_WITH_AUTH_KEY` flag short-circuits decoding: such records
//!   become `Chunk::Encrypted` until [`ChunkRegistry::unwrap`] opens them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::chunks::codec::{self, split_record};
use crate::chunks::types::{
    is_custom_id, Chunk, ChunkError, ChunkFlags, ChunkId, ChunkPayload, EncryptedChunk, PlainChunk,
};
use crate::crypto::{CipherAlgorithm, ParameterSpec};
use crate::der::DerReader;

/// Decoder for one chunk's `data` element.
pub type DecodeFn = fn(&[u8]) -> Result<ChunkPayload, ChunkError>;

#[derive(Copy, Clone, Debug)]
pub struct ChunkDescriptor {
    pub id: u32,
    pub name: &'static str,
    pub decode: DecodeFn,
}

const fn descriptor(id: ChunkId, name: &'static str, decode: DecodeFn) -> ChunkDescriptor {
    ChunkDescriptor { id: id as u32, name, decode }
}

/// Every protocol chunk of format version 4.
pub static STANDARD_CHUNKS: &[ChunkDescriptor] = &[
    descriptor(ChunkId::DefaultHeader, "DefaultHeader", codec::decode_default_header),
    descriptor(ChunkId::AuthKeyCheckData, "AuthKeyCheckData", codec::decode_auth_key_check),
    descriptor(ChunkId::AsymAlgorithmIdentifier, "AsymAlgorithmIdentifier", codec::decode_asym_algorithm_identifier),
    descriptor(ChunkId::DataCryptoAlgorithmParameterSpec, "DataCryptoAlgorithmParameterSpec", codec::decode_data_crypto_parameter_spec),
    descriptor(ChunkId::DataMacAlgorithm, "DataMacAlgorithm", codec::decode_data_mac_algorithm),
    descriptor(ChunkId::EphemeralEcPublicKey, "EphemeralECPublicKey", codec::decode_ephemeral_ec_public_key),
    descriptor(ChunkId::DataKeyInfo, "DataKeyInfo", codec::decode_data_key_info),
    descriptor(ChunkId::EncryptedDataKeyInfo, "EncryptedDataKeyInfo", codec::decode_encrypted_data_key_info),
    descriptor(ChunkId::DhCheckData, "DHCheckData", codec::decode_dh_check_data),
    descriptor(ChunkId::Data, "Data", codec::decode_data),
    descriptor(ChunkId::MacOfEncryptedData, "MacOfEncryptedData", codec::decode_mac_of_encrypted_data),
    descriptor(ChunkId::Fingerprint, "Fingerprint", codec::decode_fingerprint),
    descriptor(ChunkId::SignedFingerprint, "SignedFingerprint", codec::decode_signed_fingerprint),
    descriptor(ChunkId::Timestamp, "Timestamp", codec::decode_timestamp),
];

#[derive(Clone, Debug, Default)]
pub struct ChunkRegistry {
    table: BTreeMap<u32, ChunkDescriptor>,
}

impl ChunkRegistry {
    /// Registry without any protocol chunk (custom ids still decode).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for d in STANDARD_CHUNKS {
            registry.table.insert(d.id, *d);
        }
        registry
    }

    /// Shared handle for reader/writer construction.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::standard())
    }

    pub fn register(&mut self, d: ChunkDescriptor) -> Result<(), ChunkError> {
        if is_custom_id(d.id) {
            return Err(ChunkError::ReservedForCustom { id: d.id });
        }
        if self.table.contains_key(&d.id) {
            return Err(ChunkError::AlreadyRegistered { id: d.id });
        }
        self.table.insert(d.id, d);
        Ok(())
    }

    pub fn contains(&self, id: u32) -> bool {
        is_custom_id(id) || self.table.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn name_of(&self, id: u32) -> Option<&'static str> {
        if is_custom_id(id) {
            return Some("CustomData");
        }
        self.table.get(&id).map(|d| d.name)
    }

    fn decoder(&self, id: u32) -> Result<DecodeFn, ChunkError> {
        if is_custom_id(id) {
            return Ok(codec::decode_custom);
        }
        self.table
            .get(&id)
            .map(|d| d.decode)
            .ok_or(ChunkError::UnknownChunkId { id })
    }

    /// Decode the `data` element of a record with the given id/flags.
    pub fn decode_data(&self, id: u32, flags: ChunkFlags, data: &[u8]) -> Result<Chunk, ChunkError> {
        let decode = self.decoder(id)?;
        if flags.contains(ChunkFlags::ENCRYPT_WITH_AUTH_KEY) {
            let mut r = DerReader::new(data);
            let ciphertext = r.read_octet_string()?.to_vec();
            r.finish()?;
            return Ok(Chunk::Encrypted(EncryptedChunk { id, flags, ciphertext }));
        }
        let payload = decode(data)?;
        Ok(Chunk::Plain(PlainChunk { id, flags, payload }))
    }

    /// Decode one complete record.
    pub fn decode_record(&self, record: &[u8]) -> Result<Chunk, ChunkError> {
        let (id, flags, data) = split_record(record)?;
        let chunk = self.decode_data(id, flags, data)?;
        trace!(id, encrypted = matches!(chunk, Chunk::Encrypted(_)), "chunk decoded");
        Ok(chunk)
    }

    /// Open an auth-key encrypted chunk; the flag is kept on the result.
    pub fn unwrap(
        &self,
        chunk: &EncryptedChunk,
        cipher: CipherAlgorithm,
        key: &[u8],
        iv: &[u8],
    ) -> Result<PlainChunk, ChunkError> {
        let decode = self.decoder(chunk.id)?;
        let spec = ParameterSpec { iv: iv.to_vec(), icv_len: None };
        let plain = cipher.open(key, &spec, &chunk.ciphertext)?;
        let payload = decode(&plain)?;
        Ok(PlainChunk { id: chunk.id, flags: chunk.flags, payload })
    }
}
