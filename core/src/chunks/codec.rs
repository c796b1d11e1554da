//! chunks/codec.rs
//! Chunk data codecs and the chunk record framing.
//!
//! Record layout:
//! ```text
//! SEQUENCE { INTEGER id, INTEGER flags, data ANY }
//! ```
//! Structured payloads implement [`ChunkCodec`]; byte payloads are plain
//! OCTET STRINGs and a few carry raw DER (`ANY`).

use crate::chunks::types::{
    AuthKeyCheck, Chunk, ChunkError, ChunkFlags, ChunkId, ChunkPayload, DataKeyInfo, DefaultHeader,
    EncryptedChunk, PlainChunk,
};
use crate::crypto::{CipherAlgorithm, DataKeys, HashAlgorithm, ParameterSpec, Pbkdf2Params};
use crate::der::{encode, DerReader};
use crate::types::AsymAlgorithmType;

/// Encode/decode of a structured chunk payload.
pub trait ChunkCodec: Sized {
    const ID: ChunkId;

    fn encode_data(&self) -> Result<Vec<u8>, ChunkError>;

    fn decode_data(data: &[u8]) -> Result<Self, ChunkError>;
}

fn invalid(id: ChunkId, reason: impl Into<String>) -> ChunkError {
    ChunkError::InvalidPayload { id: id.raw(), reason: reason.into() }
}

impl ChunkCodec for DefaultHeader {
    const ID: ChunkId = ChunkId::DefaultHeader;

    fn encode_data(&self) -> Result<Vec<u8>, ChunkError> {
        let sub_version = encode::integer_u64(self.sub_version);
        let asym = encode::integer_u64(self.asym_algorithm_type as u64);
        let chunk_crypto = encode::oid(self.chunk_crypto_algorithm.oid())?;
        let data_crypto = encode::oid(self.data_crypto_algorithm.oid())?;
        let fingerprint = encode::oid(self.fingerprint_algorithm.oid())?;
        let iv = encode::octet_string(&self.auth_key_iv);
        Ok(encode::sequence(&[&sub_version, &asym, &chunk_crypto, &data_crypto, &fingerprint, &iv]))
    }

    fn decode_data(data: &[u8]) -> Result<Self, ChunkError> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        let sub_version = seq.read_u64()?;
        let raw_type = seq.read_u64()?;
        let asym_algorithm_type = u8::try_from(raw_type)
            .ok()
            .and_then(|v| AsymAlgorithmType::try_from(v).ok())
            .ok_or_else(|| invalid(Self::ID, format!("asymmetric algorithm type {}", raw_type)))?;
        let chunk_crypto_algorithm = CipherAlgorithm::from_oid(&seq.read_oid()?)?;
        let data_crypto_algorithm = CipherAlgorithm::from_oid(&seq.read_oid()?)?;
        let fingerprint_algorithm = HashAlgorithm::from_oid(&seq.read_oid()?)?;
        let auth_key_iv = seq.read_octet_string()?.to_vec();
        seq.finish()?;
        outer.finish()?;
        Ok(Self {
            sub_version,
            asym_algorithm_type,
            chunk_crypto_algorithm,
            data_crypto_algorithm,
            fingerprint_algorithm,
            auth_key_iv,
        })
    }
}

impl ChunkCodec for AuthKeyCheck {
    const ID: ChunkId = ChunkId::AuthKeyCheckData;

    fn encode_data(&self) -> Result<Vec<u8>, ChunkError> {
        let salt = encode::octet_string(&self.params.salt);
        let iterations = encode::integer_u64(self.params.iterations as u64);
        let prf = encode::algorithm_identifier(&self.params.prf_oid, Some(encode::null().as_slice()))?;
        let params = encode::sequence(&[&salt, &iterations, &prf]);
        let key = encode::octet_string(&self.key);
        Ok(encode::sequence(&[&params, &key]))
    }

    fn decode_data(data: &[u8]) -> Result<Self, ChunkError> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;

        let mut params = seq.read_sequence()?;
        let salt = params.read_octet_string()?.to_vec();
        let iterations = u32::try_from(params.read_u64()?)
            .map_err(|_| invalid(Self::ID, "iteration count out of range"))?;
        let mut prf = params.read_sequence()?;
        let prf_oid = prf.read_oid()?;
        // parameters are NULL or absent
        if !prf.is_empty() {
            prf.read_null()?;
        }
        prf.finish()?;
        params.finish()?;

        let key = seq.read_octet_string()?.to_vec();
        seq.finish()?;
        outer.finish()?;
        Ok(Self { params: Pbkdf2Params { salt, iterations, prf_oid }, key })
    }
}

impl ChunkCodec for DataKeyInfo {
    const ID: ChunkId = ChunkId::DataKeyInfo;

    fn encode_data(&self) -> Result<Vec<u8>, ChunkError> {
        let signature = encode::octet_string(&self.signature);
        let data_key = encode::octet_string(&self.keys.data_key);
        let mac_key = encode::octet_string(&self.keys.mac_key);
        Ok(encode::sequence(&[&signature, &data_key, &mac_key]))
    }

    fn decode_data(data: &[u8]) -> Result<Self, ChunkError> {
        let mut outer = DerReader::new(data);
        let mut seq = outer.read_sequence()?;
        let signature = seq.read_octet_string()?.to_vec();
        let data_key = seq.read_octet_string()?;
        let mac_key = seq.read_octet_string()?;
        seq.finish()?;
        outer.finish()?;
        let keys = DataKeys::from_slices(data_key, mac_key)?;
        Ok(Self { signature, keys })
    }
}

fn decode_octets(data: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut r = DerReader::new(data);
    let value = r.read_octet_string()?.to_vec();
    r.finish()?;
    Ok(value)
}

fn decode_any(data: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut r = DerReader::new(data);
    let value = r.read_any_raw()?.to_vec();
    r.finish()?;
    Ok(value)
}

fn decode_algorithm_oid(data: &[u8]) -> Result<String, ChunkError> {
    let mut outer = DerReader::new(data);
    let mut seq = outer.read_sequence()?;
    let oid = seq.read_oid()?;
    // optional parameters are ignored
    outer.finish()?;
    Ok(oid)
}

// Per-id decoders referenced by the chunk registry.

pub(crate) fn decode_default_header(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::DefaultHeader(DefaultHeader::decode_data(data)?))
}

pub(crate) fn decode_auth_key_check(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::AuthKeyCheck(AuthKeyCheck::decode_data(data)?))
}

pub(crate) fn decode_asym_algorithm_identifier(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::AsymAlgorithmIdentifier(decode_any(data)?))
}

pub(crate) fn decode_data_crypto_parameter_spec(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::DataCryptoParameterSpec(decode_any(data)?))
}

pub(crate) fn decode_data_mac_algorithm(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::DataMacAlgorithm(decode_algorithm_oid(data)?))
}

pub(crate) fn decode_ephemeral_ec_public_key(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::EphemeralEcPublicKey(decode_any(data)?))
}

pub(crate) fn decode_data_key_info(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::DataKeyInfo(DataKeyInfo::decode_data(data)?))
}

pub(crate) fn decode_encrypted_data_key_info(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::EncryptedDataKeyInfo(decode_octets(data)?))
}

pub(crate) fn decode_dh_check_data(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::DhCheckData(decode_octets(data)?))
}

pub(crate) fn decode_data(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::Data(decode_octets(data)?))
}

pub(crate) fn decode_mac_of_encrypted_data(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::MacOfEncryptedData(decode_octets(data)?))
}

pub(crate) fn decode_fingerprint(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::Fingerprint(decode_octets(data)?))
}

pub(crate) fn decode_signed_fingerprint(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::SignedFingerprint(decode_octets(data)?))
}

pub(crate) fn decode_timestamp(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::Timestamp(decode_any(data)?))
}

pub(crate) fn decode_custom(data: &[u8]) -> Result<ChunkPayload, ChunkError> {
    Ok(ChunkPayload::Custom(decode_octets(data)?))
}

/// DER of a payload's `data` element.
pub fn encode_payload(payload: &ChunkPayload) -> Result<Vec<u8>, ChunkError> {
    Ok(match payload {
        ChunkPayload::DefaultHeader(h) => h.encode_data()?,
        ChunkPayload::AuthKeyCheck(c) => c.encode_data()?,
        ChunkPayload::DataKeyInfo(k) => k.encode_data()?,
        ChunkPayload::DataMacAlgorithm(oid) => encode::algorithm_identifier(oid, None)?,
        ChunkPayload::AsymAlgorithmIdentifier(raw)
        | ChunkPayload::DataCryptoParameterSpec(raw)
        | ChunkPayload::EphemeralEcPublicKey(raw)
        | ChunkPayload::Timestamp(raw) => raw.clone(),
        ChunkPayload::EncryptedDataKeyInfo(b)
        | ChunkPayload::DhCheckData(b)
        | ChunkPayload::Data(b)
        | ChunkPayload::MacOfEncryptedData(b)
        | ChunkPayload::Fingerprint(b)
        | ChunkPayload::SignedFingerprint(b)
        | ChunkPayload::Custom(b) => encode::octet_string(b),
    })
}

/// Complete chunk record.
pub fn encode_record(id: u32, flags: ChunkFlags, data: &[u8]) -> Vec<u8> {
    let id = encode::integer_u64(id as u64);
    let flags = encode::integer_u64(flags.bits() as u64);
    encode::sequence(&[&id, &flags, data])
}

impl PlainChunk {
    pub fn encode(&self) -> Result<Vec<u8>, ChunkError> {
        Ok(encode_record(self.id, self.flags, &encode_payload(&self.payload)?))
    }

    /// Encrypt the payload DER under the auth-key cipher.
    pub fn seal(
        &self,
        cipher: CipherAlgorithm,
        key: &[u8],
        iv: &[u8],
    ) -> Result<EncryptedChunk, ChunkError> {
        let plain = encode_payload(&self.payload)?;
        let spec = ParameterSpec { iv: iv.to_vec(), icv_len: None };
        let ciphertext = cipher.seal(key, &spec, &plain)?;
        Ok(EncryptedChunk { id: self.id, flags: self.flags, ciphertext })
    }
}

impl EncryptedChunk {
    pub fn encode(&self) -> Vec<u8> {
        encode_record(self.id, self.flags, &encode::octet_string(&self.ciphertext))
    }
}

impl Chunk {
    pub fn encode(&self) -> Result<Vec<u8>, ChunkError> {
        match self {
            Chunk::Plain(c) => c.encode(),
            Chunk::Encrypted(c) => Ok(c.encode()),
        }
    }
}

/// Split a record into `(id, flags, raw data element)`.
pub fn split_record(record: &[u8]) -> Result<(u32, ChunkFlags, &[u8]), ChunkError> {
    let mut outer = DerReader::new(record);
    let mut seq = outer.read_sequence()?;
    let raw_id = seq.read_u64()?;
    let id = u32::try_from(raw_id).map_err(|_| ChunkError::UnknownChunkId { id: u32::MAX })?;
    let raw_flags = seq.read_u64()?;
    let flags = u32::try_from(raw_flags)
        .ok()
        .map(ChunkFlags::from_bits_retain)
        .ok_or(ChunkError::InvalidPayload { id, reason: format!("flags {}", raw_flags) })?;
    let data = seq.read_any_raw()?;
    seq.finish()?;
    outer.finish()?;
    Ok((id, flags, data))
}
