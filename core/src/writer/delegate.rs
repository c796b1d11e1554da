//! writer/delegate.rs
//! Format version 4 writer state machine (synchronous).
//!
//! States: `Initializing -> WritingHeader -> WritingData -> Finished`.
//!
//! Design notes:
//! - Every method returns the encoded pieces it produced; the async front
//!   pushes them downstream. Nothing here blocks or awaits.
//! - Fingerprint input is the payload from the `30 80` opener up to (not
//!   including) the Fingerprint chunk. The signature prefix is never hashed.
//! - Chunks flagged `ENCRYPT_WITH_AUTH_KEY` are sealed with the auth-key
//!   cipher right before encoding.

use std::time::Instant;

use bytes::Bytes;
use rand::RngCore;
use tracing::{debug, info};

use crate::chunks::{
    AuthKeyCheck, ChunkCodec, ChunkFlags, ChunkId, ChunkPayload, DataKeyInfo, DefaultHeader,
    PlainChunk,
};
use crate::constants::{
    oids, AUTH_KEY_IV_LEN, DEFAULT_HEADER_SUB_VERSION, END_MARKER, PAYLOAD_OPEN,
    PAYLOAD_SUB_VERSION,
};
use crate::crypto::{
    auth_key_check_value, derive_auth_keys, derive_ecdh_keys, AuthKeys, CipherAlgorithm, DataKeys,
    HashAlgorithm, MacState, Pbkdf2Params, StreamEncryptor,
};
use crate::custom_chunk::CustomChunk;
use crate::der::encode;
use crate::fingerprint::FingerprintAccumulator;
use crate::keys::KeyRef;
use crate::signature::SignatureHeader;
use crate::telemetry::{EnvelopeCounters, Stage, TelemetrySnapshot, TelemetryTimer};
use crate::types::{AsymAlgorithmType, EnvelopeError, OperationType};
use crate::writer::params::WriterParams;

/// Cipher for auth-key flagged chunks.
const CHUNK_CRYPTO_ALGORITHM: CipherAlgorithm = CipherAlgorithm::Aes256Cbc;
const FINGERPRINT_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteState {
    Initializing,
    WritingHeader,
    WritingData,
    Finished,
}

/// Data-key material chosen by the key-agreement branch.
struct KeySetup {
    keys: DataKeys,
    ephemeral_public_key: Option<Vec<u8>>,
    dh_check: Option<Vec<u8>>,
}

pub(crate) struct WriterDelegate {
    operation: OperationType,
    auth_key: zeroize::Zeroizing<Vec<u8>>,
    key: KeyRef,
    exclude_header: bool,
    version: u8,

    state: WriteState,
    fingerprint: FingerprintAccumulator,
    auth: Option<AuthKeys>,
    auth_key_iv: Vec<u8>,
    data_algorithm: CipherAlgorithm,
    data_cipher: Option<StreamEncryptor>,
    data_mac: Option<MacState>,

    counters: EnvelopeCounters,
    timer: TelemetryTimer,
}

impl WriterDelegate {
    pub(crate) fn new(params: &WriterParams) -> Self {
        let data_algorithm = if params.operation.is_public_encrypt() {
            CipherAlgorithm::Aes256Gcm
        } else {
            CipherAlgorithm::Aes256Cbc
        };
        Self {
            operation: params.operation,
            auth_key: params.auth_key.clone(),
            key: params.key.clone(),
            exclude_header: params.exclude_header,
            version: params.version,
            state: WriteState::Initializing,
            fingerprint: FingerprintAccumulator::with_algorithm(FINGERPRINT_ALGORITHM),
            auth: None,
            auth_key_iv: Vec::new(),
            data_algorithm,
            data_cipher: None,
            data_mac: None,
            counters: EnvelopeCounters::default(),
            timer: TelemetryTimer::new(),
        }
    }

    pub(crate) fn state(&self) -> WriteState {
        self.state
    }

    pub(crate) fn fingerprint_algorithm(&self) -> HashAlgorithm {
        FINGERPRINT_ALGORITHM
    }

    pub(crate) fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::from(&self.counters, &self.timer)
    }

    fn ensure_open(&self) -> Result<(), EnvelopeError> {
        if self.state == WriteState::Finished {
            return Err(EnvelopeError::Closed);
        }
        Ok(())
    }

    /// Hashed payload bytes outside any chunk.
    fn payload_bytes(&mut self, bytes: Vec<u8>) -> Bytes {
        self.fingerprint.update(&bytes);
        self.counters.add_framing(bytes.len());
        Bytes::from(bytes)
    }

    fn encode_chunk(&mut self, chunk: &PlainChunk) -> Result<Vec<u8>, EnvelopeError> {
        let encoded = if chunk.wants_auth_encryption() {
            let auth = self
                .auth
                .as_ref()
                .ok_or(EnvelopeError::MissingKeyMaterial("auth keys not derived"))?;
            chunk
                .seal(CHUNK_CRYPTO_ALGORITHM, &auth.encrypt_key, &self.auth_key_iv)?
                .encode()
        } else {
            chunk.encode()?
        };
        self.fingerprint.update(&encoded);
        debug!(
            id = chunk.id,
            kind = chunk.payload.kind(),
            len = encoded.len(),
            encrypted = chunk.wants_auth_encryption(),
            "chunk written"
        );
        Ok(encoded)
    }

    fn header_chunk(&mut self, chunk: PlainChunk) -> Result<Bytes, EnvelopeError> {
        let encoded = self.encode_chunk(&chunk)?;
        self.counters.add_header_chunk(encoded.len(), chunk.wants_auth_encryption());
        Ok(Bytes::from(encoded))
    }

    fn footer_chunk(&mut self, chunk: PlainChunk) -> Result<Bytes, EnvelopeError> {
        let encoded = self.encode_chunk(&chunk)?;
        self.counters.add_footer_chunk(encoded.len());
        Ok(Bytes::from(encoded))
    }

    fn data_chunk(&mut self, ciphertext: Vec<u8>) -> Result<Bytes, EnvelopeError> {
        if let Some(mac) = self.data_mac.as_mut() {
            mac.update(&ciphertext);
        }
        let ct_len = ciphertext.len();
        let chunk = PlainChunk::new(ChunkId::Data, ChunkPayload::Data(ciphertext));
        let encoded = self.encode_chunk(&chunk)?;
        self.counters.add_data_chunk(ct_len, encoded.len());
        Ok(Bytes::from(encoded))
    }

    /// Pick the data key: random + wrapped, or ephemeral ECDH.
    fn key_setup(&self) -> Result<KeySetup, EnvelopeError> {
        if self.operation.is_sign() || self.key.can_public_encrypt() {
            return Ok(KeySetup { keys: DataKeys::random(), ephemeral_public_key: None, dh_check: None });
        }
        let ephemeral = self.key.generate_key_pair()?;
        let secret = ephemeral.dh_compute_secret(&self.key.export_spki_der()?)?;
        let (keys, check) = derive_ecdh_keys(&secret)?;
        Ok(KeySetup {
            keys,
            ephemeral_public_key: Some(ephemeral.export_spki_der()?),
            dh_check: Some(check.to_vec()),
        })
    }

    /// Emit prefix and header section. No-op once past `Initializing`.
    pub(crate) fn init(&mut self) -> Result<Vec<Bytes>, EnvelopeError> {
        self.ensure_open()?;
        if self.state > WriteState::Initializing {
            return Ok(Vec::new());
        }
        let started = Instant::now();

        // 1. auth-key check value (never encrypted)
        let pbkdf2 = Pbkdf2Params::random();
        let check = auth_key_check_value(&self.auth_key, &pbkdf2)?;
        let auth_key_check = AuthKeyCheck { params: pbkdf2, key: check };

        // 2. auth keys for flagged chunks
        let kdf_started = Instant::now();
        self.auth = Some(derive_auth_keys(&self.auth_key)?);
        let mut iv = vec![0u8; AUTH_KEY_IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        self.auth_key_iv = iv;

        // 3. data key
        let setup = self.key_setup()?;
        self.timer.add_stage_time(Stage::KeyDerivation, kdf_started.elapsed());

        let data_key_info = DataKeyInfo::new(setup.keys.clone());
        let encrypted_data_key_info = if setup.ephemeral_public_key.is_none() && self.operation.is_public_encrypt() {
            Some(self.key.public_encrypt(&data_key_info.encode_data()?)?)
        } else {
            None
        };

        // 4./5. data cipher; AEAD binds the mac key, CBC gets an HMAC
        let spec = self.data_algorithm.generate_parameter_spec();
        let (cipher, mac_oid) = if self.data_algorithm.is_gcm() {
            (self.data_algorithm.encryptor(&setup.keys.data_key, &spec, &setup.keys.mac_key)?, oids::GMAC)
        } else {
            self.data_mac = Some(HashAlgorithm::Sha256.hmac(&setup.keys.mac_key)?);
            (self.data_algorithm.encryptor(&setup.keys.data_key, &spec, &[])?, oids::HMAC_WITH_SHA256)
        };
        self.data_cipher = Some(cipher);

        // 6. emission
        let mut out = Vec::new();
        if !self.exclude_header {
            let prefix = SignatureHeader::new(self.version).encode();
            self.counters.add_framing(prefix.len());
            out.push(Bytes::copy_from_slice(&prefix));
        }

        let mut opener = PAYLOAD_OPEN.to_vec();
        opener.extend_from_slice(&encode::integer_u64(PAYLOAD_SUB_VERSION));
        opener.extend_from_slice(&encode::enumerated(self.operation as u64));
        out.push(self.payload_bytes(opener));

        let asym_type = self.key.algorithm_type();
        let header = DefaultHeader {
            sub_version: DEFAULT_HEADER_SUB_VERSION,
            asym_algorithm_type: asym_type,
            chunk_crypto_algorithm: CHUNK_CRYPTO_ALGORITHM,
            data_crypto_algorithm: self.data_algorithm,
            fingerprint_algorithm: FINGERPRINT_ALGORITHM,
            auth_key_iv: self.auth_key_iv.clone(),
        };
        out.push(self.header_chunk(PlainChunk::new(ChunkId::DefaultHeader, ChunkPayload::DefaultHeader(header)))?);
        out.push(self.header_chunk(PlainChunk::new(
            ChunkId::AuthKeyCheckData,
            ChunkPayload::AuthKeyCheck(auth_key_check),
        ))?);

        if asym_type == AsymAlgorithmType::Ec {
            let algorithm = self.key.algorithm_identifier_der()?;
            out.push(self.header_chunk(PlainChunk::new(
                ChunkId::AsymAlgorithmIdentifier,
                ChunkPayload::AsymAlgorithmIdentifier(algorithm),
            ))?);
        }

        out.push(self.header_chunk(PlainChunk::new(
            ChunkId::DataCryptoAlgorithmParameterSpec,
            ChunkPayload::DataCryptoParameterSpec(self.data_algorithm.encode_parameter_spec(&spec)),
        ))?);

        if let Some(spki) = setup.ephemeral_public_key {
            out.push(self.header_chunk(PlainChunk::new(
                ChunkId::EphemeralEcPublicKey,
                ChunkPayload::EphemeralEcPublicKey(spki),
            ))?);
        }
        if let Some(check) = setup.dh_check {
            out.push(self.header_chunk(
                PlainChunk::new(ChunkId::DhCheckData, ChunkPayload::DhCheckData(check))
                    .with_flags(ChunkFlags::ENCRYPT_WITH_AUTH_KEY),
            )?);
        }

        out.push(self.header_chunk(PlainChunk::new(
            ChunkId::DataMacAlgorithm,
            ChunkPayload::DataMacAlgorithm(mac_oid.to_string()),
        ))?);

        match encrypted_data_key_info {
            Some(wrapped) => out.push(self.header_chunk(PlainChunk::new(
                ChunkId::EncryptedDataKeyInfo,
                ChunkPayload::EncryptedDataKeyInfo(wrapped),
            ))?),
            None if self.operation.is_sign() || self.key.can_public_encrypt() => out.push(self.header_chunk(
                PlainChunk::new(ChunkId::DataKeyInfo, ChunkPayload::DataKeyInfo(data_key_info))
                    .with_flags(ChunkFlags::ENCRYPT_WITH_AUTH_KEY),
            )?),
            None => {}
        }

        self.state = WriteState::WritingHeader;
        self.timer.add_stage_time(Stage::Header, started.elapsed());
        info!(
            operation = ?self.operation,
            asym = ?asym_type,
            cipher = self.data_algorithm.name(),
            "envelope header written"
        );
        Ok(out)
    }

    pub(crate) fn add_custom_chunk(&mut self, chunk: &CustomChunk) -> Result<Vec<Bytes>, EnvelopeError> {
        let mut out = self.init()?;
        if self.state >= WriteState::WritingData {
            return Err(EnvelopeError::NotAllowedAfterData);
        }
        let plain = chunk.to_plain_chunk()?;
        let encoded = self.encode_chunk(&plain)?;
        self.counters.add_custom_chunk(encoded.len(), plain.wants_auth_encryption());
        out.push(Bytes::from(encoded));
        Ok(out)
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<Vec<Bytes>, EnvelopeError> {
        let mut out = self.init()?;
        self.state = WriteState::WritingData;
        let started = Instant::now();
        let cipher = self
            .data_cipher
            .as_mut()
            .ok_or(EnvelopeError::MissingKeyMaterial("data cipher not initialized"))?;
        let ciphertext = cipher.update(data);
        self.timer.add_stage_time(Stage::Encrypt, started.elapsed());
        self.counters.add_plaintext(data.len());
        if !ciphertext.is_empty() {
            out.push(self.data_chunk(ciphertext)?);
        }
        Ok(out)
    }

    /// Last Data chunk, MacOfEncryptedData, Fingerprint and (Sign) SignedFingerprint.
    ///
    /// Returns the pieces and the fingerprint for the timestamp request.
    pub(crate) fn finish_body(&mut self) -> Result<(Vec<Bytes>, Vec<u8>), EnvelopeError> {
        let mut out = self.init()?;
        self.state = WriteState::WritingData;

        let cipher = self
            .data_cipher
            .take()
            .ok_or(EnvelopeError::MissingKeyMaterial("data cipher not initialized"))?;
        let sealed = cipher.finalize();
        if !sealed.tail.is_empty() {
            out.push(self.data_chunk(sealed.tail)?);
        }

        let mac = match (sealed.tag, self.data_mac.take()) {
            (Some(tag), _) => tag,
            (None, Some(mac)) => mac.finalize(),
            (None, None) => return Err(EnvelopeError::MissingKeyMaterial("data mac not initialized")),
        };
        out.push(self.footer_chunk(PlainChunk::new(ChunkId::MacOfEncryptedData, ChunkPayload::MacOfEncryptedData(mac)))?);

        let fingerprint = self
            .fingerprint
            .freeze()
            .ok_or(EnvelopeError::MissingKeyMaterial("fingerprint algorithm not selected"))?;
        out.push(self.footer_chunk(PlainChunk::new(ChunkId::Fingerprint, ChunkPayload::Fingerprint(fingerprint.clone())))?);
        info!(fingerprint = %hex::encode(&fingerprint), "envelope fingerprint");

        if self.operation.is_sign() {
            let signature = self.key.sign(FINGERPRINT_ALGORITHM, &fingerprint)?;
            out.push(self.footer_chunk(PlainChunk::new(
                ChunkId::SignedFingerprint,
                ChunkPayload::SignedFingerprint(signature),
            ))?);
        }
        Ok((out, fingerprint))
    }

    pub(crate) fn timestamp_chunk(&mut self, token: Vec<u8>) -> Result<Bytes, EnvelopeError> {
        self.footer_chunk(PlainChunk::new(ChunkId::Timestamp, ChunkPayload::Timestamp(token)))
    }

    pub(crate) fn terminate(&mut self) -> Bytes {
        self.state = WriteState::Finished;
        self.counters.add_framing(END_MARKER.len());
        self.timer.finish();
        info!(
            chunks = self.counters.total_chunks(),
            bytes = self.counters.envelope_bytes(),
            "envelope finished"
        );
        Bytes::from_static(&END_MARKER)
    }

    pub(crate) fn record_stage(&mut self, stage: Stage, started: Instant) {
        self.timer.add_stage_time(stage, started.elapsed());
    }
}
