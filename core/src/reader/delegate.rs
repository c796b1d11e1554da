//! reader/delegate.rs
//! Format version 4 reader state machine (synchronous).
//!
//! Phases: `Signature -> PayloadOpen -> Chunks -> Ended`.
//!
//! Design notes:
//! - Input arrives in arbitrary slices. A record that straddles two slices
//!   stays in `buf` until it is complete; only whole records are decoded.
//! - The first record at or past the Data id (custom ids excluded) raises
//!   [`ReadStep::HeaderComplete`]. From then on the delegate sits in
//!   `KeyState::Awaiting` and queues Data chunks until `init` runs.
//! - Records flagged `ENCRYPT_WITH_AUTH_KEY` are queued opaque and fed back
//!   through the same resolution path once the auth key is known.
//! - Protocol chunks appear at most once and in section order (header,
//!   data, footer). Only the signed fingerprint and the timestamp may follow
//!   the Fingerprint chunk, since nothing after it is covered by the digest.
//! - `init` either succeeds or leaves the delegate as it found it, so a
//!   failed attempt can be retried with other keys.
//! - Integrity is only established by `finish`. Plaintext released before
//!   that is unauthenticated.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use crate::chunks::{
    is_custom_id, split_record, Chunk, ChunkCodec, ChunkFlags, ChunkId, ChunkPayload, ChunkRegistry, DataKeyInfo,
    DefaultHeader, PlainChunk,
};
use crate::constants::{chunk_ids, oids, PAYLOAD_OPEN, SIGNATURE_LEN};
use crate::crypto::{
    derive_auth_keys, derive_ecdh_keys, verify_auth_key, AuthKeys, DataKeys, HashAlgorithm, MacState,
    StreamDecryptor,
};
use crate::custom_chunk::CustomChunk;
use crate::der::{decode::content_to_u64, peek_element, tags};
use crate::fingerprint::FingerprintAccumulator;
use crate::keys::KeyRef;
use crate::reader::params::ReaderParams;
use crate::signature::{delegate_version, SignatureHeader};
use crate::telemetry::{EnvelopeCounters, Stage, TelemetrySnapshot, TelemetryTimer};
use crate::types::{EnvelopeError, OperationType};

/// Delegate state touched by `init`, restored when it fails.
struct InitCheckpoint {
    chunks: HashMap<u32, PlainChunk>,
    custom: BTreeMap<u32, CustomChunk>,
    pending: VecDeque<Chunk>,
    key: Option<KeyRef>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadPhase {
    Signature,
    PayloadOpen,
    Chunks,
    Ended,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum KeyState {
    /// Header not complete yet.
    Header,
    /// Header complete, waiting for `init`.
    Awaiting,
    Ready,
    Finished,
}

/// What one call produced, in stream order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadStep {
    HeaderComplete,
    Custom(CustomChunk),
    Plaintext(Bytes),
}

pub(crate) struct ReaderDelegate {
    registry: std::sync::Arc<ChunkRegistry>,
    phase: ReadPhase,
    key_state: KeyState,
    buf: BytesMut,
    received: u64,
    known_size: Option<u64>,

    operation: Option<OperationType>,
    header: Option<DefaultHeader>,
    fingerprint: FingerprintAccumulator,
    chunks: HashMap<u32, PlainChunk>,
    custom: BTreeMap<u32, CustomChunk>,
    pending: VecDeque<Chunk>,
    /// Non-custom record ids read so far, Data excluded.
    seen_ids: HashSet<u32>,
    data_closed: bool,

    auth: Option<AuthKeys>,
    key: Option<KeyRef>,
    decipher: Option<StreamDecryptor>,
    data_mac: Option<MacState>,

    counters: EnvelopeCounters,
    timer: TelemetryTimer,
}

impl ReaderDelegate {
    pub(crate) fn new(params: &ReaderParams) -> Self {
        let phase = if params.exclude_header { ReadPhase::PayloadOpen } else { ReadPhase::Signature };
        Self {
            registry: params.registry.clone(),
            phase,
            key_state: KeyState::Header,
            buf: BytesMut::new(),
            received: 0,
            known_size: params.known_size,
            operation: None,
            header: None,
            fingerprint: FingerprintAccumulator::new(),
            chunks: HashMap::new(),
            custom: BTreeMap::new(),
            pending: VecDeque::new(),
            seen_ids: HashSet::new(),
            data_closed: false,
            auth: None,
            key: params.key.clone(),
            decipher: None,
            data_mac: None,
            counters: EnvelopeCounters::default(),
            timer: TelemetryTimer::new(),
        }
    }

    pub(crate) fn phase(&self) -> ReadPhase {
        self.phase
    }

    pub(crate) fn operation(&self) -> Option<OperationType> {
        self.operation
    }

    pub(crate) fn header_complete(&self) -> bool {
        self.key_state != KeyState::Header
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self.key_state, KeyState::Ready | KeyState::Finished)
    }

    pub(crate) fn set_known_size(&mut self, size: u64) {
        self.known_size = Some(size);
    }

    pub(crate) fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::from(&self.counters, &self.timer)
    }

    pub(crate) fn custom_chunk(&self, id: u32) -> Result<Option<CustomChunk>, EnvelopeError> {
        if !self.header_complete() {
            return Err(EnvelopeError::HeaderIncomplete);
        }
        Ok(self.custom.get(&id).cloned())
    }

    pub(crate) fn custom_chunks(&self) -> Vec<CustomChunk> {
        self.custom.values().cloned().collect()
    }

    /// RFC3161 token from the Timestamp chunk, if one was present.
    pub(crate) fn timestamp_token(&self) -> Option<Vec<u8>> {
        match self.chunks.get(&chunk_ids::TIMESTAMP).map(|c| &c.payload) {
            Some(ChunkPayload::Timestamp(token)) => Some(token.clone()),
            _ => None,
        }
    }

    /// Computed fingerprint, available once the Fingerprint chunk was seen.
    pub(crate) fn fingerprint(&self) -> Option<Vec<u8>> {
        self.fingerprint.digest().map(<[u8]>::to_vec)
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    pub(crate) fn write(&mut self, input: &[u8]) -> Result<Vec<ReadStep>, EnvelopeError> {
        let accepted = match self.known_size {
            Some(limit) => {
                let room = limit.saturating_sub(self.received);
                &input[..input.len().min(room as usize)]
            }
            None => input,
        };
        self.received += accepted.len() as u64;
        if self.phase == ReadPhase::Ended || accepted.is_empty() {
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(accepted);

        let started = Instant::now();
        let mut steps = Vec::new();
        while self.parse_next(&mut steps)? {}
        self.timer.add_stage_time(Stage::Parse, started.elapsed());
        Ok(steps)
    }

    /// Consume one element from `buf`. `Ok(false)` means more input is needed.
    fn parse_next(&mut self, steps: &mut Vec<ReadStep>) -> Result<bool, EnvelopeError> {
        match self.phase {
            ReadPhase::Signature => {
                let Some(header) = SignatureHeader::parse(&self.buf)? else {
                    return Ok(false);
                };
                delegate_version(header.version)?;
                self.buf.advance(SIGNATURE_LEN);
                self.counters.add_framing(SIGNATURE_LEN);
                self.phase = ReadPhase::PayloadOpen;
                debug!(version = header.version, "envelope signature");
                Ok(true)
            }
            ReadPhase::PayloadOpen => self.parse_payload_open(),
            ReadPhase::Chunks => self.parse_record(steps),
            ReadPhase::Ended => Ok(false),
        }
    }

    /// `30 80`, `INTEGER subVersion`, `ENUMERATED operation`.
    fn parse_payload_open(&mut self) -> Result<bool, EnvelopeError> {
        let seen = self.buf.len().min(PAYLOAD_OPEN.len());
        if self.buf[..seen] != PAYLOAD_OPEN[..seen] {
            return Err(EnvelopeError::Malformed("payload does not open an indefinite sequence".into()));
        }
        if self.buf.len() < PAYLOAD_OPEN.len() {
            return Ok(false);
        }
        let mut pos = PAYLOAD_OPEN.len();
        let mut values = [0u64; 2];
        for (slot, expected) in values.iter_mut().zip([tags::INTEGER, tags::ENUMERATED]) {
            let Some(h) = peek_element(&self.buf[pos..])? else {
                return Ok(false);
            };
            if h.tag != expected {
                return Err(EnvelopeError::Malformed(format!("payload header tag 0x{:02x}", h.tag)));
            }
            let total = h.total_len().ok_or(crate::der::DerError::IndefiniteLength)?;
            *slot = content_to_u64(&self.buf[pos + h.header_len..pos + total])?;
            pos += total;
        }
        let [sub_version, op] = values;
        let operation = OperationType::verify(op)?;
        self.fingerprint.update(&self.buf[..pos]);
        self.counters.add_framing(pos);
        self.buf.advance(pos);
        self.operation = Some(operation);
        self.phase = ReadPhase::Chunks;
        debug!(sub_version, ?operation, "payload opened");
        Ok(true)
    }

    fn parse_record(&mut self, steps: &mut Vec<ReadStep>) -> Result<bool, EnvelopeError> {
        let Some(h) = peek_element(&self.buf)? else {
            return Ok(false);
        };
        if h.is_end_of_contents() {
            self.buf.advance(h.header_len);
            self.counters.add_framing(h.header_len);
            self.raise_header_complete(steps);
            self.phase = ReadPhase::Ended;
            debug!("end of payload");
            return Ok(false);
        }
        let total = h.total_len().ok_or(crate::der::DerError::IndefiniteLength)?;
        let record = self.buf.split_to(total).freeze();
        let (id, flags, data) = split_record(&record)?;
        self.check_record_order(id)?;

        if id == chunk_ids::FINGERPRINT {
            self.fingerprint.freeze();
        } else {
            self.fingerprint.update(&record);
        }
        if id >= chunk_ids::DATA && !is_custom_id(id) {
            self.raise_header_complete(steps);
        }

        let chunk = self.registry.decode_data(id, flags, data)?;
        debug!(id, len = total, encrypted = matches!(chunk, Chunk::Encrypted(_)), "chunk read");
        self.count_record(&chunk, total);
        match chunk {
            Chunk::Encrypted(c) if self.auth.is_some() => {
                let plain = self.unwrap_chunk(&Chunk::Encrypted(c))?;
                self.resolve(plain, steps)?;
            }
            Chunk::Encrypted(c) => self.pending.push_back(Chunk::Encrypted(c)),
            Chunk::Plain(p) => self.resolve(p, steps)?,
        }
        Ok(true)
    }

    /// Reject records that the writer never emits in this position. Runs on
    /// the raw id, before the record is decoded or queued.
    fn check_record_order(&mut self, id: u32) -> Result<(), EnvelopeError> {
        if self.seen_ids.contains(&chunk_ids::FINGERPRINT)
            && id != chunk_ids::SIGNED_FINGERPRINT
            && id != chunk_ids::TIMESTAMP
        {
            return Err(EnvelopeError::Malformed(format!("chunk 0x{:02x} after fingerprint", id)));
        }
        if is_custom_id(id) {
            if self.header_complete() {
                return Err(EnvelopeError::Malformed(format!("custom chunk 0x{:02x} after header", id)));
            }
            return Ok(());
        }
        if id < chunk_ids::DATA && self.header_complete() {
            return Err(EnvelopeError::Malformed(format!("header chunk 0x{:02x} after header", id)));
        }
        if id == chunk_ids::DATA {
            if self.data_closed {
                return Err(EnvelopeError::Malformed("data chunk after footer".into()));
            }
            return Ok(());
        }
        if id > chunk_ids::DATA {
            self.data_closed = true;
        }
        if !self.seen_ids.insert(id) {
            return Err(EnvelopeError::Malformed(format!("duplicate chunk 0x{:02x}", id)));
        }
        Ok(())
    }

    fn count_record(&mut self, chunk: &Chunk, len: usize) {
        let id = chunk.id();
        let auth_encrypted = chunk.flags().contains(ChunkFlags::ENCRYPT_WITH_AUTH_KEY);
        if is_custom_id(id) {
            self.counters.add_custom_chunk(len, auth_encrypted);
        } else if let Chunk::Plain(PlainChunk { payload: ChunkPayload::Data(ct), .. }) = chunk {
            self.counters.add_data_chunk(ct.len(), len);
        } else if id > chunk_ids::DATA {
            self.counters.add_footer_chunk(len);
        } else {
            self.counters.add_header_chunk(len, auth_encrypted);
        }
    }

    fn raise_header_complete(&mut self, steps: &mut Vec<ReadStep>) {
        if self.key_state == KeyState::Header {
            self.key_state = KeyState::Awaiting;
            steps.push(ReadStep::HeaderComplete);
            info!(operation = ?self.operation, pending = self.pending.len(), "envelope header complete");
        }
    }

    fn unwrap_chunk(&self, chunk: &Chunk) -> Result<PlainChunk, EnvelopeError> {
        match chunk {
            Chunk::Plain(p) => Ok(p.clone()),
            Chunk::Encrypted(c) => {
                let auth = self.auth.as_ref().ok_or(EnvelopeError::MissingKeyMaterial("auth key"))?;
                let header = self.header.as_ref().ok_or_else(|| missing_chunk("DefaultHeader"))?;
                let plain = self.registry.unwrap(
                    c,
                    header.chunk_crypto_algorithm,
                    &auth.encrypt_key,
                    &header.auth_key_iv,
                )?;
                Ok(plain)
            }
        }
    }

    /// Route one decoded chunk.
    fn resolve(&mut self, chunk: PlainChunk, steps: &mut Vec<ReadStep>) -> Result<(), EnvelopeError> {
        match &chunk.payload {
            ChunkPayload::DefaultHeader(h) => {
                if self.header.is_some() {
                    return Err(EnvelopeError::Malformed("duplicate DefaultHeader chunk".into()));
                }
                self.fingerprint.select(h.fingerprint_algorithm);
                self.header = Some(h.clone());
            }
            ChunkPayload::Data(ciphertext) => {
                if self.key_state == KeyState::Ready {
                    self.decrypt_data(ciphertext, steps);
                } else {
                    self.pending.push_back(Chunk::Plain(chunk));
                }
                return Ok(());
            }
            ChunkPayload::Custom(_) => {
                if let Some(custom) = CustomChunk::from_plain_chunk(&chunk) {
                    debug!(id = custom.id, len = custom.data.len(), "custom chunk");
                    self.custom.insert(custom.id, custom.clone());
                    steps.push(ReadStep::Custom(custom));
                }
                return Ok(());
            }
            _ => {}
        }
        self.chunks.insert(chunk.id, chunk);
        Ok(())
    }

    fn decrypt_data(&mut self, ciphertext: &[u8], steps: &mut Vec<ReadStep>) {
        let started = Instant::now();
        if let Some(mac) = self.data_mac.as_mut() {
            mac.update(ciphertext);
        }
        let plaintext = match self.decipher.as_mut() {
            Some(d) => d.update(ciphertext),
            None => return,
        };
        self.timer.add_stage_time(Stage::Decrypt, started.elapsed());
        self.counters.add_plaintext(plaintext.len());
        if !plaintext.is_empty() {
            steps.push(ReadStep::Plaintext(Bytes::from(plaintext)));
        }
    }

    // -----------------------------------------------------------------------
    // Key material
    // -----------------------------------------------------------------------

    fn payload(&self, id: ChunkId) -> Option<&ChunkPayload> {
        self.chunks.get(&id.raw()).map(|c| &c.payload)
    }

    /// Resume point after header complete.
    pub(crate) fn init(&mut self, auth_key: &[u8], key: Option<KeyRef>) -> Result<Vec<ReadStep>, EnvelopeError> {
        match self.key_state {
            KeyState::Header => return Err(EnvelopeError::HeaderIncomplete),
            KeyState::Ready | KeyState::Finished => return Ok(Vec::new()),
            KeyState::Awaiting => {}
        }
        let saved = InitCheckpoint {
            chunks: self.chunks.clone(),
            custom: self.custom.clone(),
            pending: self.pending.clone(),
            key: self.key.clone(),
        };
        let result = self.try_init(auth_key, key);
        if let Err(e) = &result {
            debug!(error = %e, "reader init failed, state rolled back");
            self.chunks = saved.chunks;
            self.custom = saved.custom;
            self.pending = saved.pending;
            self.key = saved.key;
            self.auth = None;
            self.decipher = None;
            self.data_mac = None;
        }
        result
    }

    fn try_init(&mut self, auth_key: &[u8], key: Option<KeyRef>) -> Result<Vec<ReadStep>, EnvelopeError> {
        if key.is_some() {
            self.key = key;
        }
        let started = Instant::now();

        // 1. auth key check, before any other secret is touched
        let check = match self.payload(ChunkId::AuthKeyCheckData) {
            Some(ChunkPayload::AuthKeyCheck(check)) => check.clone(),
            _ => return Err(missing_chunk("AuthKeyCheckData")),
        };
        if !verify_auth_key(auth_key, &check.params, &check.key)? {
            return Err(EnvelopeError::AuthKeyMismatch);
        }

        // 2./3. derive, then unwrap everything that was held back
        self.auth = Some(derive_auth_keys(auth_key)?);
        let mut steps = Vec::new();
        let mut held = VecDeque::new();
        for chunk in std::mem::take(&mut self.pending) {
            match chunk {
                Chunk::Encrypted(_) => {
                    let plain = self.unwrap_chunk(&chunk)?;
                    self.resolve(plain, &mut steps)?;
                }
                data => held.push_back(data),
            }
        }
        held.append(&mut self.pending);
        self.pending = held;

        // 4. data key
        let keys = self.resolve_data_keys()?;

        // 5. data decipher
        self.setup_decipher(&keys)?;
        self.key_state = KeyState::Ready;
        self.timer.add_stage_time(Stage::KeyDerivation, started.elapsed());
        info!(operation = ?self.operation, queued = self.pending.len(), "reader initialized");

        // 6. drain in arrival order
        for chunk in std::mem::take(&mut self.pending) {
            if let Chunk::Plain(PlainChunk { payload: ChunkPayload::Data(ciphertext), .. }) = chunk {
                self.decrypt_data(&ciphertext, &mut steps);
            }
        }
        Ok(steps)
    }

    fn resolve_data_keys(&self) -> Result<DataKeys, EnvelopeError> {
        let operation = self.operation.ok_or(EnvelopeError::HeaderIncomplete)?;

        if let Some(ChunkPayload::DataKeyInfo(info)) = self.payload(ChunkId::DataKeyInfo) {
            if !info.is_valid() {
                return Err(EnvelopeError::KeyMismatch("data key info signature".into()));
            }
            return Ok(info.keys.clone());
        }

        if let Some(ChunkPayload::EncryptedDataKeyInfo(wrapped)) = self.payload(ChunkId::EncryptedDataKeyInfo) {
            let key = self.key.as_ref().ok_or(EnvelopeError::MissingKeyMaterial("recipient private key"))?;
            if !key.can_private_decrypt() {
                return Err(EnvelopeError::InvalidKey("key cannot decrypt the data key".into()));
            }
            let plain = key
                .private_decrypt(wrapped)
                .map_err(|e| EnvelopeError::KeyMismatch(format!("data key unwrap: {}", e)))?;
            let info = DataKeyInfo::decode_data(&plain)
                .map_err(|e| EnvelopeError::KeyMismatch(format!("data key info: {}", e)))?;
            if !info.is_valid() {
                return Err(EnvelopeError::KeyMismatch("data key info signature".into()));
            }
            return Ok(info.keys.clone());
        }

        if let Some(ChunkPayload::EphemeralEcPublicKey(spki)) = self.payload(ChunkId::EphemeralEcPublicKey) {
            let key = self.key.as_ref().ok_or(EnvelopeError::MissingKeyMaterial("recipient private key"))?;
            if !key.is_private() || !key.can_key_agreement() {
                return Err(EnvelopeError::InvalidKey("key cannot perform key agreement".into()));
            }
            let secret = key
                .dh_compute_secret(spki)
                .map_err(|e| EnvelopeError::KeyMismatch(format!("key agreement: {}", e)))?;
            let (keys, check) = derive_ecdh_keys(&secret)?;
            let expected = match self.payload(ChunkId::DhCheckData) {
                Some(ChunkPayload::DhCheckData(v)) => v,
                _ => return Err(missing_chunk("DHCheckData")),
            };
            if !bool::from(check.as_slice().ct_eq(expected.as_slice())) {
                return Err(EnvelopeError::KeyMismatch("dh check mismatch".into()));
            }
            return Ok(keys);
        }

        Err(EnvelopeError::Malformed(format!("no data key chunk for {:?}", operation)))
    }

    fn setup_decipher(&mut self, keys: &DataKeys) -> Result<(), EnvelopeError> {
        let header = self.header.as_ref().ok_or_else(|| missing_chunk("DefaultHeader"))?;
        let algorithm = header.data_crypto_algorithm;
        let spec = match self.payload(ChunkId::DataCryptoAlgorithmParameterSpec) {
            Some(ChunkPayload::DataCryptoParameterSpec(raw)) => algorithm.parse_parameter_spec(raw)?,
            _ => return Err(missing_chunk("DataCryptoAlgorithmParameterSpec")),
        };
        let mac_oid = match self.payload(ChunkId::DataMacAlgorithm) {
            Some(ChunkPayload::DataMacAlgorithm(oid)) => oid.clone(),
            _ => return Err(missing_chunk("DataMacAlgorithm")),
        };

        if algorithm.is_gcm() {
            self.decipher = Some(algorithm.decryptor(&keys.data_key, &spec, &keys.mac_key)?);
        } else {
            if mac_oid != oids::HMAC_WITH_SHA256 {
                return Err(EnvelopeError::Malformed(format!("unsupported data mac {}", mac_oid)));
            }
            self.data_mac = Some(HashAlgorithm::Sha256.hmac(&keys.mac_key)?);
            self.decipher = Some(algorithm.decryptor(&keys.data_key, &spec, &[])?);
        }
        debug!(cipher = algorithm.name(), mac = %mac_oid, "data decipher ready");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Finalization
    // -----------------------------------------------------------------------

    /// Verify MAC, fingerprint and (Sign) signature. Returns the last
    /// plaintext bytes held back by the cipher.
    pub(crate) fn finish(&mut self) -> Result<Option<Bytes>, EnvelopeError> {
        match self.key_state {
            KeyState::Finished => return Err(EnvelopeError::Closed),
            KeyState::Ready => {}
            _ => return Err(EnvelopeError::MissingKeyMaterial("reader not initialized")),
        }
        if self.phase != ReadPhase::Ended {
            return Err(EnvelopeError::Malformed("unexpected end of data".into()));
        }
        let started = Instant::now();

        let expected_mac = match self.payload(ChunkId::MacOfEncryptedData) {
            Some(ChunkPayload::MacOfEncryptedData(v)) => v.clone(),
            _ => return Err(EnvelopeError::ValidateFailed("data mac missing".into())),
        };
        let decipher = self
            .decipher
            .take()
            .ok_or(EnvelopeError::MissingKeyMaterial("data decipher"))?;
        let tail = if decipher.is_aead() {
            decipher
                .finalize(Some(&expected_mac))
                .map_err(|_| EnvelopeError::ValidateFailed("data mac mismatch".into()))?
        } else {
            let mac = self
                .data_mac
                .take()
                .ok_or(EnvelopeError::MissingKeyMaterial("data mac"))?;
            if !mac.verify(&expected_mac) {
                return Err(EnvelopeError::ValidateFailed("data mac mismatch".into()));
            }
            decipher
                .finalize(None)
                .map_err(|e| EnvelopeError::ValidateFailed(format!("data padding: {}", e)))?
        };

        let expected_fingerprint = match self.payload(ChunkId::Fingerprint) {
            Some(ChunkPayload::Fingerprint(v)) => v.clone(),
            _ => return Err(EnvelopeError::ValidateFailed("fingerprint missing".into())),
        };
        let computed = self
            .fingerprint
            .digest()
            .ok_or_else(|| EnvelopeError::ValidateFailed("fingerprint not computed".into()))?
            .to_vec();
        if !bool::from(computed.as_slice().ct_eq(expected_fingerprint.as_slice())) {
            return Err(EnvelopeError::ValidateFailed("fingerprint mismatch".into()));
        }

        if self.operation == Some(OperationType::Sign) {
            let signature = match self.payload(ChunkId::SignedFingerprint) {
                Some(ChunkPayload::SignedFingerprint(v)) => v.clone(),
                _ => return Err(EnvelopeError::ValidateFailed("fingerprint signature missing".into())),
            };
            let key = self.key.as_ref().ok_or(EnvelopeError::MissingKeyMaterial("verification key"))?;
            let alg = self.fingerprint.algorithm().unwrap_or(HashAlgorithm::Sha256);
            let valid = key.verify(alg, &computed, &signature).unwrap_or(false);
            if !valid {
                return Err(EnvelopeError::ValidateFailed("fingerprint signature mismatch".into()));
            }
        }

        self.key_state = KeyState::Finished;
        self.counters.add_plaintext(tail.len());
        self.timer.add_stage_time(Stage::Validate, started.elapsed());
        self.timer.finish();
        info!(fingerprint = %hex::encode(&computed), "envelope verified");
        Ok((!tail.is_empty()).then(|| Bytes::from(tail)))
    }
}

fn missing_chunk(name: &str) -> EnvelopeError {
    EnvelopeError::Malformed(format!("missing {} chunk", name))
}
