// # 📂 `tests/common/mod.rs`
// Shared fixtures: keys, one-shot seal/open helpers, record walking.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use envelope_core::chunks::split_record;
use envelope_core::constants::{PAYLOAD_OPEN, SIGNATURE_LEN};
use envelope_core::der::peek_element;
use envelope_core::prelude::*;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; `RUST_LOG=envelope_core=debug`
/// shows the chunk-level trace.
pub fn init_tracing() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    Ec,
    Rsa,
}

pub const AUTH_KEY: &str = "1234";

fn shared_rsa() -> &'static RsaKey {
    static KEY: OnceLock<RsaKey> = OnceLock::new();
    KEY.get_or_init(|| RsaKey::generate(2048).unwrap())
}

/// `(private, public)` handles for one key family.
pub fn key_pair(family: Family) -> (KeyRef, KeyRef) {
    match family {
        Family::Ec => {
            let key = EcKey::generate();
            let public = key.public_key();
            (Arc::new(key), Arc::new(public))
        }
        Family::Rsa => {
            let key = shared_rsa().clone();
            let public = key.public_key();
            (Arc::new(key), Arc::new(public))
        }
    }
}

/// Writer-side key for `op`: private for Sign, public for PublicEncrypt.
/// The reader gets the other half.
pub fn keys_for(op: OperationType, family: Family) -> (KeyRef, KeyRef) {
    let (private, public) = key_pair(family);
    match op {
        OperationType::Sign => (private, public),
        OperationType::PublicEncrypt => (public, private),
    }
}

pub async fn seal(
    op: OperationType,
    key: KeyRef,
    custom: Vec<CustomChunk>,
    parts: &[&[u8]],
) -> Vec<u8> {
    init_tracing();
    let params = WriterParams::builder(op, AUTH_KEY, key).build().unwrap();
    let (writer, stream) = Writer::new(params).unwrap();
    let collector = tokio::spawn(stream.collect_bytes());
    for chunk in custom {
        writer.add_custom_chunk(chunk).await.unwrap();
    }
    for part in parts {
        writer.write(Bytes::copy_from_slice(part)).await.unwrap();
    }
    writer.finish().await.unwrap();
    collector.await.unwrap().unwrap()
}

/// Everything a read produced, plus the first error.
#[derive(Debug)]
pub struct Opened {
    pub plaintext: Vec<u8>,
    pub events: Vec<ReaderEvent>,
    pub result: Result<(), EnvelopeError>,
}

/// Auto-initializing read, input fed in `split`-sized pieces.
pub async fn open(envelope: &[u8], auth_key: &str, key: KeyRef, split: usize) -> Opened {
    init_tracing();
    let params = ReaderParams::builder().auth_key(auth_key).key(key).build().unwrap();
    let (reader, stream, mut events) = Reader::new(params).unwrap();
    let collector = tokio::spawn(stream.collect_parts());

    let mut result = Ok(());
    for piece in envelope.chunks(split.max(1)) {
        if let Err(e) = reader.write(Bytes::copy_from_slice(piece)).await {
            result = Err(e);
            break;
        }
    }
    if result.is_ok() {
        result = reader.finish().await;
    }
    drop(reader);

    let (plaintext, _) = collector.await.unwrap();
    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event);
    }
    Opened { plaintext, events: seen, result }
}

/// `(offset, length, id)` of every chunk record in a headed envelope.
pub fn records(envelope: &[u8]) -> Vec<(usize, usize, u32)> {
    // prefix, `30 80`, INTEGER 4, ENUMERATED op
    let mut pos = SIGNATURE_LEN + PAYLOAD_OPEN.len() + 3 + 3;
    let mut out = Vec::new();
    loop {
        let header = peek_element(&envelope[pos..]).unwrap().unwrap();
        if header.is_end_of_contents() {
            break;
        }
        let len = header.total_len().unwrap();
        let (id, _, _) = split_record(&envelope[pos..pos + len]).unwrap();
        out.push((pos, len, id));
        pos += len;
    }
    out
}

pub fn record_of(envelope: &[u8], id: u32) -> Option<(usize, usize)> {
    records(envelope).into_iter().find(|&(_, _, i)| i == id).map(|(o, l, _)| (o, l))
}
