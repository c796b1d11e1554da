//! benches/envelope_throughput.rs
//! Seal and open throughput for both operations across payload sizes.
//!
//! ```bash
//! cargo bench --package envelope-core --bench envelope_throughput
//! cargo bench --package envelope-core --bench envelope_throughput -- seal/sign
//! ```

use std::sync::Arc;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use envelope_core::prelude::*;
use tokio::runtime::Runtime;

const AUTH_KEY: &str = "bench-auth-key";
const SIZES: [usize; 3] = [4 * 1024, 64 * 1024, 1024 * 1024];
const WRITE_SIZE: usize = 16 * 1024;

/// `(writer key, reader key)` for one operation over P-256.
fn keys(op: OperationType) -> (KeyRef, KeyRef) {
    let private = EcKey::generate();
    let public = private.public_key();
    let (private, public): (KeyRef, KeyRef) = (Arc::new(private), Arc::new(public));
    match op {
        OperationType::Sign => (private, public),
        OperationType::PublicEncrypt => (public, private),
    }
}

async fn seal(op: OperationType, key: KeyRef, payload: &[u8]) -> Vec<u8> {
    let params = WriterParams::builder(op, AUTH_KEY, key).build().unwrap();
    let (writer, stream) = Writer::new(params).unwrap();
    let collector = tokio::spawn(stream.collect_bytes());
    for part in payload.chunks(WRITE_SIZE) {
        writer.write(Bytes::copy_from_slice(part)).await.unwrap();
    }
    writer.finish().await.unwrap();
    collector.await.unwrap().unwrap()
}

async fn open(key: KeyRef, envelope: &[u8]) -> Vec<u8> {
    let params = ReaderParams::builder().auth_key(AUTH_KEY).key(key).build().unwrap();
    let (reader, stream, _events) = Reader::new(params).unwrap();
    let collector = tokio::spawn(stream.collect_parts());
    for part in envelope.chunks(WRITE_SIZE) {
        reader.write(Bytes::copy_from_slice(part)).await.unwrap();
    }
    reader.finish().await.unwrap();
    drop(reader);
    collector.await.unwrap().0
}

fn label(op: OperationType) -> &'static str {
    match op {
        OperationType::Sign => "sign",
        OperationType::PublicEncrypt => "public_encrypt",
    }
}

fn bench_seal(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    for op in [OperationType::Sign, OperationType::PublicEncrypt] {
        let (writer_key, _) = keys(op);
        let mut group = c.benchmark_group(format!("seal/{}", label(op)));
        for size in SIZES {
            let payload = vec![0xa5u8; size];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
                b.to_async(&rt).iter(|| seal(op, Arc::clone(&writer_key), black_box(payload)));
            });
        }
        group.finish();
    }
}

fn bench_open(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    for op in [OperationType::Sign, OperationType::PublicEncrypt] {
        let (writer_key, reader_key) = keys(op);
        let mut group = c.benchmark_group(format!("open/{}", label(op)));
        for size in SIZES {
            let envelope = rt.block_on(seal(op, Arc::clone(&writer_key), &vec![0xa5u8; size]));
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::from_parameter(size), &envelope, |b, envelope| {
                b.to_async(&rt).iter(|| open(Arc::clone(&reader_key), black_box(envelope)));
            });
        }
        group.finish();
    }
}

criterion_group!(envelope_benches, bench_seal, bench_open);
criterion_main!(envelope_benches);
