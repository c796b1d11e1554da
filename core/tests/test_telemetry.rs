// # 📂 `tests/test_telemetry.rs`

// * ✅ counter arithmetic and merge
// * ✅ snapshot ratios, sanity check and JSON export
// * ✅ writer and reader record their stages and agree on counts

mod common;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use envelope_core::prelude::*;
    use envelope_core::telemetry::{EnvelopeCounters, Stage, StageTimes, TelemetrySnapshot, TelemetryTimer};

    use super::common::{keys_for, Family, AUTH_KEY};

    // # ✅ 1. Counters

    #[test]
    fn test_counters_accumulate_by_class() {
        let mut c = EnvelopeCounters::default();
        c.add_framing(17);
        c.add_header_chunk(40, false);
        c.add_header_chunk(60, true);
        c.add_custom_chunk(12, true);
        c.add_data_chunk(32, 38);
        c.add_plaintext(30);
        c.add_footer_chunk(20);

        assert_eq!(c.chunks_header, 2);
        assert_eq!(c.chunks_custom, 1);
        assert_eq!(c.chunks_data, 1);
        assert_eq!(c.chunks_footer, 1);
        assert_eq!(c.chunks_auth_encrypted, 2);
        assert_eq!(c.total_chunks(), 5);
        assert_eq!(c.bytes_ciphertext, 32);
        assert_eq!(c.bytes_overhead, 17 + 40 + 60 + 12 + 6 + 20);
        assert_eq!(c.envelope_bytes(), 17 + 40 + 60 + 12 + 38 + 20);
    }

    #[test]
    fn test_counters_merge_and_add_assign() {
        let mut a = EnvelopeCounters::default();
        a.add_data_chunk(10, 14);
        a.add_plaintext(10);
        let mut b = EnvelopeCounters::default();
        b.add_footer_chunk(5);
        b.add_plaintext(3);

        let mut merged = a.clone();
        merged.merge(&b);
        let mut summed = a;
        summed += b;
        assert_eq!(merged, summed);
        assert_eq!(merged.bytes_plaintext, 13);
        assert_eq!(merged.total_chunks(), 2);
    }

    // # ✅ 2. Timers and snapshots

    #[test]
    fn test_stage_times_accumulate() {
        let mut times = StageTimes::default();
        times.add(Stage::Encrypt, Duration::from_millis(2));
        times.add(Stage::Encrypt, Duration::from_millis(3));
        assert_eq!(times.get(Stage::Encrypt), Duration::from_millis(5));
        assert_eq!(times.get(Stage::Decrypt), Duration::ZERO);
        assert!((times.get_ms(Stage::Encrypt) - 5.0).abs() < 1e-9);
        assert!(times.has_all(&[Stage::Encrypt]));
        assert!(!times.has_all(&[Stage::Encrypt, Stage::Validate]));
        assert_eq!((&times).into_iter().collect::<Vec<_>>(), vec![(Stage::Encrypt, Duration::from_millis(5))]);

        // a zero-length stage still counts as run
        times.add(Stage::Validate, Duration::ZERO);
        assert!(times.has_all(&[Stage::Encrypt, Stage::Validate]));
        assert_eq!(times.total(), Duration::from_millis(5));
        assert_eq!(Stage::KeyDerivation.to_string(), "key_derivation");
    }

    #[test]
    fn test_timer_finish_freezes_elapsed() {
        let mut timer = TelemetryTimer::new();
        let value = timer.time(Stage::Header, || 7);
        assert_eq!(value, 7);
        timer.finish();
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(timer.elapsed(), first);
        assert!(timer.stage_times.has_all(&[Stage::Header]));
    }

    #[test]
    fn test_snapshot_without_plaintext_has_zero_ratio() {
        let mut counters = EnvelopeCounters::default();
        counters.add_framing(19);
        let snap = TelemetrySnapshot::from(&counters, &TelemetryTimer::new());
        assert_eq!(snap.expansion_ratio, 0.0);
        assert!(!snap.finished);
        assert!(snap.sanity_check());
    }

    #[test]
    fn test_snapshot_json_export() {
        let mut counters = EnvelopeCounters::default();
        counters.add_data_chunk(100, 104);
        counters.add_plaintext(100);
        let mut timer = TelemetryTimer::new();
        timer.add_stage_time(Stage::Encrypt, Duration::from_micros(1));
        timer.finish();

        let snap = TelemetrySnapshot::from(&counters, &timer);
        assert!((snap.expansion_ratio - 1.04).abs() < 1e-9);
        assert!(snap.finished);

        let json = snap.to_json().unwrap();
        assert!(json.contains("\"bytes_plaintext\":100"));
        let back: TelemetrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.counters, snap.counters);
        assert_eq!(back.stage_times.get(Stage::Encrypt), Duration::from_micros(1));
    }

    // # ✅ 3. Live envelopes

    #[tokio::test]
    async fn test_writer_and_reader_telemetry_agree() {
        let payload = vec![0x5au8; 5000];
        let (writer_key, reader_key) = keys_for(OperationType::Sign, Family::Ec);

        let params = WriterParams::builder(OperationType::Sign, AUTH_KEY, writer_key).build().unwrap();
        let (writer, stream) = Writer::new(params).unwrap();
        let collector = tokio::spawn(stream.collect_bytes());
        for part in payload.chunks(700) {
            writer.write(Bytes::copy_from_slice(part)).await.unwrap();
        }
        writer.finish().await.unwrap();
        let envelope = collector.await.unwrap().unwrap();

        let written = writer.telemetry().await;
        assert!(written.finished);
        assert!(written.has_all_stages(&[Stage::Header, Stage::KeyDerivation, Stage::Encrypt]));
        assert!(!written.has_all_stages(&[Stage::Timestamp]));
        assert_eq!(written.counters.bytes_plaintext, payload.len() as u64);
        assert!(written.counters.chunks_data >= 1);
        // MAC, fingerprint, signature
        assert_eq!(written.counters.chunks_footer, 3);
        assert!(written.counters.chunks_auth_encrypted >= 1);
        assert_eq!(written.counters.envelope_bytes(), envelope.len() as u64);
        assert!(written.expansion_ratio > 1.0);
        assert!(written.overhead_ratio() > 0.0 && written.overhead_ratio() < 1.0);
        assert!(written.sanity_check());

        let params = ReaderParams::builder().auth_key(AUTH_KEY).key(reader_key).build().unwrap();
        let (reader, stream, _events) = Reader::new(params).unwrap();
        let collector = tokio::spawn(stream.collect_parts());
        reader.write(Bytes::from(envelope.clone())).await.unwrap();
        reader.finish().await.unwrap();
        let read = reader.telemetry().await;
        drop(reader);
        let (plaintext, _) = collector.await.unwrap();

        assert_eq!(plaintext, payload);
        assert!(read.finished);
        assert!(read.has_all_stages(&[Stage::Parse, Stage::KeyDerivation, Stage::Decrypt, Stage::Validate]));
        assert!(read.sanity_check());
        assert_eq!(read.counters, written.counters);
    }
}
