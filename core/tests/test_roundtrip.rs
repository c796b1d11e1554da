// # 📂 `tests/test_roundtrip.rs`

// * ✅ write → read for every operation × key family
// * ✅ arbitrary input split points on both sides
// * ✅ empty payload, header-less streams, trailing bytes after the envelope
// * ✅ wire layout of the payload opener

mod common;

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use envelope_core::constants::{chunk_ids, END_MARKER, MAGIC, SIGNATURE_LEN};
    use envelope_core::prelude::*;

    use crate::common::{self, keys_for, open, record_of, seal, Family, AUTH_KEY};

    const PAYLOAD: &[u8] = b"the quick brown fox jumps over the lazy dog, repeatedly and at length";

    async fn roundtrip(op: OperationType, family: Family, split: usize) {
        let (writer_key, reader_key) = keys_for(op, family);
        let envelope = seal(op, writer_key, vec![], &[&PAYLOAD[..10], &PAYLOAD[10..]]).await;
        let opened = open(&envelope, AUTH_KEY, reader_key, split).await;
        assert!(opened.result.is_ok(), "{:?}", opened.result);
        assert_eq!(opened.plaintext, PAYLOAD);
    }

    // # ✅ 1. Sign / EC
    #[tokio::test]
    async fn sign_ec_roundtrip() {
        roundtrip(OperationType::Sign, Family::Ec, 4096).await;
    }

    // # ✅ 2. Sign / RSA
    #[tokio::test]
    async fn sign_rsa_roundtrip() {
        roundtrip(OperationType::Sign, Family::Rsa, 4096).await;
    }

    // # ✅ 3. PublicEncrypt / EC (ephemeral ECDH)
    #[tokio::test]
    async fn public_encrypt_ec_roundtrip() {
        roundtrip(OperationType::PublicEncrypt, Family::Ec, 4096).await;
    }

    // # ✅ 4. PublicEncrypt / RSA (wrapped data key)
    #[tokio::test]
    async fn public_encrypt_rsa_roundtrip() {
        roundtrip(OperationType::PublicEncrypt, Family::Rsa, 4096).await;
    }

    // # ✅ 5. Byte-at-a-time input
    #[tokio::test]
    async fn single_byte_input_roundtrip() {
        roundtrip(OperationType::Sign, Family::Ec, 1).await;
        roundtrip(OperationType::PublicEncrypt, Family::Ec, 1).await;
    }

    // # ✅ 6. Empty payload
    #[tokio::test]
    async fn empty_payload_roundtrip() {
        for op in [OperationType::Sign, OperationType::PublicEncrypt] {
            let (writer_key, reader_key) = keys_for(op, Family::Ec);
            let envelope = seal(op, writer_key, vec![], &[]).await;
            let opened = open(&envelope, AUTH_KEY, reader_key, 7).await;
            assert!(opened.result.is_ok(), "{:?}: {:?}", op, opened.result);
            assert!(opened.plaintext.is_empty());
        }
    }

    // # ✅ 7. Wire layout
    #[tokio::test]
    async fn envelope_wire_layout() {
        let (writer_key, _) = keys_for(OperationType::PublicEncrypt, Family::Ec);
        let envelope = seal(OperationType::PublicEncrypt, writer_key, vec![], &[b"x"]).await;

        assert_eq!(&envelope[..MAGIC.len()], &MAGIC);
        assert_eq!(envelope[MAGIC.len()], 4);
        assert_eq!(
            &envelope[SIGNATURE_LEN..SIGNATURE_LEN + 8],
            &[0x30, 0x80, 0x02, 0x01, 0x04, 0x0a, 0x01, 0x02]
        );
        assert_eq!(&envelope[envelope.len() - 2..], &END_MARKER);

        let ids: Vec<u32> = common::records(&envelope).into_iter().map(|(_, _, id)| id).collect();
        assert_eq!(ids[0], chunk_ids::DEFAULT_HEADER);
        assert_eq!(ids[1], chunk_ids::AUTH_KEY_CHECK_DATA);
        assert!(ids.contains(&chunk_ids::EPHEMERAL_EC_PUBLIC_KEY));
        assert!(ids.contains(&chunk_ids::DH_CHECK_DATA));
        assert!(!ids.contains(&chunk_ids::SIGNED_FINGERPRINT));
        assert!(record_of(&envelope, chunk_ids::FINGERPRINT).is_some());
    }

    // # ✅ 8. Sign emits a signature, RSA encrypt wraps the data key
    #[tokio::test]
    async fn footer_and_key_chunks_follow_operation() {
        let (key, _) = keys_for(OperationType::Sign, Family::Rsa);
        let signed = seal(OperationType::Sign, key, vec![], &[b"abc"]).await;
        assert!(record_of(&signed, chunk_ids::SIGNED_FINGERPRINT).is_some());
        assert!(record_of(&signed, chunk_ids::DATA_KEY_INFO).is_some());
        assert!(record_of(&signed, chunk_ids::ASYM_ALGORITHM_IDENTIFIER).is_none());

        let (key, _) = keys_for(OperationType::PublicEncrypt, Family::Rsa);
        let sealed = seal(OperationType::PublicEncrypt, key, vec![], &[b"abc"]).await;
        assert!(record_of(&sealed, chunk_ids::ENCRYPTED_DATA_KEY_INFO).is_some());
        assert!(record_of(&sealed, chunk_ids::DATA_KEY_INFO).is_none());
    }

    // # ✅ 9. Header-less stream with an explicit version
    #[tokio::test]
    async fn header_less_roundtrip() {
        let (writer_key, reader_key) = keys_for(OperationType::Sign, Family::Ec);
        let params = WriterParams::builder(OperationType::Sign, AUTH_KEY, writer_key)
            .exclude_header(true)
            .build()
            .unwrap();
        let (writer, stream) = Writer::new(params).unwrap();
        let collector = tokio::spawn(stream.collect_bytes());
        writer.write(&b"no prefix"[..]).await.unwrap();
        writer.finish().await.unwrap();
        let envelope = collector.await.unwrap().unwrap();
        assert_eq!(&envelope[..2], &[0x30, 0x80]);

        let params = ReaderParams::builder()
            .auth_key(AUTH_KEY)
            .key(reader_key)
            .exclude_header(true)
            .version(4)
            .build()
            .unwrap();
        let (reader, out, _events) = Reader::new(params).unwrap();
        let collector = tokio::spawn(out.collect_bytes());
        reader.write(envelope).await.unwrap();
        reader.finish().await.unwrap();
        drop(reader);
        assert_eq!(collector.await.unwrap().unwrap(), b"no prefix");
    }

    // # ✅ 10. Known size: trailer bytes are ignored
    #[tokio::test]
    async fn known_size_ignores_trailer() {
        let (writer_key, reader_key) = keys_for(OperationType::Sign, Family::Ec);
        let envelope = seal(OperationType::Sign, writer_key, vec![], &[b"payload"]).await;
        let mut input = envelope.clone();
        input.extend_from_slice(b"\xde\xad\xbe\xef trailer");

        let params = ReaderParams::builder().auth_key(AUTH_KEY).key(reader_key).build().unwrap();
        let (reader, out, _events) = Reader::new(params).unwrap();
        let collector = tokio::spawn(out.collect_bytes());
        reader.set_known_size(envelope.len() as u64).await;
        reader.write(input).await.unwrap();
        reader.finish().await.unwrap();
        drop(reader);
        assert_eq!(collector.await.unwrap().unwrap(), b"payload");
    }

    // # ✅ 11. Truncated input is not a valid envelope
    #[tokio::test]
    async fn truncated_envelope_fails_on_finish() {
        let (writer_key, reader_key) = keys_for(OperationType::Sign, Family::Ec);
        let envelope = seal(OperationType::Sign, writer_key, vec![], &[b"payload"]).await;
        let cut = &envelope[..envelope.len() - END_MARKER.len()];
        let opened = open(cut, AUTH_KEY, reader_key, 64).await;
        assert!(matches!(opened.result, Err(EnvelopeError::Malformed(_))), "{:?}", opened.result);
    }

    // # ✅ 12. Reader exposes operation and fingerprint
    #[tokio::test]
    async fn reader_reports_operation_and_fingerprint() {
        let (writer_key, reader_key) = keys_for(OperationType::PublicEncrypt, Family::Ec);
        let envelope = seal(OperationType::PublicEncrypt, writer_key, vec![], &[b"data"]).await;

        let params = ReaderParams::builder().auth_key(AUTH_KEY).key(reader_key).build().unwrap();
        let (reader, out, _events) = Reader::new(params).unwrap();
        let collector = tokio::spawn(out.collect_bytes());
        reader.write(envelope).await.unwrap();
        reader.finish().await.unwrap();
        assert_eq!(reader.operation().await, Some(OperationType::PublicEncrypt));
        assert_eq!(reader.fingerprint().await.map(|f| f.len()), Some(32));
        assert!(reader.is_ready().await);
        drop(reader);
        collector.await.unwrap().unwrap();
    }

    fn run<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_roundtrip_arbitrary_payload_and_splits(
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
            cut in 0usize..2048,
            split in 1usize..300,
            sign in any::<bool>(),
        ) {
            let op = if sign { OperationType::Sign } else { OperationType::PublicEncrypt };
            let cut = cut.min(payload.len());
            let (writer_key, reader_key) = keys_for(op, Family::Ec);
            let opened = run(async {
                let envelope = seal(op, writer_key, vec![], &[&payload[..cut], &payload[cut..]]).await;
                open(&envelope, AUTH_KEY, reader_key, split).await
            });
            prop_assert!(opened.result.is_ok());
            prop_assert_eq!(opened.plaintext, payload);
        }
    }
}
