// # 📂 `tests/test_tsa.rs`

// * ✅ request DER carries the fingerprint imprint
// * ✅ granted response → Timestamp chunk → reader token
// * ✅ timeout / transport / rejection → in-band Err item, envelope still valid
// * ✅ parse_response edge cases

mod common;

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use envelope_core::constants::{chunk_ids, oids};
    use envelope_core::crypto::HashAlgorithm;
    use envelope_core::der::{encode, DerReader};
    use envelope_core::prelude::*;
    use envelope_core::tsa::{parse_response, TimestampError, TimestampRequest};

    use crate::common::{keys_for, open, record_of, Family, AUTH_KEY};

    const TOKEN_OID: &str = "1.2.840.113549.1.7.2";

    fn fake_token() -> Vec<u8> {
        let oid = encode::oid(TOKEN_OID).unwrap();
        let body = encode::octet_string(b"signed-time-attestation");
        encode::sequence(&[&oid, &body])
    }

    fn response(status: u64, token: Option<&[u8]>) -> Vec<u8> {
        let status_info = encode::sequence(&[&encode::integer_u64(status)]);
        match token {
            Some(t) => encode::sequence(&[&status_info, t]),
            None => encode::sequence(&[&status_info]),
        }
    }

    /// `(hash oid, hashed message)` of a DER TimeStampReq.
    fn imprint_of(request: &[u8]) -> (String, Vec<u8>) {
        let mut outer = DerReader::new(request);
        let mut req = outer.read_sequence().unwrap();
        assert_eq!(req.read_u64().unwrap(), 1);
        let mut imprint = req.read_sequence().unwrap();
        let mut alg = imprint.read_sequence().unwrap();
        let oid = alg.read_oid().unwrap();
        let hashed = imprint.read_octet_string().unwrap().to_vec();
        (oid, hashed)
    }

    #[derive(Debug)]
    enum Behaviour {
        Grant,
        Stall,
        Fail,
        Reject,
    }

    #[derive(Debug)]
    struct MockAuthority {
        behaviour: Behaviour,
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl MockAuthority {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self { behaviour, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl TimestampAuthority for MockAuthority {
        async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TimestampError> {
            self.seen.lock().unwrap().push(request.to_vec());
            match self.behaviour {
                Behaviour::Grant => Ok(response(0, Some(&fake_token()))),
                Behaviour::Stall => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(response(0, Some(&fake_token())))
                }
                Behaviour::Fail => Err(TimestampError::HttpStatus(503)),
                Behaviour::Reject => Ok(response(2, None)),
            }
        }
    }

    async fn seal_with(authority: Arc<MockAuthority>, op: OperationType, key: KeyRef) -> (Vec<u8>, Vec<EnvelopeError>) {
        let params = WriterParams::builder(op, AUTH_KEY, key)
            .timestamp_authority(authority)
            .tsa_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let (writer, stream) = Writer::new(params).unwrap();
        let collector = tokio::spawn(stream.collect_parts());
        writer.write(&b"timestamped payload"[..]).await.unwrap();
        writer.finish().await.unwrap();
        collector.await.unwrap()
    }

    // # ✅ 1. Request encoding
    #[test]
    fn request_carries_imprint() {
        let digest = [0xabu8; 32];
        let der = TimestampRequest::new(HashAlgorithm::Sha256, &digest).to_der().unwrap();
        let (oid, hashed) = imprint_of(&der);
        assert_eq!(oid, oids::SHA256);
        assert_eq!(hashed, digest);
    }

    // # ✅ 2. Response parsing
    #[test]
    fn parse_response_cases() {
        let token = fake_token();
        assert_eq!(parse_response(&response(0, Some(&token))).unwrap(), token);
        assert_eq!(parse_response(&response(1, Some(&token))).unwrap(), token);
        assert!(matches!(parse_response(&response(2, None)), Err(TimestampError::Rejected(2))));
        assert!(matches!(parse_response(&response(0, None)), Err(TimestampError::Malformed(_))));
        assert!(matches!(parse_response(&[0x30, 0x05, 0x01]), Err(TimestampError::Malformed(_))));
    }

    // # ✅ 3. Granted token lands in the envelope
    #[tokio::test]
    async fn granted_token_is_embedded_and_readable() {
        for op in [OperationType::Sign, OperationType::PublicEncrypt] {
            let (writer_key, reader_key) = keys_for(op, Family::Ec);
            let authority = MockAuthority::new(Behaviour::Grant);
            let (envelope, errors) = seal_with(Arc::clone(&authority), op, writer_key).await;
            assert!(errors.is_empty(), "{:?}", errors);
            assert!(record_of(&envelope, chunk_ids::TIMESTAMP).is_some());

            let params = ReaderParams::builder().auth_key(AUTH_KEY).key(reader_key).build().unwrap();
            let (reader, out, _events) = Reader::new(params).unwrap();
            let collector = tokio::spawn(out.collect_bytes());
            reader.write(envelope).await.unwrap();
            reader.finish().await.unwrap();

            assert_eq!(reader.timestamp_token().await, Some(fake_token()));
            let fingerprint = reader.fingerprint().await.unwrap();
            let requests = authority.seen.lock().unwrap().clone();
            assert_eq!(requests.len(), 1);
            assert_eq!(imprint_of(&requests[0]).1, fingerprint);
            drop(reader);
            assert_eq!(collector.await.unwrap().unwrap(), b"timestamped payload");
        }
    }

    // # ✅ 4. Failures are reported in-band, envelope completes
    #[tokio::test]
    async fn failures_are_non_fatal() {
        for behaviour in [Behaviour::Stall, Behaviour::Fail, Behaviour::Reject] {
            let (writer_key, reader_key) = keys_for(OperationType::Sign, Family::Ec);
            let (envelope, errors) = seal_with(MockAuthority::new(behaviour), OperationType::Sign, writer_key).await;

            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], EnvelopeError::Timestamp(_)), "{:?}", errors[0]);
            assert!(record_of(&envelope, chunk_ids::TIMESTAMP).is_none());

            let opened = open(&envelope, AUTH_KEY, reader_key, 4096).await;
            assert!(opened.result.is_ok(), "{:?}", opened.result);
            assert_eq!(opened.plaintext, b"timestamped payload");
        }
    }

    // # ✅ 5. Timeout maps to the Timeout variant
    #[tokio::test]
    async fn stalled_authority_times_out() {
        let (writer_key, _) = keys_for(OperationType::Sign, Family::Ec);
        let (_, errors) = seal_with(MockAuthority::new(Behaviour::Stall), OperationType::Sign, writer_key).await;
        assert!(
            matches!(errors[0], EnvelopeError::Timestamp(TimestampError::Timeout(_))),
            "{:?}",
            errors[0]
        );
    }
}
