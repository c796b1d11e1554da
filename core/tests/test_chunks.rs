// # 📂 `tests/test_chunks.rs`

// * ✅ record framing and split
// * ✅ registry decode for structured chunks
// * ✅ unknown ids, custom range, registration rules
// * ✅ auth-key flagged chunks stay opaque until unwrapped

#[cfg(test)]
mod tests {
    use envelope_core::chunks::{
        encode_record, split_record, AuthKeyCheck, Chunk, ChunkCodec, ChunkDescriptor, ChunkError, ChunkFlags,
        ChunkId, ChunkPayload, ChunkRegistry, DataKeyInfo, DefaultHeader, PlainChunk, STANDARD_CHUNKS,
    };
    use envelope_core::constants::{chunk_ids, oids};
    use envelope_core::crypto::{CipherAlgorithm, DataKeys, HashAlgorithm, Pbkdf2Params};
    use envelope_core::der::encode;
    use envelope_core::types::{AsymAlgorithmType, EnvelopeError};

    fn header() -> DefaultHeader {
        DefaultHeader {
            sub_version: 1,
            asym_algorithm_type: AsymAlgorithmType::Ec,
            chunk_crypto_algorithm: CipherAlgorithm::Aes256Cbc,
            data_crypto_algorithm: CipherAlgorithm::Aes256Gcm,
            fingerprint_algorithm: HashAlgorithm::Sha256,
            auth_key_iv: vec![0x11; 16],
        }
    }

    fn decode(registry: &ChunkRegistry, record: &[u8]) -> PlainChunk {
        match registry.decode_record(record).unwrap() {
            Chunk::Plain(p) => p,
            Chunk::Encrypted(e) => panic!("unexpected encrypted chunk 0x{:02x}", e.id),
        }
    }

    #[test]
    fn test_record_layout() {
        let record = encode_record(chunk_ids::DATA, ChunkFlags::empty(), &encode::octet_string(b"ct"));
        assert_eq!(
            record,
            vec![0x30, 0x0a, 0x02, 0x01, 0x70, 0x02, 0x01, 0x00, 0x04, 0x02, b'c', b't']
        );
        let (id, flags, data) = split_record(&record).unwrap();
        assert_eq!(id, chunk_ids::DATA);
        assert!(flags.is_empty());
        assert_eq!(data, &[0x04, 0x02, b'c', b't']);
    }

    #[test]
    fn test_standard_registry_covers_protocol_ids() {
        let registry = ChunkRegistry::standard();
        assert_eq!(registry.len(), STANDARD_CHUNKS.len());
        for id in [
            chunk_ids::DEFAULT_HEADER,
            chunk_ids::AUTH_KEY_CHECK_DATA,
            chunk_ids::DATA,
            chunk_ids::FINGERPRINT,
            chunk_ids::TIMESTAMP,
        ] {
            assert!(registry.contains(id), "0x{:02x}", id);
        }
        assert_eq!(registry.name_of(chunk_ids::DH_CHECK_DATA), Some("DHCheckData"));
        assert_eq!(registry.name_of(chunk_ids::CUSTOM_BEGIN + 9), Some("CustomData"));
        assert_eq!(registry.name_of(0x50), None);
    }

    #[test]
    fn test_default_header_roundtrip_through_registry() {
        let registry = ChunkRegistry::standard();
        let record = PlainChunk::new(ChunkId::DefaultHeader, ChunkPayload::DefaultHeader(header()))
            .encode()
            .unwrap();
        match decode(&registry, &record).payload {
            ChunkPayload::DefaultHeader(h) => assert_eq!(h, header()),
            other => panic!("{}", other.kind()),
        }
    }

    #[test]
    fn test_auth_key_check_and_mac_algorithm_decode() {
        let registry = ChunkRegistry::standard();
        let check = AuthKeyCheck { params: Pbkdf2Params::random(), key: vec![0xee; 256] };
        let record = PlainChunk::new(ChunkId::AuthKeyCheckData, ChunkPayload::AuthKeyCheck(check.clone()))
            .encode()
            .unwrap();
        match decode(&registry, &record).payload {
            ChunkPayload::AuthKeyCheck(c) => assert_eq!(c, check),
            other => panic!("{}", other.kind()),
        }

        let record = PlainChunk::new(ChunkId::DataMacAlgorithm, ChunkPayload::DataMacAlgorithm(oids::GMAC.into()))
            .encode()
            .unwrap();
        match decode(&registry, &record).payload {
            ChunkPayload::DataMacAlgorithm(oid) => assert_eq!(oid, oids::GMAC),
            other => panic!("{}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let registry = ChunkRegistry::standard();
        let record = encode_record(0x50, ChunkFlags::empty(), &encode::octet_string(b"?"));
        assert!(matches!(
            registry.decode_record(&record),
            Err(ChunkError::UnknownChunkId { id: 0x50 })
        ));
        // crate error surfaces the protocol variant
        let err: EnvelopeError = ChunkError::UnknownChunkId { id: 0x50 }.into();
        assert!(matches!(err, EnvelopeError::UnknownChunkId { id: 0x50 }));
    }

    #[test]
    fn test_custom_range_always_decodes() {
        let registry = ChunkRegistry::empty();
        let record = encode_record(chunk_ids::CUSTOM_BEGIN + 3, ChunkFlags::empty(), &encode::octet_string(b"meta"));
        let chunk = decode(&registry, &record);
        assert_eq!(chunk.id, chunk_ids::CUSTOM_BEGIN + 3);
        assert!(matches!(chunk.payload, ChunkPayload::Custom(ref d) if d == b"meta"));
    }

    #[test]
    fn test_registration_rules() {
        let mut registry = ChunkRegistry::empty();
        let data = STANDARD_CHUNKS.iter().find(|d| d.id == chunk_ids::DATA).copied().unwrap();
        registry.register(data).unwrap();
        assert!(matches!(registry.register(data), Err(ChunkError::AlreadyRegistered { .. })));

        let custom = ChunkDescriptor { id: chunk_ids::CUSTOM_BEGIN, ..data };
        assert!(matches!(registry.register(custom), Err(ChunkError::ReservedForCustom { .. })));
    }

    #[test]
    fn test_auth_key_flag_keeps_chunk_opaque_until_unwrapped() {
        let registry = ChunkRegistry::standard();
        let key = [0x33u8; 32];
        let iv = [0x44u8; 16];
        let keys = DataKeys::from_slices(&[1u8; 32], &[2u8; 32]).unwrap();

        let plain = PlainChunk::new(ChunkId::DataKeyInfo, ChunkPayload::DataKeyInfo(DataKeyInfo::new(keys)))
            .with_flags(ChunkFlags::ENCRYPT_WITH_AUTH_KEY);
        assert!(plain.wants_auth_encryption());
        let sealed = plain.seal(CipherAlgorithm::Aes256Cbc, &key, &iv).unwrap();
        let record = sealed.encode();

        let encrypted = match registry.decode_record(&record).unwrap() {
            Chunk::Encrypted(e) => e,
            Chunk::Plain(p) => panic!("decoded without key: {}", p.payload.kind()),
        };
        assert_eq!(encrypted, sealed);

        let opened = registry.unwrap(&encrypted, CipherAlgorithm::Aes256Cbc, &key, &iv).unwrap();
        assert!(opened.wants_auth_encryption());
        match opened.payload {
            ChunkPayload::DataKeyInfo(info) => {
                assert!(info.is_valid());
                assert_eq!(info.keys.data_key, [1u8; 32]);
                assert_eq!(info.keys.mac_key, [2u8; 32]);
            }
            other => panic!("{}", other.kind()),
        }

        // a different key cannot produce the DataKeyInfo back
        let wrong = registry.unwrap(&encrypted, CipherAlgorithm::Aes256Cbc, &[0x34u8; 32], &iv);
        let recovered = matches!(
            wrong,
            Ok(PlainChunk { payload: ChunkPayload::DataKeyInfo(ref info), .. }) if info.is_valid()
        );
        assert!(!recovered);
    }

    #[test]
    fn test_structured_codec_rejects_trailing_data() {
        let mut data = header().encode_data().unwrap();
        data.extend_from_slice(&encode::null());
        assert!(DefaultHeader::decode_data(&data).is_err());
    }
}
