#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use envelope_core::constants::oids;
    use envelope_core::der::decode::{content_to_u64, oid_to_string};
    use envelope_core::der::encode::{self, encode_length};
    use envelope_core::der::{peek_element, peek_header, tags, DerError, DerReader};

    // ## Lengths

    #[test]
    fn test_length_forms() {
        let cases: [(usize, &[u8]); 5] = [
            (0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x81, 0x80]),
            (0x1234, &[0x82, 0x12, 0x34]),
            (0x01_0000, &[0x83, 0x01, 0x00, 0x00]),
        ];
        for (len, expected) in cases {
            let mut out = Vec::new();
            encode_length(len, &mut out);
            assert_eq!(out, expected, "len {}", len);
        }
    }

    #[test]
    fn test_peek_needs_more_input() {
        assert_eq!(peek_header(&[0x30]).unwrap(), None);
        // long form, length octets missing
        assert_eq!(peek_header(&[0x04, 0x82, 0x01]).unwrap(), None);

        let h = peek_header(&[0x04, 0x82, 0x01, 0x00]).unwrap().unwrap();
        assert_eq!(h.header_len, 4);
        assert_eq!(h.length, Some(256));
        assert_eq!(h.total_len(), Some(260));

        // header complete, content not yet
        assert_eq!(peek_element(&[0x04, 0x03, 0xaa]).unwrap(), None);
        assert!(peek_element(&[0x04, 0x03, 0xaa, 0xbb, 0xcc]).unwrap().is_some());
    }

    #[test]
    fn test_indefinite_and_end_of_contents() {
        let open = peek_header(&[0x30, 0x80]).unwrap().unwrap();
        assert_eq!(open.length, None);
        assert_eq!(open.total_len(), None);

        let end = peek_element(&[0x00, 0x00]).unwrap().unwrap();
        assert!(end.is_end_of_contents());
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(peek_header(&[0x1f, 0x01]), Err(DerError::MultiByteTag(0x1f))));
        assert!(matches!(
            peek_header(&[0x04, 0x85, 1, 2, 3, 4, 5]),
            Err(DerError::InvalidLength(_))
        ));
    }

    // ## Integers

    #[test]
    fn test_integer_encoding_is_minimal() {
        assert_eq!(encode::integer_u64(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode::integer_u64(4), vec![0x02, 0x01, 0x04]);
        assert_eq!(encode::integer_u64(0x80), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(encode::integer_u64(0x0100), vec![0x02, 0x02, 0x01, 0x00]);
        assert_eq!(encode::enumerated(2), vec![0x0a, 0x01, 0x02]);
        assert_eq!(encode::integer_unsigned(&[0x00, 0x00, 0xff]), vec![0x02, 0x02, 0x00, 0xff]);
    }

    #[test]
    fn test_integer_decoding_limits() {
        assert_eq!(content_to_u64(&[0x00, 0x80]).unwrap(), 0x80);
        assert!(matches!(content_to_u64(&[0x80]), Err(DerError::NegativeInteger)));
        assert!(matches!(content_to_u64(&[]), Err(DerError::InvalidLength(_))));
        assert!(matches!(
            content_to_u64(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(DerError::IntegerOverflow { len: 9 })
        ));
    }

    // ## OIDs

    #[test]
    fn test_oid_known_encodings() {
        // sha256
        assert_eq!(
            encode::oid(oids::SHA256).unwrap(),
            vec![0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01]
        );
        for dotted in [oids::GMAC, oids::HMAC_WITH_SHA256, oids::AES_256_GCM, oids::EC_PUBLIC_KEY] {
            let content = encode::oid_content(dotted).unwrap();
            assert_eq!(oid_to_string(&content).unwrap(), dotted);
        }
    }

    #[test]
    fn test_oid_rejects_bad_text_and_content() {
        assert!(encode::oid("1").is_err());
        assert!(encode::oid("3.1").is_err());
        assert!(encode::oid("1.40").is_err());
        assert!(encode::oid("1.2.x").is_err());
        assert!(matches!(oid_to_string(&[0x2a, 0x86]), Err(DerError::InvalidOid(_))));
    }

    // ## Reader cursor

    #[test]
    fn test_reader_walks_structure() {
        let alg = encode::algorithm_identifier(oids::SHA256, Some(encode::null().as_slice())).unwrap();
        let der = encode::sequence(&[
            &encode::integer_u64(7),
            &encode::octet_string(b"abc"),
            &alg,
            &encode::boolean(true),
            &encode::enumerated(1),
        ]);

        let mut outer = DerReader::new(&der);
        let mut seq = outer.read_sequence().unwrap();
        assert_eq!(seq.read_u64().unwrap(), 7);
        assert_eq!(seq.read_octet_string().unwrap(), b"abc");
        let mut alg = seq.read_sequence().unwrap();
        assert_eq!(alg.read_oid().unwrap(), oids::SHA256);
        alg.read_null().unwrap();
        alg.finish().unwrap();
        assert!(seq.read_boolean().unwrap());
        assert_eq!(seq.peek_tag(), Some(tags::ENUMERATED));
        assert_eq!(seq.read_enumerated().unwrap(), 1);
        assert!(seq.is_empty());
        seq.finish().unwrap();
        outer.finish().unwrap();
    }

    #[test]
    fn test_reader_errors() {
        let der = encode::octet_string(b"x");
        let mut r = DerReader::new(&der);
        assert!(matches!(
            r.read_u64(),
            Err(DerError::UnexpectedTag { expected: tags::INTEGER, found: tags::OCTET_STRING })
        ));

        let mut trailing = encode::integer_u64(1);
        trailing.push(0x05);
        let mut r = DerReader::new(&trailing);
        r.read_u64().unwrap();
        assert!(matches!(r.finish(), Err(DerError::TrailingData { remaining: 1 })));

        let mut r = DerReader::new(&[0x04, 0x05, 0x01]);
        assert!(matches!(r.read_octet_string(), Err(DerError::Truncated { .. })));
    }

    proptest! {
        #[test]
        fn prop_integer_roundtrip(v in any::<u64>()) {
            let der = encode::integer_u64(v);
            let mut r = DerReader::new(&der);
            prop_assert_eq!(r.read_u64().unwrap(), v);
            prop_assert!(r.is_empty());
        }

        #[test]
        fn prop_octet_string_any_length(data in proptest::collection::vec(any::<u8>(), 0..70_000)) {
            let der = encode::octet_string(&data);
            let h = peek_element(&der).unwrap().unwrap();
            prop_assert_eq!(h.total_len(), Some(der.len()));
            let mut r = DerReader::new(&der);
            prop_assert_eq!(r.read_octet_string().unwrap(), &data[..]);
        }
    }
}
