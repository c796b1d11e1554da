// # 📂 `tests/test_params.rs`

// * ✅ JSON options with defaults
// * ✅ key capability checks at construction
// * ✅ version routing and header-less reader setup
// * ✅ secrets never reach Debug output

mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use envelope_core::constants::{DEFAULT_OUTPUT_CAPACITY, DEFAULT_TSA_TIMEOUT_MS, FORMAT_VERSION};
    use envelope_core::crypto::HashAlgorithm;
    use envelope_core::keys::KeyError;
    use envelope_core::prelude::*;
    use envelope_core::signature::{delegate_version, SignatureHeader};
    use envelope_core::types::AsymAlgorithmType;

    use super::common::{key_pair, Family, AUTH_KEY};

    /// Public key that can only verify.
    #[derive(Debug)]
    struct VerifyOnlyKey;

    impl AsymmetricKey for VerifyOnlyKey {
        fn algorithm_type(&self) -> AsymAlgorithmType {
            AsymAlgorithmType::Ec
        }

        fn is_private(&self) -> bool {
            false
        }

        fn sign(&self, _hash: HashAlgorithm, _digest: &[u8]) -> Result<Vec<u8>, KeyError> {
            Err(KeyError::MissingPrivateKey)
        }

        fn verify(&self, _hash: HashAlgorithm, _digest: &[u8], _signature: &[u8]) -> Result<bool, KeyError> {
            Ok(false)
        }

        fn export_spki_der(&self) -> Result<Vec<u8>, KeyError> {
            Err(KeyError::Unsupported("export"))
        }
    }

    // # ✅ 1. Options

    #[test]
    fn test_writer_options_from_json_fills_defaults() {
        let opts = WriterOptions::from_json(r#"{ "exclude_header": true, "tsa_timeout_ms": 500 }"#).unwrap();
        assert!(opts.exclude_header);
        assert_eq!(opts.tsa_timeout_ms, 500);
        assert_eq!(opts.version, FORMAT_VERSION);
        assert_eq!(opts.output_capacity, DEFAULT_OUTPUT_CAPACITY);
        assert_eq!(opts.tsa_location, None);

        let empty = WriterOptions::from_json("{}").unwrap();
        assert_eq!(empty, WriterOptions::default());
        assert_eq!(empty.tsa_timeout_ms, DEFAULT_TSA_TIMEOUT_MS);

        assert!(WriterOptions::from_json(r#"{ "version": "four" }"#).is_err());
    }

    #[test]
    fn test_reader_options_from_json() {
        let opts = ReaderOptions::from_json(r#"{ "exclude_header": true, "version": 4, "known_size": 1024 }"#).unwrap();
        assert!(opts.exclude_header);
        assert_eq!(opts.version, Some(4));
        assert_eq!(opts.known_size, Some(1024));
        assert_eq!(opts.output_capacity, DEFAULT_OUTPUT_CAPACITY);

        let params = ReaderParams::builder().options(opts).build().unwrap();
        assert!(params.exclude_header);
        assert_eq!(params.known_size, Some(1024));
    }

    #[test]
    fn test_writer_builder_applies_options() {
        let (private, _) = key_pair(Family::Ec);
        let opts = WriterOptions { output_capacity: 4, ..WriterOptions::default() };
        let params = WriterParams::builder(OperationType::Sign, AUTH_KEY, private)
            .options(opts)
            .exclude_header(true)
            .tsa_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert!(params.exclude_header);
        assert_eq!(params.output_capacity, 4);
        assert_eq!(params.tsa_timeout, Duration::from_millis(250));
        assert!(params.timestamp_authority.is_none());
    }

    // # ✅ 2. Key capabilities

    #[test]
    fn test_sign_needs_private_key() {
        let (_, public) = key_pair(Family::Ec);
        let err = WriterParams::builder(OperationType::Sign, AUTH_KEY, public).build().unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidKey(_)));
    }

    #[test]
    fn test_public_encrypt_needs_transport_or_agreement() {
        let key: KeyRef = Arc::new(VerifyOnlyKey);
        let err = WriterParams::builder(OperationType::PublicEncrypt, AUTH_KEY, key).build().unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidKey(_)));

        // both families are usable recipients
        for family in [Family::Ec, Family::Rsa] {
            let (_, public) = key_pair(family);
            assert!(WriterParams::builder(OperationType::PublicEncrypt, AUTH_KEY, public).build().is_ok());
        }
    }

    // # ✅ 3. Versions

    #[test]
    fn test_version_routing() {
        assert_eq!(delegate_version(FORMAT_VERSION).unwrap(), FORMAT_VERSION);
        assert!(matches!(delegate_version(3), Err(EnvelopeError::UnsupportedVersion { version: 3 })));
        assert_eq!(SignatureHeader::default().version, FORMAT_VERSION);

        let (private, _) = key_pair(Family::Ec);
        let err = WriterParams::builder(OperationType::Sign, AUTH_KEY, private).version(5).build().unwrap_err();
        assert!(matches!(err, EnvelopeError::UnsupportedVersion { version: 5 }));

        let err = ReaderParams::builder().exclude_header(true).version(7).build().unwrap_err();
        assert!(matches!(err, EnvelopeError::UnsupportedVersion { version: 7 }));
    }

    #[test]
    fn test_header_less_reader_needs_version() {
        let err = ReaderParams::builder().exclude_header(true).build().unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
        assert!(ReaderParams::builder().exclude_header(true).version(FORMAT_VERSION).build().is_ok());
    }

    #[test]
    fn test_operation_and_family_codes() {
        assert_eq!(OperationType::verify(1).unwrap(), OperationType::Sign);
        assert_eq!(OperationType::verify(2).unwrap(), OperationType::PublicEncrypt);
        assert!(matches!(OperationType::verify(3), Err(EnvelopeError::Malformed(_))));
        assert!(matches!(OperationType::verify(0x1_01), Err(EnvelopeError::Malformed(_))));
        assert_eq!(AsymAlgorithmType::verify(2).unwrap(), AsymAlgorithmType::Rsa);
        assert!(AsymAlgorithmType::verify(0).is_err());
    }

    // # ✅ 4. Debug redaction

    #[test]
    fn test_debug_output_hides_auth_key() {
        let secret = "correct horse battery staple";
        let (private, public) = key_pair(Family::Ec);

        let writer = WriterParams::builder(OperationType::Sign, secret, private).build().unwrap();
        assert!(!format!("{:?}", writer).contains("horse"));

        let reader = ReaderParams::builder().auth_key(secret).key(public.clone()).build().unwrap();
        let shown = format!("{:?}", reader);
        assert!(!shown.contains("horse"));
        assert!(shown.contains("<redacted>"));

        let init = ReaderInitParams::new().auth_key(secret).key(public);
        assert!(!format!("{:?}", init).contains("horse"));
    }
}
