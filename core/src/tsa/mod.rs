//! tsa/mod.rs
//! RFC 3161 timestamping of the envelope fingerprint.
//!
//! Design notes:
//! - The transport is pluggable (`TimestampAuthority`); the default HTTP
//!   client lives in `tsa::http` behind the `tsa-http` feature.
//! - `fetch_token` bounds the exchange with `tokio::time::timeout`; the
//!   pending request future is dropped (cancelled) when the timer wins.
//! - Only the `timeStampToken` of a granted response is kept, as raw DER.
//!
//! Wire structures:
//! ```text
//! TimeStampReq  ::= SEQUENCE { version INTEGER(1), messageImprint MessageImprint,
//!                              nonce INTEGER, certReq BOOLEAN }
//! MessageImprint ::= SEQUENCE { hashAlgorithm AlgorithmIdentifier, hashedMessage OCTET STRING }
//! TimeStampResp ::= SEQUENCE { status PKIStatusInfo, timeStampToken ContentInfo OPTIONAL }
//! ```

#[cfg(feature = "tsa-http")]
pub mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use tracing::debug;

use crate::crypto::HashAlgorithm;
use crate::der::{encode, DerError, DerReader};

#[cfg(feature = "tsa-http")]
pub use http::HttpTimestampAuthority;

/// PKIStatus values that carry a token.
const STATUS_GRANTED: u64 = 0;
const STATUS_GRANTED_WITH_MODS: u64 = 1;

pub const TIMESTAMP_QUERY_CONTENT_TYPE: &str = "application/timestamp-query";

#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    #[error("timestamp request timed out after {0:?}")]
    Timeout(Duration),

    #[error("timestamp transport: {0}")]
    Transport(String),

    #[error("timestamp authority answered HTTP {0}")]
    HttpStatus(u16),

    #[error("timestamp rejected with PKIStatus {0}")]
    Rejected(u64),

    #[error("malformed timestamp response: {0}")]
    Malformed(String),
}

impl From<DerError> for TimestampError {
    fn from(e: DerError) -> Self {
        TimestampError::Malformed(e.to_string())
    }
}

/// One round trip to a timestamp authority.
#[async_trait]
pub trait TimestampAuthority: Send + Sync + fmt::Debug {
    /// Send a DER `TimeStampReq`, return the DER `TimeStampResp`.
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TimestampError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampRequest {
    pub hash_algorithm: HashAlgorithm,
    pub hashed_message: Vec<u8>,
    pub nonce: [u8; 8],
    pub cert_req: bool,
}

impl TimestampRequest {
    pub fn new(hash_algorithm: HashAlgorithm, hashed_message: &[u8]) -> Self {
        let mut nonce = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self { hash_algorithm, hashed_message: hashed_message.to_vec(), nonce, cert_req: true }
    }

    pub fn to_der(&self) -> Result<Vec<u8>, TimestampError> {
        let version = encode::integer_u64(1);
        let algorithm = encode::algorithm_identifier(self.hash_algorithm.oid(), None)?;
        let hashed = encode::octet_string(&self.hashed_message);
        let imprint = encode::sequence(&[&algorithm, &hashed]);
        let nonce = encode::integer_unsigned(&self.nonce);
        let cert_req = encode::boolean(self.cert_req);
        Ok(encode::sequence(&[&version, &imprint, &nonce, &cert_req]))
    }
}

/// Extract the token of a granted `TimeStampResp`.
pub fn parse_response(der: &[u8]) -> Result<Vec<u8>, TimestampError> {
    let mut outer = DerReader::new(der);
    let mut resp = outer.read_sequence()?;
    let mut status_info = resp.read_sequence()?;
    let status = status_info.read_u64()?;
    if status != STATUS_GRANTED && status != STATUS_GRANTED_WITH_MODS {
        return Err(TimestampError::Rejected(status));
    }
    if resp.is_empty() {
        return Err(TimestampError::Malformed("granted response without token".into()));
    }
    let token = resp.read_any_raw()?.to_vec();
    Ok(token)
}

/// Request a token over `digest`, bounded by `timeout`.
pub async fn fetch_token(
    authority: &dyn TimestampAuthority,
    hash_algorithm: HashAlgorithm,
    digest: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, TimestampError> {
    let request = TimestampRequest::new(hash_algorithm, digest).to_der()?;
    debug!(len = request.len(), "timestamp request");
    let response = tokio::time::timeout(timeout, authority.exchange(&request))
        .await
        .map_err(|_| TimestampError::Timeout(timeout))??;
    let token = parse_response(&response)?;
    debug!(len = token.len(), "timestamp token received");
    Ok(token)
}
