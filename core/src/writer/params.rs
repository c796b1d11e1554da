//! writer/params.rs
//! Writer configuration: secrets and keys in `WriterParams`, serializable
//! knobs in `WriterOptions`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::constants::{DEFAULT_OUTPUT_CAPACITY, DEFAULT_TSA_TIMEOUT_MS, FORMAT_VERSION};
use crate::keys::KeyRef;
use crate::signature::delegate_version;
use crate::tsa::TimestampAuthority;
use crate::types::{EnvelopeError, OperationType};

/// Non-secret writer settings, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Omit the 16-byte signature prefix.
    pub exclude_header: bool,
    pub version: u8,
    /// RFC 3161 endpoint; requires the `tsa-http` feature.
    pub tsa_location: Option<String>,
    pub tsa_timeout_ms: u64,
    /// Output channel capacity in chunks.
    pub output_capacity: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            exclude_header: false,
            version: FORMAT_VERSION,
            tsa_location: None,
            tsa_timeout_ms: DEFAULT_TSA_TIMEOUT_MS,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

impl WriterOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

pub struct WriterParams {
    pub operation: OperationType,
    pub auth_key: Zeroizing<Vec<u8>>,
    pub key: KeyRef,
    pub exclude_header: bool,
    pub version: u8,
    pub timestamp_authority: Option<Arc<dyn TimestampAuthority>>,
    pub tsa_timeout: Duration,
    pub output_capacity: usize,
}

impl std::fmt::Debug for WriterParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterParams")
            .field("operation", &self.operation)
            .field("key", &self.key)
            .field("exclude_header", &self.exclude_header)
            .field("version", &self.version)
            .field("timestamp_authority", &self.timestamp_authority)
            .field("tsa_timeout", &self.tsa_timeout)
            .field("output_capacity", &self.output_capacity)
            .finish_non_exhaustive()
    }
}

impl WriterParams {
    pub fn builder(operation: OperationType, auth_key: impl AsRef<[u8]>, key: KeyRef) -> WriterParamsBuilder {
        WriterParamsBuilder {
            operation,
            auth_key: Zeroizing::new(auth_key.as_ref().to_vec()),
            key,
            options: WriterOptions::default(),
            timestamp_authority: None,
        }
    }

    /// Setup-time misuse checks.
    pub(crate) fn validate(&self) -> Result<(), EnvelopeError> {
        delegate_version(self.version)?;
        match self.operation {
            OperationType::Sign => {
                if !self.key.is_private() {
                    return Err(EnvelopeError::InvalidKey("signing needs a private key".into()));
                }
                if !self.key.can_sign() {
                    return Err(EnvelopeError::InvalidKey("key cannot sign".into()));
                }
            }
            OperationType::PublicEncrypt => {
                if !self.key.is_public() {
                    return Err(EnvelopeError::InvalidKey("encryption needs a public key".into()));
                }
                if !self.key.can_public_encrypt() && !self.key.can_key_agreement() {
                    return Err(EnvelopeError::InvalidKey(
                        "key supports neither public encryption nor key agreement".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub struct WriterParamsBuilder {
    operation: OperationType,
    auth_key: Zeroizing<Vec<u8>>,
    key: KeyRef,
    options: WriterOptions,
    timestamp_authority: Option<Arc<dyn TimestampAuthority>>,
}

impl WriterParamsBuilder {
    pub fn options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn exclude_header(mut self, exclude: bool) -> Self {
        self.options.exclude_header = exclude;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.options.version = version;
        self
    }

    pub fn tsa_location(mut self, location: impl Into<String>) -> Self {
        self.options.tsa_location = Some(location.into());
        self
    }

    /// Custom transport; takes precedence over `tsa_location`.
    pub fn timestamp_authority(mut self, authority: Arc<dyn TimestampAuthority>) -> Self {
        self.timestamp_authority = Some(authority);
        self
    }

    pub fn tsa_timeout(mut self, timeout: Duration) -> Self {
        self.options.tsa_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.options.output_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<WriterParams, EnvelopeError> {
        let timestamp_authority = match (self.timestamp_authority, self.options.tsa_location) {
            (Some(authority), _) => Some(authority),
            (None, Some(location)) => Some(http_authority(location)?),
            (None, None) => None,
        };
        let params = WriterParams {
            operation: self.operation,
            auth_key: self.auth_key,
            key: self.key,
            exclude_header: self.options.exclude_header,
            version: self.options.version,
            timestamp_authority,
            tsa_timeout: Duration::from_millis(self.options.tsa_timeout_ms),
            output_capacity: self.options.output_capacity,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(feature = "tsa-http")]
fn http_authority(location: String) -> Result<Arc<dyn TimestampAuthority>, EnvelopeError> {
    Ok(Arc::new(crate::tsa::HttpTimestampAuthority::new(location)))
}

#[cfg(not(feature = "tsa-http"))]
fn http_authority(_location: String) -> Result<Arc<dyn TimestampAuthority>, EnvelopeError> {
    Err(EnvelopeError::Timestamp(crate::tsa::TimestampError::Transport(
        "built without the tsa-http feature".into(),
    )))
}
