//! reader/params.rs
//! Reader configuration and the late-supplied key material for `init`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::chunks::ChunkRegistry;
use crate::constants::DEFAULT_OUTPUT_CAPACITY;
use crate::keys::KeyRef;
use crate::signature::delegate_version;
use crate::types::EnvelopeError;

/// Non-secret reader settings, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Input starts directly at the payload; `version` must be set.
    pub exclude_header: bool,
    pub version: Option<u8>,
    pub output_capacity: usize,
    /// Parse at most this many input bytes as envelope.
    pub known_size: Option<u64>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { exclude_header: false, version: None, output_capacity: DEFAULT_OUTPUT_CAPACITY, known_size: None }
    }
}

impl ReaderOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

pub struct ReaderParams {
    /// Verification key (Sign) or recipient private key (PublicEncrypt).
    pub key: Option<KeyRef>,
    pub auth_key: Option<Zeroizing<Vec<u8>>>,
    pub exclude_header: bool,
    pub version: Option<u8>,
    pub output_capacity: usize,
    pub known_size: Option<u64>,
    pub registry: Arc<ChunkRegistry>,
}

impl std::fmt::Debug for ReaderParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderParams")
            .field("key", &self.key)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("exclude_header", &self.exclude_header)
            .field("version", &self.version)
            .field("output_capacity", &self.output_capacity)
            .field("known_size", &self.known_size)
            .finish_non_exhaustive()
    }
}

impl ReaderParams {
    pub fn builder() -> ReaderParamsBuilder {
        ReaderParamsBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<(), EnvelopeError> {
        match (self.exclude_header, self.version) {
            (_, Some(v)) => {
                delegate_version(v)?;
            }
            (true, None) => {
                return Err(EnvelopeError::Malformed("header-less input needs an explicit version".into()));
            }
            (false, None) => {}
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ReaderParamsBuilder {
    key: Option<KeyRef>,
    auth_key: Option<Zeroizing<Vec<u8>>>,
    options: ReaderOptions,
    registry: Option<Arc<ChunkRegistry>>,
}

impl ReaderParamsBuilder {
    pub fn key(mut self, key: KeyRef) -> Self {
        self.key = Some(key);
        self
    }

    pub fn auth_key(mut self, auth_key: impl AsRef<[u8]>) -> Self {
        self.auth_key = Some(Zeroizing::new(auth_key.as_ref().to_vec()));
        self
    }

    pub fn options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn exclude_header(mut self, exclude: bool) -> Self {
        self.options.exclude_header = exclude;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.options.version = Some(version);
        self
    }

    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.options.output_capacity = capacity;
        self
    }

    pub fn known_size(mut self, size: u64) -> Self {
        self.options.known_size = Some(size);
        self
    }

    /// Defaults to the process-wide standard registry.
    pub fn registry(mut self, registry: Arc<ChunkRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ReaderParams, EnvelopeError> {
        let params = ReaderParams {
            key: self.key,
            auth_key: self.auth_key,
            exclude_header: self.options.exclude_header,
            version: self.options.version,
            output_capacity: self.options.output_capacity,
            known_size: self.options.known_size,
            registry: self.registry.unwrap_or_else(ChunkRegistry::shared),
        };
        params.validate()?;
        Ok(params)
    }
}

/// Key material handed to `Reader::init`; unset fields fall back to the
/// values given at construction.
#[derive(Clone, Default)]
pub struct ReaderInitParams {
    pub auth_key: Option<Zeroizing<Vec<u8>>>,
    pub key: Option<KeyRef>,
}

impl ReaderInitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_key(mut self, auth_key: impl AsRef<[u8]>) -> Self {
        self.auth_key = Some(Zeroizing::new(auth_key.as_ref().to_vec()));
        self
    }

    pub fn key(mut self, key: KeyRef) -> Self {
        self.key = Some(key);
        self
    }
}

impl std::fmt::Debug for ReaderInitParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderInitParams")
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key)
            .finish()
    }
}
