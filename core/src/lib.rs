//! envelope-core
//!
//! Streaming, versioned, authenticated envelope: sign or public-key encrypt
//! a byte stream, attach caller metadata chunks, fingerprint and optionally
//! timestamp the result. Pure Rust, no FFI.
//!
//! Integrator note: the reader releases plaintext as it decrypts. Nothing is
//! authenticated until `Reader::finish` returns `Ok`, and plaintext already
//! delivered is not retracted when a later check fails.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;

// Encoding and primitives
pub mod der;
pub mod chunks;
pub mod crypto;
pub mod keys;

// Envelope building blocks
pub mod fingerprint;
pub mod order;
pub mod signature;
pub mod custom_chunk;
pub mod stream;
pub mod tsa;
pub mod telemetry;

// Stream layers
pub mod writer;
pub mod reader;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::custom_chunk::{CustomChunk, CustomChunkFlags};
    pub use crate::keys::{AsymmetricKey, EcKey, KeyRef, RsaKey};
    pub use crate::reader::{Reader, ReaderEvent, ReaderEvents, ReaderInitParams, ReaderOptions, ReaderParams};
    pub use crate::stream::EnvelopeStream;
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::tsa::TimestampAuthority;
    pub use crate::types::{EnvelopeError, OperationType};
    pub use crate::writer::{Writer, WriterOptions, WriterParams};
}
