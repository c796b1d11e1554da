//! chunks/mod.rs
//! Chunk model of the version 4 payload.
//!
//! Industry notes:
//! - Every logical unit of the payload is a self-delimiting DER record, so
//!   a reader can skip or buffer chunks without understanding their content.
//! - Protocol ids live below 0x80; callers own everything above.

pub mod types;
pub mod codec;
pub mod registry;

pub use types::*;
pub use codec::{encode_payload, encode_record, split_record, ChunkCodec};
pub use registry::{ChunkDescriptor, ChunkRegistry, DecodeFn, STANDARD_CHUNKS};
