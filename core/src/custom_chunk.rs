//! custom_chunk.rs
//! Caller-defined metadata chunks.
//!
//! The caller id is offset by `CUSTOM_BEGIN` on the wire. Chunks flagged
//! `ENCRYPT_WITH_AUTH_KEY` are only readable once the auth key is known.

use bitflags::bitflags;
use bytes::Bytes;

use crate::chunks::{custom_wire_id, ChunkFlags, ChunkPayload, PlainChunk};
use crate::constants::chunk_ids::CUSTOM_BEGIN;
use crate::types::EnvelopeError;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CustomChunkFlags: u32 {
        const ENCRYPT_WITH_AUTH_KEY = ChunkFlags::ENCRYPT_WITH_AUTH_KEY.bits();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomChunk {
    pub id: u32,
    pub flags: CustomChunkFlags,
    pub data: Bytes,
}

impl CustomChunk {
    pub fn new(id: u32, flags: CustomChunkFlags, data: impl Into<Bytes>) -> Self {
        Self { id, flags, data: data.into() }
    }

    pub fn builder() -> CustomChunkBuilder {
        CustomChunkBuilder::default()
    }

    #[inline]
    pub fn has_flag(&self, flag: CustomChunkFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Protocol chunk carrying this custom chunk.
    pub fn to_plain_chunk(&self) -> Result<PlainChunk, EnvelopeError> {
        let id = custom_wire_id(self.id)
            .ok_or_else(|| EnvelopeError::Malformed(format!("custom chunk id {} out of range", self.id)))?;
        Ok(PlainChunk {
            id,
            flags: ChunkFlags::from_bits_retain(self.flags.bits()),
            payload: ChunkPayload::Custom(self.data.to_vec()),
        })
    }

    /// Inverse of [`CustomChunk::to_plain_chunk`]; `None` for protocol chunks.
    pub fn from_plain_chunk(chunk: &PlainChunk) -> Option<Self> {
        match &chunk.payload {
            ChunkPayload::Custom(data) if chunk.id >= CUSTOM_BEGIN => Some(Self {
                id: chunk.id - CUSTOM_BEGIN,
                flags: CustomChunkFlags::from_bits_retain(chunk.flags.bits()),
                data: Bytes::copy_from_slice(data),
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CustomChunkBuilder {
    id: u32,
    flags: CustomChunkFlags,
    data: Option<Bytes>,
}

impl CustomChunkBuilder {
    pub fn id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn encrypt_with_auth_key(mut self, enabled: bool) -> Self {
        self.flags.set(CustomChunkFlags::ENCRYPT_WITH_AUTH_KEY, enabled);
        self
    }

    pub fn build(self) -> Result<CustomChunk, EnvelopeError> {
        let data = self.data.ok_or_else(|| EnvelopeError::Malformed("custom chunk data is empty".into()))?;
        Ok(CustomChunk { id: self.id, flags: self.flags, data })
    }
}
