//! telemetry/counters.rs
//! Mutable counters kept by one writer or reader.
//!
//! Summary: chunk counts by class and byte counts by kind.
//! Converted into an immutable `TelemetrySnapshot` on demand.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeCounters {
    pub chunks_header: u64,
    pub chunks_data: u64,
    pub chunks_custom: u64,
    pub chunks_footer: u64,
    /// Chunks carried encrypted under the auth key.
    pub chunks_auth_encrypted: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    /// Prefix, chunk framing, header/footer chunks, terminator.
    pub bytes_overhead: u64,
}

impl EnvelopeCounters {
    /// Signature prefix, payload opener or terminator.
    pub fn add_framing(&mut self, len: usize) {
        self.bytes_overhead += len as u64;
    }

    /// Protocol chunk before the first Data chunk.
    pub fn add_header_chunk(&mut self, encoded_len: usize, auth_encrypted: bool) {
        self.chunks_header += 1;
        self.bytes_overhead += encoded_len as u64;
        if auth_encrypted {
            self.chunks_auth_encrypted += 1;
        }
    }

    pub fn add_custom_chunk(&mut self, encoded_len: usize, auth_encrypted: bool) {
        self.chunks_custom += 1;
        self.bytes_overhead += encoded_len as u64;
        if auth_encrypted {
            self.chunks_auth_encrypted += 1;
        }
    }

    /// One Data chunk.
    ///
    /// - `ct_len`: ciphertext carried by the chunk
    /// - `encoded_len`: full record length (framing is the difference)
    pub fn add_data_chunk(&mut self, ct_len: usize, encoded_len: usize) {
        self.chunks_data += 1;
        self.bytes_ciphertext += ct_len as u64;
        self.bytes_overhead += encoded_len.saturating_sub(ct_len) as u64;
    }

    /// Plaintext consumed (writer) or delivered (reader).
    pub fn add_plaintext(&mut self, len: usize) {
        self.bytes_plaintext += len as u64;
    }

    /// MAC, fingerprint, signature or timestamp chunk.
    pub fn add_footer_chunk(&mut self, encoded_len: usize) {
        self.chunks_footer += 1;
        self.bytes_overhead += encoded_len as u64;
    }

    pub fn total_chunks(&self) -> u64 {
        self.chunks_header + self.chunks_data + self.chunks_custom + self.chunks_footer
    }

    /// Bytes written or read as envelope.
    pub fn envelope_bytes(&self) -> u64 {
        self.bytes_ciphertext + self.bytes_overhead
    }

    pub fn merge(&mut self, other: &EnvelopeCounters) {
        *self += other.clone();
    }
}

impl AddAssign for EnvelopeCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.chunks_header         += rhs.chunks_header;
        self.chunks_data           += rhs.chunks_data;
        self.chunks_custom         += rhs.chunks_custom;
        self.chunks_footer         += rhs.chunks_footer;
        self.chunks_auth_encrypted += rhs.chunks_auth_encrypted;

        self.bytes_plaintext  += rhs.bytes_plaintext;
        self.bytes_ciphertext += rhs.bytes_ciphertext;
        self.bytes_overhead   += rhs.bytes_overhead;
    }
}
