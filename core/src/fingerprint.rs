//! fingerprint.rs
//! Running content hash over raw chunk bytes.
//!
//! Design notes:
//! - The hash algorithm is declared by the DefaultHeader chunk, which is
//!   itself hashed. Until it is known every span is queued, then replayed in
//!   arrival order.
//! - The Fingerprint chunk is never fed; `freeze` stores the digest and turns
//!   every later update into a no-op.

use crate::crypto::{DigestState, HashAlgorithm};

#[derive(Debug)]
enum State {
    Pending(Vec<Vec<u8>>),
    Hashing(HashAlgorithm, DigestState),
    Frozen(HashAlgorithm, Vec<u8>),
}

#[derive(Debug)]
pub struct FingerprintAccumulator {
    state: State,
}

impl Default for FingerprintAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintAccumulator {
    /// Algorithm unknown; spans are queued.
    pub fn new() -> Self {
        Self { state: State::Pending(Vec::new()) }
    }

    /// Algorithm known up front (writer side).
    pub fn with_algorithm(alg: HashAlgorithm) -> Self {
        Self { state: State::Hashing(alg, alg.hasher()) }
    }

    pub fn update(&mut self, span: &[u8]) {
        match &mut self.state {
            State::Pending(queue) => queue.push(span.to_vec()),
            State::Hashing(_, h) => h.update(span),
            State::Frozen(..) => {}
        }
    }

    /// Select the algorithm and replay the queue. No-op once selected.
    pub fn select(&mut self, alg: HashAlgorithm) {
        if let State::Pending(queue) = &mut self.state {
            let mut hasher = alg.hasher();
            for span in queue.drain(..) {
                hasher.update(&span);
            }
            self.state = State::Hashing(alg, hasher);
        }
    }

    /// Finish the hash and keep the digest. Returns `None` while pending.
    pub fn freeze(&mut self) -> Option<Vec<u8>> {
        let state = std::mem::replace(&mut self.state, State::Pending(Vec::new()));
        let (next, digest) = match state {
            State::Hashing(alg, h) => {
                let digest = h.finalize();
                (State::Frozen(alg, digest.clone()), Some(digest))
            }
            State::Frozen(alg, digest) => {
                let out = digest.clone();
                (State::Frozen(alg, digest), Some(out))
            }
            pending @ State::Pending(_) => (pending, None),
        };
        self.state = next;
        digest
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending(_))
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, State::Frozen(..))
    }

    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        match &self.state {
            State::Pending(_) => None,
            State::Hashing(alg, _) | State::Frozen(alg, _) => Some(*alg),
        }
    }

    pub fn digest(&self) -> Option<&[u8]> {
        match &self.state {
            State::Frozen(_, d) => Some(d),
            _ => None,
        }
    }

    /// Bytes waiting for the algorithm.
    pub fn queued_len(&self) -> usize {
        match &self.state {
            State::Pending(q) => q.iter().map(Vec::len).sum(),
            _ => 0,
        }
    }
}
