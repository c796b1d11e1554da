//! stream.rs
//! Output side of writers and readers.
//!
//! Design notes:
//! - Backed by a bounded `tokio::sync::mpsc` channel: a producer that gets
//!   ahead of its consumer suspends on `send` until a slot frees up.
//! - Items are `Result`s so non-fatal failures (a timestamp request that
//!   timed out) can be reported in-band without ending the stream.
//! - The stream ends when the producer drops its sender (after `finish`).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use crate::types::EnvelopeError;

pub type StreamItem = Result<Bytes, EnvelopeError>;

pub(crate) fn channel(capacity: usize) -> (mpsc::Sender<StreamItem>, EnvelopeStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, EnvelopeStream { rx })
}

#[derive(Debug)]
pub struct EnvelopeStream {
    rx: mpsc::Receiver<StreamItem>,
}

impl EnvelopeStream {
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    /// Drain to the end; bytes and in-band errors separately.
    pub async fn collect_parts(mut self) -> (Vec<u8>, Vec<EnvelopeError>) {
        let mut bytes = Vec::new();
        let mut errors = Vec::new();
        while let Some(item) = self.rx.recv().await {
            match item {
                Ok(b) => bytes.extend_from_slice(&b),
                Err(e) => errors.push(e),
            }
        }
        (bytes, errors)
    }

    /// Drain to the end; fails with the first in-band error.
    pub async fn collect_bytes(self) -> Result<Vec<u8>, EnvelopeError> {
        let (bytes, errors) = self.collect_parts().await;
        match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(bytes),
        }
    }
}

impl Stream for EnvelopeStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Push a batch downstream, suspending while the consumer is behind.
pub(crate) async fn send_all(
    tx: &mpsc::Sender<StreamItem>,
    pieces: impl IntoIterator<Item = Bytes>,
) -> Result<(), EnvelopeError> {
    for piece in pieces {
        if piece.is_empty() {
            continue;
        }
        tx.send(Ok(piece)).await.map_err(|_| EnvelopeError::Closed)?;
    }
    Ok(())
}
