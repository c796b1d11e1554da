//! writer/mod.rs
//! Async envelope writer.
//!
//! Design notes:
//! - `Writer` is a cheap handle (clone it freely); the state lives behind a
//!   `tokio::sync::Mutex` and every public call is queued on one
//!   [`OrderSafety`], so the output order is the call order.
//! - Output goes through a bounded channel (see [`EnvelopeStream`]): a
//!   consumer that falls behind suspends the writer, nothing is dropped.
//! - The returned futures are `Send + 'static` and can be spawned.
//!
//! Usage sketch:
//! ```ignore
//! let (writer, stream) = Writer::new(params)?;
//! let collector = tokio::spawn(stream.collect_bytes());
//! writer.write(&b"payload"[..]).await?;
//! writer.finish().await?;
//! let envelope = collector.await??;
//! ```

pub mod delegate;
pub mod params;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::custom_chunk::CustomChunk;
use crate::order::OrderSafety;
use crate::stream::{self, EnvelopeStream, StreamItem};
use crate::telemetry::{Stage, TelemetrySnapshot};
use crate::tsa::{self, TimestampAuthority};
use crate::types::EnvelopeError;

pub use delegate::WriteState;
pub use params::{WriterOptions, WriterParams, WriterParamsBuilder};

use delegate::WriterDelegate;

struct WriterCore {
    delegate: WriterDelegate,
    out: Option<mpsc::Sender<StreamItem>>,
}

impl WriterCore {
    async fn emit(&self, pieces: Vec<Bytes>) -> Result<(), EnvelopeError> {
        let tx = self.out.as_ref().ok_or(EnvelopeError::Closed)?;
        stream::send_all(tx, pieces).await
    }

    async fn emit_error(&self, err: EnvelopeError) -> Result<(), EnvelopeError> {
        let tx = self.out.as_ref().ok_or(EnvelopeError::Closed)?;
        tx.send(Err(err)).await.map_err(|_| EnvelopeError::Closed)
    }
}

#[derive(Clone)]
pub struct Writer {
    core: Arc<Mutex<WriterCore>>,
    order: OrderSafety,
    authority: Option<Arc<dyn TimestampAuthority>>,
    tsa_timeout: Duration,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("authority", &self.authority)
            .field("tsa_timeout", &self.tsa_timeout)
            .field("in_flight", &self.order.in_flight())
            .finish_non_exhaustive()
    }
}

impl Writer {
    pub fn new(params: WriterParams) -> Result<(Writer, EnvelopeStream), EnvelopeError> {
        params.validate()?;
        let (tx, rx) = stream::channel(params.output_capacity);
        let delegate = WriterDelegate::new(&params);
        let writer = Writer {
            core: Arc::new(Mutex::new(WriterCore { delegate, out: Some(tx) })),
            order: OrderSafety::new(),
            authority: params.timestamp_authority.clone(),
            tsa_timeout: params.tsa_timeout,
        };
        Ok((writer, rx))
    }

    /// Emit the prefix and header section. Implied by every other call.
    pub fn init(&self) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        let core = Arc::clone(&self.core);
        self.order.run(async move {
            let mut core = core.lock().await;
            let pieces = core.delegate.init()?;
            core.emit(pieces).await
        })
    }

    /// Fails with `NotAllowedAfterData` once `write` has been called.
    pub fn add_custom_chunk(
        &self,
        chunk: CustomChunk,
    ) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        let core = Arc::clone(&self.core);
        self.order.run(async move {
            let mut core = core.lock().await;
            let pieces = core.delegate.add_custom_chunk(&chunk)?;
            core.emit(pieces).await
        })
    }

    pub fn write(&self, data: impl Into<Bytes>) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        let data: Bytes = data.into();
        let core = Arc::clone(&self.core);
        self.order.run(async move {
            let mut core = core.lock().await;
            let pieces = core.delegate.write(&data)?;
            core.emit(pieces).await
        })
    }

    /// Flush, seal, optionally timestamp, terminate and close the stream.
    ///
    /// A failed timestamp request is reported as an `Err` item on the
    /// stream; the envelope itself still completes.
    pub fn finish(&self) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        let core = Arc::clone(&self.core);
        let authority = self.authority.clone();
        let timeout = self.tsa_timeout;
        self.order.run(async move {
            let mut core = core.lock().await;
            if core.delegate.state() == WriteState::Finished {
                return Err(EnvelopeError::Closed);
            }
            let (pieces, fingerprint) = core.delegate.finish_body()?;
            core.emit(pieces).await?;

            if let Some(authority) = authority {
                let started = Instant::now();
                let alg = core.delegate.fingerprint_algorithm();
                match tsa::fetch_token(authority.as_ref(), alg, &fingerprint, timeout).await {
                    Ok(token) => {
                        let piece = core.delegate.timestamp_chunk(token)?;
                        core.emit(vec![piece]).await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "timestamp request failed, envelope left without token");
                        core.emit_error(EnvelopeError::Timestamp(e)).await?;
                    }
                }
                core.delegate.record_stage(Stage::Timestamp, started);
            }

            let end = core.delegate.terminate();
            core.emit(vec![end]).await?;
            core.out = None;
            Ok(())
        })
    }

    pub fn state(&self) -> impl Future<Output = WriteState> + Send + 'static {
        let core = Arc::clone(&self.core);
        async move { core.lock().await.delegate.state() }
    }

    /// Snapshot taken after every earlier call has completed.
    pub fn telemetry(&self) -> impl Future<Output = TelemetrySnapshot> + Send + 'static {
        let core = Arc::clone(&self.core);
        self.order.run(async move { core.lock().await.delegate.snapshot() })
    }
}
