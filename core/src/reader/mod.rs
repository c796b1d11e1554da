//! reader/mod.rs
//! Async envelope reader.
//!
//! Design notes:
//! - Input goes in through [`Reader::write`], plaintext comes out of the
//!   [`EnvelopeStream`], and [`ReaderEvents`] carries the header-complete
//!   notification plus every custom chunk.
//! - After header complete the reader needs key material. Writes issued
//!   after that point wait on an init gate (a `watch` channel) until
//!   [`Reader::init`] succeeds; they never hold the state lock while
//!   waiting, so `init` can always get in.
//! - With both `auth_key` and `key` in [`ReaderParams`] (or an `init` call
//!   made before the header completed) the reader initializes itself.
//! - `finish` only waits on the gate when key material was offered. A reader
//!   nobody initializes fails its `finish` with `MissingKeyMaterial`.
//! - Plaintext is released as it decrypts. It is unauthenticated until
//!   [`Reader::finish`] returns `Ok`; a later failure does not retract it.

pub mod delegate;
pub mod params;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::warn;
use zeroize::Zeroizing;

use crate::custom_chunk::CustomChunk;
use crate::keys::KeyRef;
use crate::order::OrderSafety;
use crate::stream::{self, EnvelopeStream, StreamItem};
use crate::telemetry::TelemetrySnapshot;
use crate::types::{EnvelopeError, OperationType};

pub use delegate::{ReadPhase, ReadStep};
pub use params::{ReaderInitParams, ReaderOptions, ReaderParams, ReaderParamsBuilder};

use delegate::ReaderDelegate;

/// Out-of-band notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderEvent {
    /// Header parsed; call [`Reader::init`] to resume.
    HeaderComplete,
    CustomChunk(CustomChunk),
}

#[derive(Debug)]
pub struct ReaderEvents {
    rx: mpsc::UnboundedReceiver<ReaderEvent>,
}

impl ReaderEvents {
    pub async fn recv(&mut self) -> Option<ReaderEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ReaderEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for ReaderEvents {
    type Item = ReaderEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum InitStatus {
    Pending,
    Ready,
    Failed(String),
}

struct ReaderCore {
    delegate: ReaderDelegate,
    out: Option<mpsc::Sender<StreamItem>>,
    events: Option<mpsc::UnboundedSender<ReaderEvent>>,
    gate: watch::Sender<InitStatus>,
    auth_key: Option<Zeroizing<Vec<u8>>>,
    key: Option<KeyRef>,
    /// Initialize as soon as the header completes.
    init_requested: bool,
}

impl ReaderCore {
    async fn dispatch(&self, steps: Vec<ReadStep>) -> Result<(), EnvelopeError> {
        for step in steps {
            match step {
                ReadStep::HeaderComplete => self.notify(ReaderEvent::HeaderComplete),
                ReadStep::Custom(chunk) => self.notify(ReaderEvent::CustomChunk(chunk)),
                ReadStep::Plaintext(bytes) => {
                    let tx = self.out.as_ref().ok_or(EnvelopeError::Closed)?;
                    stream::send_all(tx, [bytes]).await?;
                }
            }
        }
        Ok(())
    }

    fn notify(&self, event: ReaderEvent) {
        if let Some(events) = &self.events {
            // nobody listening is fine
            let _ = events.send(event);
        }
    }

    fn merge_keys(&mut self, params: ReaderInitParams) {
        if params.auth_key.is_some() {
            self.auth_key = params.auth_key;
        }
        if params.key.is_some() {
            self.key = params.key;
        }
    }

    async fn run_init(&mut self) -> Result<(), EnvelopeError> {
        let auth_key = self
            .auth_key
            .clone()
            .ok_or(EnvelopeError::MissingKeyMaterial("auth key"))?;
        match self.delegate.init(&auth_key, self.key.clone()) {
            Ok(steps) => {
                self.gate.send_replace(InitStatus::Ready);
                self.dispatch(steps).await
            }
            Err(e) => {
                warn!(error = %e, "reader init failed");
                self.gate.send_replace(InitStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        self.out = None;
        self.events = None;
    }
}

#[derive(Clone)]
pub struct Reader {
    core: Arc<Mutex<ReaderCore>>,
    order: OrderSafety,
    gate: watch::Receiver<InitStatus>,
    header_complete: Arc<AtomicBool>,
    /// Keys were given to `new` or `init` was called.
    init_expected: Arc<AtomicBool>,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("header_complete", &self.header_complete.load(Ordering::SeqCst))
            .field("init", &*self.gate.borrow())
            .field("in_flight", &self.order.in_flight())
            .finish()
    }
}

/// Resolve once writes may proceed.
async fn pass_gate(mut gate: watch::Receiver<InitStatus>, header_complete: &AtomicBool) -> Result<(), EnvelopeError> {
    if !header_complete.load(Ordering::SeqCst) {
        return Ok(());
    }
    let status = gate
        .wait_for(|s| *s != InitStatus::Pending)
        .await
        .map_err(|_| EnvelopeError::Closed)?
        .clone();
    match status {
        InitStatus::Failed(reason) => Err(EnvelopeError::InitFailed(reason)),
        _ => Ok(()),
    }
}

impl Reader {
    pub fn new(params: ReaderParams) -> Result<(Reader, EnvelopeStream, ReaderEvents), EnvelopeError> {
        params.validate()?;
        let (tx, out) = stream::channel(params.output_capacity);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (gate_tx, gate_rx) = watch::channel(InitStatus::Pending);
        let init_requested = params.auth_key.is_some() && params.key.is_some();
        let core = ReaderCore {
            delegate: ReaderDelegate::new(&params),
            out: Some(tx),
            events: Some(events_tx),
            gate: gate_tx,
            auth_key: params.auth_key,
            key: params.key,
            init_requested,
        };
        let reader = Reader {
            core: Arc::new(Mutex::new(core)),
            order: OrderSafety::new(),
            gate: gate_rx,
            header_complete: Arc::new(AtomicBool::new(false)),
            init_expected: Arc::new(AtomicBool::new(init_requested)),
        };
        Ok((reader, out, ReaderEvents { rx: events_rx }))
    }

    /// Feed envelope bytes. Once the header completes, later writes wait for
    /// `init` (or fail with its error).
    pub fn write(&self, data: impl Into<Bytes>) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        let data: Bytes = data.into();
        let core = Arc::clone(&self.core);
        let gate = self.gate.clone();
        let header_complete = Arc::clone(&self.header_complete);
        self.order.run(async move {
            pass_gate(gate, &header_complete).await?;
            let mut core = core.lock().await;
            let steps = match core.delegate.write(&data) {
                Ok(steps) => steps,
                Err(e) => {
                    core.close();
                    return Err(e);
                }
            };
            let completed = core.delegate.header_complete() && !header_complete.swap(true, Ordering::SeqCst);
            core.dispatch(steps).await?;
            if completed && core.init_requested {
                core.run_init().await?;
            }
            Ok(())
        })
    }

    /// Supply key material. Before header complete the keys are kept and
    /// applied automatically when it happens.
    pub fn init(&self, params: ReaderInitParams) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        self.init_expected.store(true, Ordering::SeqCst);
        let core = Arc::clone(&self.core);
        async move {
            let mut core = core.lock().await;
            core.merge_keys(params);
            if !core.delegate.header_complete() {
                core.init_requested = true;
                return Ok(());
            }
            core.run_init().await
        }
    }

    /// End of input: verify and release the last plaintext.
    pub fn finish(&self) -> impl Future<Output = Result<(), EnvelopeError>> + Send + 'static {
        let core = Arc::clone(&self.core);
        let gate = self.gate.clone();
        let header_complete = Arc::clone(&self.header_complete);
        let init_expected = Arc::clone(&self.init_expected);
        self.order.run(async move {
            if init_expected.load(Ordering::SeqCst) {
                pass_gate(gate, &header_complete).await?;
            }
            let mut core = core.lock().await;
            let result = match core.delegate.finish() {
                Ok(Some(tail)) => core.dispatch(vec![ReadStep::Plaintext(tail)]).await,
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            core.close();
            result
        })
    }

    /// Bytes past this many are ignored as trailer.
    pub fn set_known_size(&self, size: u64) -> impl Future<Output = ()> + Send + 'static {
        let core = Arc::clone(&self.core);
        self.order.run(async move { core.lock().await.delegate.set_known_size(size) })
    }

    /// Custom chunk by caller id; `HeaderIncomplete` before header complete.
    pub async fn get_custom_chunk(&self, id: u32) -> Result<Option<CustomChunk>, EnvelopeError> {
        self.core.lock().await.delegate.custom_chunk(id)
    }

    pub async fn custom_chunks(&self) -> Vec<CustomChunk> {
        self.core.lock().await.delegate.custom_chunks()
    }

    pub async fn operation(&self) -> Option<OperationType> {
        self.core.lock().await.delegate.operation()
    }

    pub async fn phase(&self) -> ReadPhase {
        self.core.lock().await.delegate.phase()
    }

    pub async fn is_ready(&self) -> bool {
        self.core.lock().await.delegate.is_ready()
    }

    pub async fn timestamp_token(&self) -> Option<Vec<u8>> {
        self.core.lock().await.delegate.timestamp_token()
    }

    /// Fingerprint computed over the stream (after the Fingerprint chunk).
    pub async fn fingerprint(&self) -> Option<Vec<u8>> {
        self.core.lock().await.delegate.fingerprint()
    }

    pub async fn telemetry(&self) -> TelemetrySnapshot {
        self.core.lock().await.delegate.snapshot()
    }
}
