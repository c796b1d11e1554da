//! order.rs
//! Single-flight FIFO execution guard for one writer or reader.
//!
//! Design notes:
//! - A ticket is drawn synchronously when an operation is *called*, so the
//!   queue position is the call order even if the returned futures are
//!   polled in another order.
//! - A ticket finishes when it is dropped: after success, after failure, or
//!   when the caller abandons the future. Later tickets are never stranded.
//! - Waiting is a `tokio::sync::watch` subscription; nothing polls on a timer.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

#[derive(Debug)]
struct Progress {
    serving: u64,
    finished: BTreeSet<u64>,
}

#[derive(Debug)]
struct Inner {
    next: AtomicU64,
    progress: Mutex<Progress>,
    serving: watch::Sender<u64>,
}

#[derive(Clone, Debug)]
pub struct OrderSafety {
    inner: Arc<Inner>,
}

impl Default for OrderSafety {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderSafety {
    pub fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                next: AtomicU64::new(0),
                progress: Mutex::new(Progress { serving: 0, finished: BTreeSet::new() }),
                serving,
            }),
        }
    }

    /// Reserve the next slot.
    pub fn ticket(&self) -> Ticket {
        let id = self.inner.next.fetch_add(1, Ordering::SeqCst);
        Ticket { id, inner: Arc::clone(&self.inner) }
    }

    /// Run `op` once every earlier operation has finished.
    pub fn run<F, T>(&self, op: F) -> impl Future<Output = T> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.ticket();
        async move {
            ticket.ready().await;
            let out = op.await;
            drop(ticket);
            out
        }
    }

    /// Operations issued but not yet finished.
    pub fn in_flight(&self) -> u64 {
        // `next` is read under the lock: every ticket counted in `progress`
        // was issued before it was finished.
        let progress = self.inner.progress.lock().unwrap_or_else(|p| p.into_inner());
        let issued = self.inner.next.load(Ordering::SeqCst);
        issued.saturating_sub(progress.serving + progress.finished.len() as u64)
    }
}

/// Position in the queue; finishing is tied to drop.
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    inner: Arc<Inner>,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve when this ticket is being served.
    pub async fn ready(&self) {
        let mut rx = self.inner.serving.subscribe();
        let id = self.id;
        // The sender lives in `inner`, which this ticket keeps alive.
        let _ = rx.wait_for(|serving| *serving == id).await;
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut progress = self.inner.progress.lock().unwrap_or_else(|p| p.into_inner());
        progress.finished.insert(self.id);
        let before = progress.serving;
        loop {
            let serving = progress.serving;
            if !progress.finished.remove(&serving) {
                break;
            }
            progress.serving += 1;
        }
        if progress.serving != before {
            self.inner.serving.send_replace(progress.serving);
        }
    }
}
