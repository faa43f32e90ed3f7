use crate::error::SinkError;
use crate::gelf::GELF_LOG_EVENT;
use crate::mapper::convert;
use crate::record::parse_input;
use crate::transport::GelfTransport;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, warn};

/// Notifications raised by a [`GelfStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    /// Every accepted write has completed.
    Drain,
    /// The stream was destroyed.
    Close,
}

struct Inner {
    transport: Arc<dyn GelfTransport>,
    runtime: Handle,
    writable: AtomicBool,
    pending: AtomicUsize,
    drained: Notify,
    observers: Mutex<Vec<mpsc::UnboundedSender<SinkEvent>>>,
}

impl Inner {
    /// Deliver `event` to every live subscriber, forgetting dropped ones.
    fn raise(&self, event: SinkEvent) {
        let mut observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        observers.retain(|tx| tx.send(event).is_ok());
    }
}

/// Writable stream of log records delivered as GELF messages.
///
/// Each `write` converts the record synchronously, hands the message to the
/// transport on a spawned task and returns straight away. The stream counts
/// writes whose transport call has not finished yet; when that count drops
/// back to zero it raises [`SinkEvent::Drain`].
///
/// Cloning yields another handle to the same stream.
#[derive(Clone)]
pub struct GelfStream {
    inner: Arc<Inner>,
}

impl GelfStream {
    /// Create a stream on top of `transport`.
    ///
    /// Must be called from within a Tokio runtime; the runtime is captured so
    /// that later writes may come from any thread.
    pub fn new(transport: Arc<dyn GelfTransport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                runtime: Handle::current(),
                writable: AtomicBool::new(true),
                pending: AtomicUsize::new(0),
                drained: Notify::new(),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connect a [`UdpTransport`](crate::udp::UdpTransport) described by
    /// `config` and wrap it in a stream.
    #[cfg(feature = "udp")]
    pub async fn from_config(
        config: &crate::config::GelfConfig,
    ) -> Result<Self, crate::error::TransportError> {
        let transport = crate::udp::UdpTransport::connect(config).await?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Write one record.
    ///
    /// **Parameters**
    /// - `record`: a JSON object, or a string holding one. Anything else is
    ///   replaced by a diagnostic record that carries the raw input as
    ///   `invalidRecord`.
    ///
    /// **Returns**
    /// - `Ok(WriteHandle)` once the record has been accepted. Awaiting the
    ///   handle yields the transport's outcome; dropping it does not cancel
    ///   the write.
    /// - `Err(SinkError::NotWritable)` after [`end`](Self::end) or
    ///   [`destroy`](Self::destroy). Nothing is sent in that case.
    pub fn write(&self, record: Value) -> Result<WriteHandle, SinkError> {
        if !self.is_writable() {
            warn!("write on a gelf stream that is no longer writable");
            return Err(SinkError::NotWritable);
        }

        let record = parse_input(record).unwrap_or_else(|invalid| {
            warn!(reason = %invalid.reason, "replacing invalid log record");
            invalid.into_record()
        });

        let inner = Arc::clone(&self.inner);
        inner.pending.fetch_add(1, Ordering::SeqCst);
        let message = convert(&record);

        let (done_tx, done_rx) = oneshot::channel();
        self.inner.runtime.spawn(async move {
            let result = inner.transport.emit(GELF_LOG_EVENT, &message).await;
            if let Err(e) = &result {
                warn!(error = %e, "gelf transport failed to deliver message");
            }

            let left = inner.pending.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!(pending = left, "gelf write completed");
            if left == 0 {
                inner.drained.notify_waiters();
                inner.raise(SinkEvent::Drain);
            }
            let _ = done_tx.send(result.map_err(SinkError::Transport));
        });

        Ok(WriteHandle { done: done_rx })
    }

    /// Stop accepting writes, optionally writing one last record first.
    ///
    /// The returned [`Drained`] resolves once every accepted write has
    /// completed, immediately if none are in flight. It need not be awaited.
    pub fn end(&self, record: Option<Value>) -> Drained {
        if let Some(record) = record {
            if let Err(e) = self.write(record) {
                warn!(error = %e, "final record not written");
            }
        }
        self.inner.writable.store(false, Ordering::SeqCst);
        info!(pending = self.pending(), "gelf stream ended");
        Drained { inner: Arc::clone(&self.inner) }
    }

    /// Stop accepting writes right away and raise [`SinkEvent::Close`].
    ///
    /// Writes already handed to the transport still run to completion.
    pub fn destroy(&self) {
        self.inner.writable.store(false, Ordering::SeqCst);
        info!(pending = self.pending(), "gelf stream destroyed");
        self.inner.raise(SinkEvent::Close);
    }

    /// Same as [`destroy`](Self::destroy).
    pub fn destroy_soon(&self) {
        self.destroy();
    }

    /// Receive every [`SinkEvent`] raised after this call, in order.
    ///
    /// The queue is unbounded, so a slow subscriber never misses an event.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn is_writable(&self) -> bool {
        self.inner.writable.load(Ordering::SeqCst)
    }

    /// Number of accepted writes still waiting on the transport.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}

/// Completion of a single accepted write.
#[derive(Debug)]
pub struct WriteHandle {
    done: oneshot::Receiver<Result<(), SinkError>>,
}

impl Future for WriteHandle {
    type Output = Result<(), SinkError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.done)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(SinkError::CompletionDropped)))
    }
}

/// Resolves when a stream has no writes in flight.
///
/// A transport that never completes keeps this pending forever.
pub struct Drained {
    inner: Arc<Inner>,
}

impl Drained {
    pub async fn wait(self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            // register before checking so a completion in between is not missed
            notified.as_mut().enable();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::future::IntoFuture for Drained {
    type Output = ();
    type IntoFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
