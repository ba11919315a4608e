use std::cell::Cell;
use std::rc::Rc;

use tokio::sync::{mpsc, Notify};

use crate::error::SendError;

/// Default send-queue capacity (spec.md §4.4/§6).
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// The bounded outbound FIFO (spec.md §3 "Send Queue", §4.4). `send`/
/// `send_bs` are async and suspend the caller when the queue is full —
/// the backpressure mechanism against handler storms (spec.md §8.3).
/// `close` makes every subsequent `send` fail with [`SendError`], while
/// the writer still drains whatever was enqueued before the close.
pub struct SendQueue {
    tx: mpsc::Sender<Vec<u8>>,
    closed: Rc<Cell<bool>>,
    closed_notify: Rc<Notify>,
}

/// The writer's half, not `Clone`: exactly one writer task drains this
/// per session (spec.md §3 invariant: "exactly one reader, one writer,
/// one dispatcher").
///
/// `rx` is exposed for tests that want to drain raw frames directly;
/// session code must go through [`SendQueueReceiver::recv`], which is the
/// only path that reacts to [`SendQueue::close`] — the owning
/// `IrcState`'s `tx` clone outlives the session (see `IrcState`), so the
/// channel itself never closes on its own.
pub struct SendQueueReceiver {
    pub rx: mpsc::Receiver<Vec<u8>>,
    closed_notify: Rc<Notify>,
}

impl SendQueueReceiver {
    /// Next queued frame, or `None` once the queue is closed and fully
    /// drained. Biased so that anything already buffered is always
    /// returned before the close is observed (spec.md §8 S6: "disconnect
    /// drains the queue before `on_disconnect` runs").
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        tokio::select! {
            biased;
            msg = self.rx.recv() => msg,
            _ = self.closed_notify.notified() => self.rx.try_recv().ok(),
        }
    }
}

impl SendQueue {
    pub fn new(capacity: usize) -> (SendQueue, SendQueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let closed_notify = Rc::new(Notify::new());
        (
            SendQueue {
                tx,
                closed: Rc::new(Cell::new(false)),
                closed_notify: closed_notify.clone(),
            },
            SendQueueReceiver { rx, closed_notify },
        )
    }

    /// Enqueue a pre-serialised wire frame (no trailing CRLF required; the
    /// writer appends it). Suspends while the queue is full.
    pub async fn send_bs(&self, bytes: Vec<u8>) -> Result<(), SendError> {
        if self.closed.get() {
            return Err(SendError);
        }
        self.tx.send(bytes).await.map_err(|_| SendError)
    }

    pub async fn send(&self, line: String) -> Result<(), SendError> {
        self.send_bs(line.into_bytes()).await
    }

    /// Close the queue: no further `send`/`send_bs` call succeeds, and
    /// wakes the writer so its `recv` loop terminates once it has drained
    /// whatever was already enqueued — rather than blocking forever on a
    /// channel whose `Sender` the caller (`IrcState`) keeps alive for the
    /// whole session. Idempotent; safe to call from multiple places
    /// (reader EOF/timeout, explicit `disconnect`).
    pub fn close(&self) {
        self.closed.set(true);
        self.closed_notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}


impl Clone for SendQueue {
    fn clone(&self) -> Self {
        SendQueue {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
            closed_notify: self.closed_notify.clone(),
        }
    }
}
