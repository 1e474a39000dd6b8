//! Outbound send queue
//!
//! Every session owns one queue. Producers (any session's task) push
//! serialized lines without blocking; the session's writer task drains it
//! onto the socket. A queue that grows past its byte limit kills its session
//! instead of stalling the sender.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Reason recorded when a queue overflows
pub const SENDQ_EXCEEDED: &str = "SendQ exceeded";

#[derive(Debug)]
struct Shared {
    /// Bytes pushed but not yet taken by the writer
    queued: AtomicUsize,
    /// Maximum queued bytes
    max_size: usize,
    /// Cancelled when the session must be torn down
    closer: CancellationToken,
    /// First reason the session was killed for
    kill_reason: Mutex<Option<String>>,
}

impl Shared {
    fn kill(&self, reason: &str) {
        let mut slot = self.kill_reason.lock();
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
        drop(slot);
        self.closer.cancel();
    }
}

/// Producer handle to a session's outbound queue
#[derive(Debug, Clone)]
pub struct SendQueue {
    tx: mpsc::UnboundedSender<Arc<str>>,
    shared: Arc<Shared>,
}

/// Writer side of a [`SendQueue`]
#[derive(Debug)]
pub struct SendQueueReceiver {
    rx: mpsc::UnboundedReceiver<Arc<str>>,
    shared: Arc<Shared>,
}

impl SendQueue {
    /// Create a queue limited to `max_size` bytes.
    ///
    /// `closer` is cancelled when the queue overflows or the session is
    /// killed through [`SendQueue::kill`].
    pub fn new(max_size: usize, closer: CancellationToken) -> (Self, SendQueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            queued: AtomicUsize::new(0),
            max_size,
            closer,
            kill_reason: Mutex::new(None),
        });

        (
            Self {
                tx,
                shared: shared.clone(),
            },
            SendQueueReceiver { rx, shared },
        )
    }

    /// Queue a serialized line.
    /// Returns false if the line was dropped.
    pub fn push(&self, line: Arc<str>) -> bool {
        if self.shared.closer.is_cancelled() {
            return false;
        }

        let size = line.len();
        let previous = self.shared.queued.fetch_add(size, Ordering::AcqRel);
        if previous + size > self.shared.max_size {
            self.shared.queued.fetch_sub(size, Ordering::AcqRel);
            tracing::warn!(
                "SendQueue full ({}/{}), disconnecting",
                previous,
                self.shared.max_size
            );
            self.shared.kill(SENDQ_EXCEEDED);
            return false;
        }

        if self.tx.send(line).is_err() {
            // Writer already gone
            self.shared.queued.fetch_sub(size, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Tear the session down with `reason`.
    /// Only the first reason is kept.
    pub fn kill(&self, reason: &str) {
        self.shared.kill(reason);
    }

    /// Why the session was killed, if it was
    pub fn kill_reason(&self) -> Option<String> {
        self.shared.kill_reason.lock().clone()
    }

    /// Bytes currently waiting for the writer
    pub fn queued_bytes(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Maximum queued bytes
    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }
}

impl SendQueueReceiver {
    /// Wait for the next line
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        let line = self.rx.recv().await?;
        self.shared.queued.fetch_sub(line.len(), Ordering::AcqRel);
        Some(line)
    }

    /// Take a line only if one is already queued
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        let line = self.rx.try_recv().ok()?;
        self.shared.queued.fetch_sub(line.len(), Ordering::AcqRel);
        Some(line)
    }

    /// Tear the session down from the writer side
    pub fn kill(&self, reason: &str) {
        self.shared.kill(reason);
    }
}
