// ABOUTME: Bounded byte/frame channels whose closed state is a shared cancellation token.
// ABOUTME: Enqueue on a closed queue is a silent no-op; dequeue on a closed queue returns Closed.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Capacity of the raw byte queue between the RX pump and the frame parser.
pub const BYTE_QUEUE_CAPACITY: usize = 512;
/// Capacity of the decoded frame queue feeding the TX pump.
pub const FRAME_QUEUE_CAPACITY: usize = 2;
/// Capacity of the application payload queue a client's `write` calls feed.
pub const APP_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    Item(T),
    TimedOut,
    Closed,
}

#[derive(Clone)]
pub struct QueueTx<T> {
    inner: mpsc::Sender<T>,
    closed: CancellationToken,
}

impl<T> QueueTx<T> {
    /// Blocking enqueue; silently drops the item once `closed` has fired.
    pub async fn send(&self, item: T) {
        if self.closed.is_cancelled() {
            return;
        }
        let _ = self.inner.send(item).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

pub struct QueueRx<T> {
    inner: mpsc::Receiver<T>,
    closed: CancellationToken,
}

impl<T> QueueRx<T> {
    /// Blocking dequeue with no timeout: used at resynchronisation points
    /// such as waiting for the next frame's length byte.
    pub async fn recv(&mut self) -> Recv<T> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Recv::Closed,
            item = self.inner.recv() => match item {
                Some(v) => Recv::Item(v),
                None => Recv::Closed,
            },
        }
    }

    /// Dequeue with a per-call timeout, used for every byte after the length byte.
    pub async fn recv_timeout(&mut self, dur: Duration) -> Recv<T> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Recv::Closed,
            result = timeout(dur, self.inner.recv()) => match result {
                Ok(Some(v)) => Recv::Item(v),
                Ok(None) => Recv::Closed,
                Err(_) => Recv::TimedOut,
            },
        }
    }
}

pub fn channel<T>(capacity: usize, closed: CancellationToken) -> (QueueTx<T>, QueueRx<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueTx { inner: tx, closed: closed.clone() }, QueueRx { inner: rx, closed })
}
