// ABOUTME: Overwrite-latest ACK rendezvous between the frame handler and the payload sender.
// ABOUTME: Built on a watch channel so a stray or duplicate ACK can never block the deliverer.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

#[derive(Clone)]
pub struct AckTx(watch::Sender<Option<bool>>);

pub struct AckRx(watch::Receiver<Option<bool>>);

/// A fresh rendezvous, scoped to a single link's lifetime.
pub fn ack_channel() -> (AckTx, AckRx) {
    let (tx, rx) = watch::channel(None);
    (AckTx(tx), AckRx(rx))
}

impl AckTx {
    /// Deliver the ACK's sequence flag. Every call is a distinct "version" to
    /// watch subscribers even when the flag repeats, so duplicate ACKs are
    /// never silently coalesced away.
    pub fn deliver(&self, seq_flag: bool) {
        let _ = self.0.send(Some(seq_flag));
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AckWait {
    Flag(bool),
    TimedOut,
    Closed,
}

impl AckRx {
    /// Wait up to `dur` for the next delivered ACK flag, whatever it is. The
    /// caller decides whether a mismatched flag is a stale duplicate to keep
    /// waiting on, using the same deadline, without calling this again.
    pub async fn wait(&mut self, dur: Duration) -> AckWait {
        match timeout(dur, self.0.changed()).await {
            Ok(Ok(())) => match *self.0.borrow_and_update() {
                Some(flag) => AckWait::Flag(flag),
                None => AckWait::TimedOut,
            },
            Ok(Err(_)) => AckWait::Closed,
            Err(_) => AckWait::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_repeated_flag_as_a_fresh_event_each_time() {
        let (tx, mut rx) = ack_channel();
        tx.deliver(false);
        assert_eq!(rx.wait(Duration::from_millis(50)).await, AckWait::Flag(false));
        tx.deliver(false);
        assert_eq!(rx.wait(Duration::from_millis(50)).await, AckWait::Flag(false));
    }

    #[tokio::test]
    async fn times_out_with_nothing_delivered() {
        let (_tx, mut rx) = ack_channel();
        assert_eq!(rx.wait(Duration::from_millis(10)).await, AckWait::TimedOut);
    }

    #[tokio::test]
    async fn closes_when_sender_dropped() {
        let (tx, mut rx) = ack_channel();
        drop(tx);
        assert_eq!(rx.wait(Duration::from_millis(50)).await, AckWait::Closed);
    }
}
