// ABOUTME: Stop-and-wait PUBLISH publisher: one payload in flight at a time, retried up to 5 times.
// ABOUTME: Generic over PayloadSource so the client (app queue) and gateway (upstream TCP) share one loop.

use crate::ack::{AckRx, AckWait};
use crate::codec::{Command, Frame};
use crate::session::SessionCore;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ACK_TIMEOUT: Duration = Duration::from_millis(500);
const MAX_RETRIES: u32 = 5;

/// Where the next PUBLISH payload comes from. The client reads from its
/// bounded app-write queue; the gateway reads from the upstream TCP stream.
///
/// Async-fn-in-trait (not object-safe under native RPITIT), so callers are
/// generic over `S` rather than boxing a trait object.
pub trait PayloadSource: Send {
    /// Blocks for the next payload. `None` signals the source is exhausted
    /// (application closed the write side, or upstream TCP hit EOF/error).
    fn next_payload(&mut self) -> impl std::future::Future<Output = Option<Vec<u8>>> + Send;
}

/// Runs the stop-and-wait publish loop until `source` is exhausted or the
/// link is torn down (ack channel closed / retry budget exhausted).
pub async fn run<S: PayloadSource>(mut source: S, mut ack_rx: AckRx, session: SessionCore) {
    let mut tx_seq_flag = false;

    loop {
        let payload = match source.next_payload().await {
            Some(p) => p,
            None => {
                debug!("payload source exhausted");
                if let Some(frame_tx) = session.current_frame_tx() {
                    frame_tx.send(Frame::control(Command::Disconnect)).await;
                }
                session.drop_link();
                return;
            }
        };

        let Some(frame_tx) = session.current_frame_tx() else { return };
        let frame = Frame::new(Command::Publish, tx_seq_flag, payload);
        let mut retries: u32 = 0;

        loop {
            frame_tx.send(frame.clone()).await;
            let deadline = Instant::now() + ACK_TIMEOUT;

            let outcome = loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break AckOutcome::TimedOut;
                }
                match ack_rx.wait(remaining).await {
                    AckWait::Flag(flag) if flag == tx_seq_flag => break AckOutcome::Matched,
                    AckWait::Flag(_) => continue, // stale duplicate: keep waiting on the same deadline
                    AckWait::TimedOut => break AckOutcome::TimedOut,
                    AckWait::Closed => break AckOutcome::Closed,
                }
            };

            match outcome {
                AckOutcome::Matched => {
                    tx_seq_flag = !tx_seq_flag;
                    break;
                }
                AckOutcome::TimedOut => {
                    retries += 1;
                    if retries >= MAX_RETRIES {
                        warn!("publish retry budget exhausted");
                        frame_tx.send(Frame::control(Command::Disconnect)).await;
                        session.drop_link();
                        return;
                    }
                    debug!(retries, "publish ack timed out, retransmitting");
                }
                AckOutcome::Closed => return,
            }
        }
    }
}

enum AckOutcome {
    Matched,
    TimedOut,
    Closed,
}
