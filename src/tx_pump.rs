// ABOUTME: Drains the outbound frame queue, serialising and writing each frame to the transport.
// ABOUTME: The write half is shared behind a mutex since a fresh pump is spawned per connect cycle.

use crate::codec::Frame;
use crate::error::SessionError;
use crate::queue::{QueueRx, Recv};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Serialise and write frames from `frame_rx` until the queue closes (link
/// drop) or a write fails (transport drop).
///
/// `writer` is shared rather than owned outright: each connect cycle spawns
/// its own pump bound to a fresh, cancellable frame queue, but all cycles
/// within one session write through the same underlying transport half.
pub async fn run<W>(writer: Arc<Mutex<W>>, mut frame_rx: QueueRx<Frame>, transport_token: CancellationToken) -> Option<SessionError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    loop {
        let frame = match frame_rx.recv().await {
            Recv::Item(frame) => frame,
            Recv::Closed | Recv::TimedOut => return None,
        };

        let wire = frame.serialize();
        let mut writer = writer.lock().await;
        if let Err(err) = writer.write_all(&wire).await {
            transport_token.cancel();
            return Some(SessionError::TransportFailure(err));
        }
        if let Err(err) = writer.flush().await {
            transport_token.cancel();
            return Some(SessionError::TransportFailure(err));
        }
    }
}
