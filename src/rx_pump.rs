// ABOUTME: Reads raw bytes off the transport and feeds them into the byte queue for the parser.
// ABOUTME: The only task that ever touches the read half of the transport directly.

use crate::error::SessionError;
use crate::queue::QueueTx;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pump bytes from `reader` into `byte_tx` until the transport closes, fails,
/// or `transport_token` is cancelled by someone else.
///
/// A read error is always transport-fatal: it cancels `transport_token` so
/// every other task in the session tears down with it. Returns the error
/// that ended the pump, if any, for the caller to log or report.
pub async fn run<R>(mut reader: R, byte_tx: QueueTx<u8>, transport_token: CancellationToken) -> Option<SessionError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];
    loop {
        let read = tokio::select! {
            biased;
            _ = transport_token.cancelled() => return None,
            result = reader.read(&mut buf) => result,
        };

        match read {
            Ok(0) => {
                debug!("serial transport reached EOF");
                transport_token.cancel();
                return None;
            }
            Ok(n) => {
                for &byte in &buf[..n] {
                    byte_tx.send(byte).await;
                }
            }
            Err(err) => {
                transport_token.cancel();
                return Some(SessionError::TransportFailure(err));
            }
        }
    }
}
