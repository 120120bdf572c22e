// ABOUTME: Concrete PayloadSource implementations for the client (app queue) and gateway (upstream TCP).

use crate::sender::PayloadSource;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;

/// Feeds the payload sender from a client's bounded application write queue.
pub struct QueuePayloadSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl QueuePayloadSource {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }
}

impl PayloadSource for QueuePayloadSource {
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

/// The largest payload a gateway reads per PUBLISH: 250 + 5 header/CRC bytes
/// keeps the total frame length within a single `u8`.
pub const GATEWAY_READ_CHUNK: usize = 250;

/// Feeds the payload sender from the gateway's upstream TCP connection.
pub struct TcpPayloadSource {
    upstream: OwnedReadHalf,
}

impl TcpPayloadSource {
    pub fn new(upstream: OwnedReadHalf) -> Self {
        Self { upstream }
    }
}

impl PayloadSource for TcpPayloadSource {
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        let mut buf = [0u8; GATEWAY_READ_CHUNK];
        match self.upstream.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => Some(buf[..n].to_vec()),
            Err(_) => None,
        }
    }
}
