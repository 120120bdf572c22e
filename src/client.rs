// ABOUTME: Client role: a stream-like API backed by the five-task session engine over a serial link.
// ABOUTME: `bind` wires up the long-lived tasks; `connect` drives one CONNECT/CONNACK handshake at a time.

use crate::ack::ack_channel;
use crate::codec::{Command, Frame};
use crate::connect_payload::ConnectTarget;
use crate::error::ConnectError;
use crate::payload_source::QueuePayloadSource;
use crate::queue::{self, FRAME_QUEUE_CAPACITY};
use crate::session::{Link, SessionCore};
use crate::state::State;
use crate::transport::SerialTransport;
use crate::{parser, rx_pump, sender, tx_pump};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const APP_QUEUE_CAPACITY: usize = crate::queue::APP_QUEUE_CAPACITY;

/// Returned by [`ClientHandle::write`] when the client has no active link.
#[derive(Debug, thiserror::Error)]
#[error("client is not connected")]
pub struct NotConnected;

struct ConnectCmd {
    target: ConnectTarget,
    reply: oneshot::Sender<Result<(), ConnectError>>,
}

/// A handle to a running client session. Cheaply cloneable; all clones share
/// the same underlying tasks and state.
#[derive(Clone)]
pub struct ClientHandle {
    session: SessionCore,
    rx_buffer: Arc<StdMutex<VecDeque<u8>>>,
    connect_tx: mpsc::Sender<ConnectCmd>,
    write_tx_slot: Arc<StdMutex<Option<mpsc::Sender<Vec<u8>>>>>,
}

impl ClientHandle {
    /// Bind a client session to `transport`, spawning the RX pump, frame
    /// parser, and frame handler for its entire lifetime. Returns
    /// immediately; call [`connect`](Self::connect) to perform a handshake.
    pub fn bind<T: SerialTransport>(transport: T) -> Self {
        let transport_token = CancellationToken::new();
        let session = SessionCore::new(transport_token.clone());
        let (reader, writer) = tokio::io::split(transport);
        let writer = Arc::new(AsyncMutex::new(writer));

        let (byte_tx, byte_rx) = queue::channel(queue::BYTE_QUEUE_CAPACITY, transport_token.clone());
        let (parser_frame_tx, parser_frame_rx) = mpsc::channel(16);
        let (connect_tx, connect_rx) = mpsc::channel(4);
        let rx_buffer = Arc::new(StdMutex::new(VecDeque::new()));
        let write_tx_slot = Arc::new(StdMutex::new(None));

        session.spawn_tracked(async move {
            rx_pump::run(reader, byte_tx, transport_token.clone()).await;
        });
        session.spawn_tracked(parser::run(byte_rx, parser_frame_tx, session.clone()));
        session.spawn_tracked(run_frame_handler(
            session.clone(),
            writer,
            parser_frame_rx,
            connect_rx,
            rx_buffer.clone(),
            write_tx_slot.clone(),
        ));

        Self { session, rx_buffer, connect_tx, write_tx_slot }
    }

    /// Perform a CONNECT/CONNACK handshake to `host:port`. May be called
    /// again after a disconnect to reconnect on the same transport.
    #[instrument(skip(self))]
    pub async fn connect(&self, address: &str) -> Result<(), ConnectError> {
        let target = ConnectTarget::parse(address).map_err(ConnectError::InvalidTarget)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.connect_tx
            .send(ConnectCmd { target, reply: reply_tx })
            .await
            .map_err(|_| ConnectError::NotReady)?;
        reply_rx.await.map_err(|_| ConnectError::Closed)?
    }

    /// Enqueue `bytes` for delivery, blocking while the application payload
    /// queue is full. Splits `bytes` into `MAX_PAYLOAD_LEN`-sized chunks so
    /// no single PUBLISH frame overflows the wire length byte. Fails if
    /// there is no active link, or the link drops while blocked.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), NotConnected> {
        let write_tx = self.write_tx_slot.lock().unwrap().clone().ok_or(NotConnected)?;
        for chunk in bytes.chunks(crate::codec::MAX_PAYLOAD_LEN) {
            write_tx.send(chunk.to_vec()).await.map_err(|_| NotConnected)?;
        }
        Ok(())
    }

    /// Drain up to `buf.len()` bytes from the local receive buffer, returning
    /// the number of bytes copied (0 if none are currently available).
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut rx = self.rx_buffer.lock().unwrap();
        let n = rx.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = rx.pop_front().unwrap();
        }
        n
    }

    /// Bytes currently sitting in the local receive buffer.
    pub fn available(&self) -> usize {
        self.rx_buffer.lock().unwrap().len()
    }

    pub fn connected(&self) -> bool {
        self.session.state.get() == State::Connected
    }

    /// Tear down the current link, sending DISCONNECT if one is active.
    pub async fn close(&self) {
        if let Some(frame_tx) = self.session.current_frame_tx() {
            frame_tx.send(Frame::control(Command::Disconnect)).await;
        }
        self.session.drop_link();
        self.write_tx_slot.lock().unwrap().take();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_frame_handler<W>(
    session: SessionCore,
    writer: Arc<AsyncMutex<W>>,
    mut parser_rx: mpsc::Receiver<Frame>,
    mut connect_rx: mpsc::Receiver<ConnectCmd>,
    rx_buffer: Arc<StdMutex<VecDeque<u8>>>,
    write_tx_slot: Arc<StdMutex<Option<mpsc::Sender<Vec<u8>>>>>,
) where
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let mut expected_rx_seq_flag = false;
    let mut pending_connect: Option<oneshot::Sender<Result<(), ConnectError>>> = None;
    let mut pending_ack_rx: Option<crate::ack::AckRx> = None;
    let mut connect_deadline: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = wait_deadline(connect_deadline) => {
                if let Some(reply) = pending_connect.take() {
                    let _ = reply.send(Err(ConnectError::Timeout));
                }
                session.drop_link();
                write_tx_slot.lock().unwrap().take();
                connect_deadline = None;
            }

            maybe_frame = parser_rx.recv() => {
                let Some(frame) = maybe_frame else { return };
                let state = session.state.get();
                match (state, frame.command) {
                    (State::Disconnected, Command::Connack) => {
                        if let Some(reply) = pending_connect.take() {
                            connect_deadline = None;
                            expected_rx_seq_flag = false;
                            session.state.set(State::Connected);

                            let (write_tx, write_rx) = mpsc::channel(APP_QUEUE_CAPACITY);
                            *write_tx_slot.lock().unwrap() = Some(write_tx);

                            if let Some(ack_rx) = pending_ack_rx.take() {
                                let source = QueuePayloadSource::new(write_rx);
                                session.spawn_tracked(sender::run(source, ack_rx, session.clone()));
                            }

                            info!("client connected");
                            let _ = reply.send(Ok(()));
                        }
                    }
                    (State::Connected, Command::Publish) => {
                        if let Some(frame_tx) = session.current_frame_tx() {
                            frame_tx.send(Frame::acknowledge(frame.seq_flag)).await;
                        }
                        if frame.seq_flag == expected_rx_seq_flag {
                            expected_rx_seq_flag = !expected_rx_seq_flag;
                            rx_buffer.lock().unwrap().extend(frame.payload);
                        }
                    }
                    (State::Connected, Command::Acknowledge) => {
                        if let Some(ack_tx) = session.current_ack_tx() {
                            ack_tx.deliver(frame.seq_flag);
                        }
                    }
                    (State::Connected, Command::Disconnect) => {
                        info!("peer disconnected");
                        session.drop_link();
                        write_tx_slot.lock().unwrap().take();
                    }
                    _ => {} // protocol-rule violation: ignore
                }
            }

            maybe_cmd = connect_rx.recv() => {
                let Some(cmd) = maybe_cmd else { return };
                if session.state.get() != State::Disconnected || pending_connect.is_some() {
                    let _ = cmd.reply.send(Err(ConnectError::AlreadyConnecting));
                    continue;
                }

                let link_token = session.new_link_token();
                let (frame_tx, frame_rx) = queue::channel(FRAME_QUEUE_CAPACITY, link_token.clone());
                let (ack_tx, ack_rx) = ack_channel();
                pending_ack_rx = Some(ack_rx);
                session.install_link(Link { frame_tx: frame_tx.clone(), ack_tx, link_token: link_token.clone() });
                let tx_writer = writer.clone();
                let tx_transport_token = session.transport_token.clone();
                session.spawn_tracked(async move {
                    tx_pump::run(tx_writer, frame_rx, tx_transport_token).await;
                });

                let connect_frame = Frame::new(Command::Connect, cmd.target.is_hostname(), cmd.target.encode());
                frame_tx.send(connect_frame).await;

                pending_connect = Some(cmd.reply);
                connect_deadline = Some(tokio::time::Instant::now() + CONNECT_TIMEOUT);
            }
        }
    }
}

async fn wait_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
