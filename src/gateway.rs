// ABOUTME: Gateway role: on CONNECT, dials the requested upstream TCP destination and bridges it.
// ABOUTME: `listen` owns the whole session for one transport lifetime and blocks until it dies.

use crate::ack::ack_channel;
use crate::codec::{Command, Frame};
use crate::connect_payload::ConnectTarget;
use crate::error::SessionError;
use crate::payload_source::TcpPayloadSource;
use crate::queue::{self, FRAME_QUEUE_CAPACITY};
use crate::session::{Link, SessionCore};
use crate::state::State;
use crate::transport::SerialTransport;
use crate::{parser, rx_pump, sender, tx_pump};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one gateway session over `transport` until the link and transport
/// both die, then returns. An `Err` means the transport itself failed (read
/// or write); a supervisor should reopen the port and call `listen` again.
/// An `Ok` means the transport closed cleanly (EOF), which a supervisor
/// should treat the same way.
#[instrument(skip(transport))]
pub async fn listen<T: SerialTransport>(transport: T) -> Result<(), SessionError> {
    let transport_token = CancellationToken::new();
    let session = SessionCore::new(transport_token.clone());
    let (reader, writer) = tokio::io::split(transport);
    let writer = Arc::new(AsyncMutex::new(writer));

    let (byte_tx, byte_rx) = queue::channel(queue::BYTE_QUEUE_CAPACITY, transport_token.clone());
    let (parser_frame_tx, parser_frame_rx) = mpsc::channel(16);

    let transport_error: Arc<StdMutex<Option<SessionError>>> = Arc::new(StdMutex::new(None));

    let rx_token = transport_token.clone();
    let rx_error_slot = transport_error.clone();
    session.spawn_tracked(async move {
        if let Some(err) = rx_pump::run(reader, byte_tx, rx_token).await {
            *rx_error_slot.lock().unwrap() = Some(err);
        }
    });

    session.spawn_tracked(parser::run(byte_rx, parser_frame_tx, session.clone()));

    run_frame_handler(session.clone(), writer, parser_frame_rx, transport_error.clone()).await;
    session.join_all().await;

    match transport_error.lock().unwrap().take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn run_frame_handler<W>(
    session: SessionCore,
    writer: Arc<AsyncMutex<W>>,
    mut parser_rx: mpsc::Receiver<Frame>,
    transport_error: Arc<StdMutex<Option<SessionError>>>,
) where
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let mut expected_rx_seq_flag = false;
    let mut upstream_write: Option<OwnedWriteHalf> = None;

    while let Some(frame) = parser_rx.recv().await {
        let state = session.state.get();
        match (state, frame.command) {
            (State::Disconnected, Command::Connect) => {
                let target = match ConnectTarget::decode(&frame.payload, frame.seq_flag) {
                    Ok(target) => target,
                    Err(err) => {
                        warn!(error = %err, "malformed CONNECT payload, ignoring");
                        continue;
                    }
                };

                let link_token = session.new_link_token();
                let (frame_tx, frame_rx) = queue::channel(FRAME_QUEUE_CAPACITY, link_token.clone());
                let (ack_tx, ack_rx) = ack_channel();
                session.install_link(Link { frame_tx: frame_tx.clone(), ack_tx, link_token });
                let tx_writer = writer.clone();
                let tx_transport_token = session.transport_token.clone();
                let tx_error_slot = transport_error.clone();
                session.spawn_tracked(async move {
                    if let Some(err) = tx_pump::run(tx_writer, frame_rx, tx_transport_token).await {
                        *tx_error_slot.lock().unwrap() = Some(err);
                    }
                });

                let dial_string = target.dial_string();
                info!(%dial_string, "gateway dialing upstream");
                let dial = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&dial_string)).await;
                let stream = match dial {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(err)) => {
                        warn!(%dial_string, error = %err, "upstream dial failed");
                        frame_tx.send(Frame::control(Command::Disconnect)).await;
                        session.drop_link();
                        continue;
                    }
                    Err(_) => {
                        warn!(%dial_string, "upstream dial timed out");
                        frame_tx.send(Frame::control(Command::Disconnect)).await;
                        session.drop_link();
                        continue;
                    }
                };

                let (read_half, write_half) = stream.into_split();
                upstream_write = Some(write_half);
                expected_rx_seq_flag = false;
                session.state.set(State::Connected);

                let source = TcpPayloadSource::new(read_half);
                session.spawn_tracked(sender::run(source, ack_rx, session.clone()));

                frame_tx.send(Frame::control(Command::Connack)).await;
                info!(%dial_string, "gateway connected");
            }
            (State::Connected, Command::Publish) => {
                if let Some(frame_tx) = session.current_frame_tx() {
                    frame_tx.send(Frame::acknowledge(frame.seq_flag)).await;
                }
                if frame.seq_flag == expected_rx_seq_flag {
                    if let Some(upstream) = upstream_write.as_mut() {
                        match upstream.write_all(&frame.payload).await {
                            Ok(()) => expected_rx_seq_flag = !expected_rx_seq_flag,
                            Err(err) => {
                                warn!(error = %err, "upstream write failed, disconnecting client");
                                if let Some(frame_tx) = session.current_frame_tx() {
                                    frame_tx.send(Frame::control(Command::Disconnect)).await;
                                }
                                session.drop_link();
                                close_upstream(&mut upstream_write).await;
                            }
                        }
                    }
                }
            }
            (State::Connected, Command::Acknowledge) => {
                if let Some(ack_tx) = session.current_ack_tx() {
                    ack_tx.deliver(frame.seq_flag);
                }
            }
            (State::Connected, Command::Disconnect) => {
                info!("client requested disconnect");
                session.drop_link();
                close_upstream(&mut upstream_write).await;
            }
            _ => {} // protocol-rule violation: ignore
        }
    }

    if transport_error.lock().unwrap().is_none() {
        info!("gateway session ended");
    }
}

/// Shuts down the upstream write half so its paired read half (owned by the
/// payload sender task) observes EOF and exits, then drops it.
async fn close_upstream(upstream_write: &mut Option<OwnedWriteHalf>) {
    if let Some(mut upstream) = upstream_write.take() {
        let _ = upstream.shutdown().await;
    }
}
