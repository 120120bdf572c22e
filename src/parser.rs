// ABOUTME: Assembles frames from the byte queue under inter-byte timeouts and forwards them to the handler.
// ABOUTME: A running timeout/CRC-failure counter, capped at 5, distinguishes a quiet line from a dead peer.

use crate::codec::{Command, Frame, MIN_FRAME_LEN};
use crate::queue::{QueueRx, Recv};
use crate::session::SessionCore;
use crate::state::State;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const BYTE_TIMEOUT: Duration = Duration::from_millis(100);
const TIMEOUT_CAP: u32 = 5;

/// Drain `byte_rx`, assembling frames and forwarding each valid one on
/// `frame_out`. Returns when the byte queue closes or the timeout cap is
/// reached while the session is Connected (at which point a DISCONNECT has
/// already been enqueued on the current link, if any).
pub async fn run(mut byte_rx: QueueRx<u8>, frame_out: mpsc::Sender<Frame>, session: SessionCore) {
    let mut timeouts: u32 = 0;

    'frame: loop {
        if timeouts >= TIMEOUT_CAP {
            if session.state.get() == State::Connected {
                warn!("RX frame timeout cap reached while connected");
                if let Some(frame_tx) = session.current_frame_tx() {
                    frame_tx.send(Frame::control(Command::Disconnect)).await;
                }
                session.drop_link();
                return;
            }
            timeouts = 0;
        }

        let length = match byte_rx.recv().await {
            Recv::Item(b) => b,
            Recv::Closed | Recv::TimedOut => return,
        };

        let command_byte = match byte_rx.recv_timeout(BYTE_TIMEOUT).await {
            Recv::Item(b) => b,
            Recv::Closed => return,
            Recv::TimedOut => {
                timeouts += 1;
                continue 'frame;
            }
        };

        if length < MIN_FRAME_LEN {
            timeouts += 1;
            continue 'frame;
        }

        let payload_len = (length - MIN_FRAME_LEN) as usize;
        let mut payload = Vec::with_capacity(payload_len);
        for _ in 0..payload_len {
            match byte_rx.recv_timeout(BYTE_TIMEOUT).await {
                Recv::Item(b) => payload.push(b),
                Recv::Closed => return,
                Recv::TimedOut => {
                    timeouts += 1;
                    continue 'frame;
                }
            }
        }

        let mut crc_bytes = [0u8; 4];
        for slot in crc_bytes.iter_mut() {
            match byte_rx.recv_timeout(BYTE_TIMEOUT).await {
                Recv::Item(b) => *slot = b,
                Recv::Closed => return,
                Recv::TimedOut => {
                    timeouts += 1;
                    continue 'frame;
                }
            }
        }
        let crc = u32::from_le_bytes(crc_bytes);

        match Frame::from_wire(length, command_byte, payload, crc) {
            Ok(frame) => {
                timeouts = 0;
                debug!(command = ?frame.command, seq_flag = frame.seq_flag, "frame parsed");
                if frame_out.send(frame).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(error = %err, "frame rejected");
                timeouts += 1;
            }
        }
    }
}
