// ABOUTME: Reliable, sequence-tracked datagram protocol tunnelling a byte stream over a serial link.
// ABOUTME: `client` binds the microcontroller-facing role, `gateway` binds the TCP-bridging role.

pub mod ack;
pub mod client;
pub mod codec;
pub mod connect_payload;
pub mod error;
pub mod gateway;
pub mod parser;
pub mod payload_source;
pub mod queue;
pub mod rx_pump;
pub mod sender;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod transport;
pub mod tx_pump;

pub use client::ClientHandle;
pub use codec::{Command, Frame};
pub use connect_payload::ConnectTarget;
pub use error::{CodecError, ConnectError, Error, Result, SessionError};
pub use state::State;
