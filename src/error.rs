// ABOUTME: Crate-wide error types for the bridge protocol's codec, session, and connect paths.
// ABOUTME: Hot paths use concrete thiserror enums; only CLI/binary glue reaches for the boxed alias.

use std::io;
use thiserror::Error;

/// Error returned by call sites where causes are genuinely heterogeneous
/// (CLI parsing, supervisor restarts, example binaries).
///
/// When writing library code against this crate, prefer matching on
/// [`CodecError`], [`SessionError`], or [`ConnectError`] directly.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for the boxed [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures validating a frame assembled from the byte queue.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame length {0} is below the minimum of 5 bytes")]
    LengthTooSmall(u8),

    #[error("frame CRC mismatch: computed {computed:#010x}, received {received:#010x}")]
    CrcMismatch { computed: u32, received: u32 },

    #[error("unknown command code {0:#04x}")]
    UnknownCommand(u8),

    #[error("malformed CONNECT payload: {0}")]
    BadConnectPayload(&'static str),
}

/// Failures that end a session's link. A link error never implies the
/// serial transport itself is dead; see [`SessionError::TransportFailure`]
/// for the one variant that does.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("serial transport failed: {0}")]
    TransportFailure(#[source] io::Error),

    #[error("peer silent: parser timeout cap reached")]
    ParserTimeoutCap,

    #[error("publish retry budget exhausted")]
    RetryExhausted,

    #[error("upstream dial to {0} failed: {1}")]
    DialFailed(String, #[source] io::Error),

    #[error("upstream dial to {0} timed out")]
    DialTimeout(String),

    #[error("upstream TCP I/O failed: {0}")]
    UpstreamIo(#[source] io::Error),

    #[error("application payload source closed")]
    SourceClosed,

    #[error("peer requested disconnect")]
    PeerDisconnected,
}

impl SessionError {
    /// Whether this error means the whole transport (not just the link) is gone.
    pub fn is_transport_fatal(&self) -> bool {
        matches!(self, SessionError::TransportFailure(_))
    }
}

/// Outcome of a client [`connect`](crate::client::ClientHandle::connect) call.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("CONNECT target invalid: {0}")]
    InvalidTarget(&'static str),

    #[error("timed out waiting for CONNACK")]
    Timeout,

    #[error("link closed before CONNACK arrived")]
    Closed,

    #[error("a connect attempt is already in progress")]
    AlreadyConnecting,

    #[error("client session is not bound to a transport")]
    NotReady,
}
