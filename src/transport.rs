// ABOUTME: The serial transport contract this protocol rides: an opaque full-duplex byte stream.
// ABOUTME: Any AsyncRead + AsyncWrite implementor qualifies; real hardware lives behind the real-serial feature.

use tokio::io::{AsyncRead, AsyncWrite};

/// Anything that looks like a duplex serial port to this protocol.
///
/// The actual contract (open once, read bytes, write bytes, close) is already
/// exactly what `AsyncRead`/`AsyncWrite` express, so this is a marker trait
/// rather than a bespoke one — generic code bounds on it directly.
pub trait SerialTransport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> SerialTransport for T {}

#[cfg(feature = "real-serial")]
pub mod real {
    //! Opens an actual hardware serial port via `tokio-serial`.

    use std::time::Duration;
    use tokio_serial::{SerialPortBuilderExt, SerialStream};

    /// Open `path` at `baud_rate`, 8N1, with no hardware flow control — the
    /// framing this protocol's CRC and retry layer assumes it is riding on.
    pub fn open(path: &str, baud_rate: u32) -> std::io::Result<SerialStream> {
        tokio_serial::new(path, baud_rate)
            .timeout(Duration::from_millis(100))
            .open_native_async()
    }
}

pub mod fake {
    //! An in-memory duplex pipe standing in for a serial cable in tests.
    //!
    //! Kept as a regular (non-`cfg(test)`) module so both this crate's unit
    //! tests and the `tests/` integration suite can reach it.

    use tokio::io::DuplexStream;

    /// A connected pair of transports, as if a cable joined two ports.
    pub fn wire_pair(buffer: usize) -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(buffer)
    }
}
