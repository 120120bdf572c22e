// ABOUTME: Gateway binary: opens a serial port and bridges CONNECT/PUBLISH traffic to real TCP destinations.
// ABOUTME: Restarts via `supervisor::run_supervised` whenever the serial transport is lost.

use argh::FromArgs;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Serial-to-TCP bridge gateway: terminates the serial framing and dials upstream
/// TCP destinations on behalf of a client's CONNECT requests.
#[derive(FromArgs)]
struct CliArgs {
    /// path to the serial device, e.g. /dev/ttyUSB0 or COM3
    #[argh(option, short = 'p')]
    port: String,

    /// baud rate (default: 115200)
    #[argh(option, short = 'b')]
    baud: Option<u32>,

    /// whether or not to enable debug logging
    #[argh(switch, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debug { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let baud = cli_args.baud.unwrap_or(115_200);
    run(cli_args.port, baud).await;
}

#[cfg(feature = "real-serial")]
async fn run(port: String, baud: u32) {
    use serialink::error::SessionError;
    use serialink::{gateway, supervisor, transport::real};

    supervisor::run_supervised(|| {
        let port = port.clone();
        async move {
            let transport = real::open(&port, baud).map_err(SessionError::TransportFailure)?;
            gateway::listen(transport).await
        }
    })
    .await;
}

#[cfg(not(feature = "real-serial"))]
async fn run(_port: String, _baud: u32) {
    eprintln!("rebuild with `--features real-serial` to open a hardware serial port");
    std::process::exit(1);
}
