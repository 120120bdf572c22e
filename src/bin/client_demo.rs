// ABOUTME: Client demo binary: opens a serial port, connects through the gateway to host:port, and pipes stdin/stdout through the tunnel.
// ABOUTME: One task forwards stdin into `write`; the main loop polls the local receive buffer and forwards it to stdout.

use argh::FromArgs;
use serialink::ClientHandle;
use serialink::transport::SerialTransport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Pipes stdin/stdout through a serial-bridge tunnel to a TCP destination behind the gateway.
#[derive(FromArgs)]
struct CliArgs {
    /// path to the serial device, e.g. /dev/ttyUSB0 or COM3
    #[argh(option, short = 'p')]
    port: String,

    /// baud rate (default: 115200)
    #[argh(option, short = 'b')]
    baud: Option<u32>,

    /// destination to reach behind the gateway, as host:port
    #[argh(positional)]
    address: String,

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
    run(cli_args.port, baud, cli_args.address).await;
}

#[cfg(feature = "real-serial")]
async fn run(port: String, baud: u32, address: String) {
    use serialink::transport::real;

    let transport = match real::open(&port, baud) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("failed to open {port}: {err}");
            std::process::exit(1);
        }
    };
    bridge(transport, address).await;
}

#[cfg(not(feature = "real-serial"))]
async fn run(_port: String, _baud: u32, _address: String) {
    eprintln!("rebuild with `--features real-serial` to open a hardware serial port");
    std::process::exit(1);
}

async fn bridge<T: SerialTransport>(transport: T, address: String) {
    let client = ClientHandle::bind(transport);
    if let Err(err) = client.connect(&address).await {
        eprintln!("connect to {address} failed: {err}");
        std::process::exit(1);
    }
    tracing::info!(%address, "connected");

    let stdin_client = client.clone();
    let stdin_task = tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 512];
        loop {
            let n = match stdin.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            if stdin_client.write(&buf[..n]).await.is_err() {
                break;
            }
        }
    });

    let mut stdout = tokio::io::stdout();
    let mut buf = [0u8; 512];
    while client.connected() {
        let n = client.read(&mut buf);
        if n > 0 {
            if stdout.write_all(&buf[..n]).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        } else {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    stdin_task.abort();
    client.close().await;
}
