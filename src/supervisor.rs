// ABOUTME: Minimal supervised-restart loop: call an async entry point, and on transport loss, retry.
// ABOUTME: Scaffolding for the binaries — not part of the protocol core in src/{client,gateway}.rs.

use crate::error::SessionError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

const MIN_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Calls `entry` in a loop forever. Each return — `Ok` (transport closed
/// cleanly) or `Err` (transport failed) — is logged, then followed by a
/// jittered 2-5s sleep before calling `entry` again, matching the contract
/// the real serial-port opener expects of its supervisor.
pub async fn run_supervised<F, Fut>(mut entry: F) -> !
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), SessionError>>,
{
    loop {
        match entry().await {
            Ok(()) => warn!("session ended, transport closed; reopening"),
            Err(err) => error!(error = %err, "transport lost; reopening"),
        }
        let backoff = jittered_backoff();
        tokio::time::sleep(backoff).await;
    }
}

fn jittered_backoff() -> Duration {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let span_ms = (MAX_BACKOFF.as_millis() - MIN_BACKOFF.as_millis()) as u64;
    MIN_BACKOFF + Duration::from_millis(nanos as u64 % span_ms.max(1))
}
