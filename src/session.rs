// ABOUTME: Shared per-session teardown machinery: the current link's resources and the task join set.
// ABOUTME: drop_link/drop_transport are idempotent so any task that hits a fatal error can call them directly.

use crate::ack::AckTx;
use crate::codec::Frame;
use crate::queue::QueueTx;
use crate::state::{SessionState, State};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Resources that exist only while a CONNECT/CONNACK link is up, recreated
/// fresh on every connect cycle.
pub struct Link {
    pub frame_tx: QueueTx<Frame>,
    pub ack_tx: AckTx,
    pub link_token: CancellationToken,
}

/// Shared session-lifetime state: the transport-level cancellation token,
/// the current link (if any), and the session's atomic state.
#[derive(Clone)]
pub struct SessionCore {
    pub state: Arc<SessionState>,
    pub transport_token: CancellationToken,
    link: Arc<StdMutex<Option<Link>>>,
    tasks: Arc<StdMutex<JoinSet<()>>>,
}

impl SessionCore {
    pub fn new(transport_token: CancellationToken) -> Self {
        Self {
            state: Arc::new(SessionState::new(State::Disconnected)),
            transport_token,
            link: Arc::new(StdMutex::new(None)),
            tasks: Arc::new(StdMutex::new(JoinSet::new())),
        }
    }

    /// Spawns `fut` as one of this session's five cooperating tasks, tracked
    /// so [`join_all`](Self::join_all) can act as the session-lifetime
    /// barrier described in the design: wait for every task to exit before
    /// considering the session dead.
    pub fn spawn_tracked<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.lock().unwrap().spawn(fut);
    }

    /// Waits for every task spawned via [`spawn_tracked`](Self::spawn_tracked)
    /// to finish. Tasks exit on their own once the relevant token is
    /// cancelled or queue closed; this only waits, it does not cancel.
    pub async fn join_all(&self) {
        let mut tasks = std::mem::replace(&mut *self.tasks.lock().unwrap(), JoinSet::new());
        while tasks.join_next().await.is_some() {}
    }

    /// A fresh child token for a new link, cancelled automatically when the
    /// transport token is.
    pub fn new_link_token(&self) -> CancellationToken {
        self.transport_token.child_token()
    }

    pub fn install_link(&self, link: Link) {
        *self.link.lock().unwrap() = Some(link);
    }

    pub fn current_frame_tx(&self) -> Option<QueueTx<Frame>> {
        self.link.lock().unwrap().as_ref().map(|l| l.frame_tx.clone())
    }

    pub fn current_ack_tx(&self) -> Option<AckTx> {
        self.link.lock().unwrap().as_ref().map(|l| l.ack_tx.clone())
    }

    /// Tears down the current link: cancels its token (closing the frame
    /// queue and stopping the TX pump/payload sender) and marks the session
    /// Disconnected. Safe to call from multiple tasks concurrently or
    /// repeatedly; the second call is a no-op.
    pub fn drop_link(&self) {
        let link = self.link.lock().unwrap().take();
        if let Some(link) = link {
            link.link_token.cancel();
            info!("link torn down");
        }
        self.state.set(State::Disconnected);
    }

    /// Tears down the link, then the transport itself: cancels the
    /// transport token (stopping the RX pump, frame parser, and closing the
    /// byte queue) and marks the session TransportNotReady.
    pub fn drop_transport(&self) {
        self.drop_link();
        self.transport_token.cancel();
        self.state.set(State::TransportNotReady);
        info!("transport torn down");
    }
}
