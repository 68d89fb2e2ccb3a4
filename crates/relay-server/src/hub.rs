//! Connection hub: the live-session registry and its serialized dispatch loop.
//!
//! The registry is owned by exactly one task. All membership changes and
//! all fan-out go through three intake channels (register, unregister,
//! broadcast), so no lock ever guards the live set and evictions are
//! naturally sequenced with broadcasts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use relay_core::envelope::Envelope;
use relay_core::error::SendError;
use relay_core::ids::ClientId;

/// A registered session as the hub sees it: an identity plus the outbound
/// channel drained by that session's writer task.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: ClientId,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl SessionHandle {
    /// Create a handle and the receiver its writer task will drain.
    pub fn new(id: ClientId) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { id, outbound }, rx)
    }

    fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        self.outbound.send(envelope).map_err(|_| SendError::Closed)
    }
}

/// Cheap clonable handle for talking to the hub.
///
/// All three intakes are unbounded, so registering from the accept path
/// never blocks behind the dispatch loop.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::UnboundedSender<SessionHandle>,
    unregister_tx: mpsc::UnboundedSender<ClientId>,
    broadcast_tx: mpsc::UnboundedSender<Envelope>,
    live: Arc<AtomicUsize>,
}

impl HubHandle {
    /// Announce a session as ready to receive broadcasts.
    pub fn register(&self, session: SessionHandle) {
        let _ = self.register_tx.send(session);
    }

    /// Remove a session and release its connection. Idempotent: an id
    /// that is not (or no longer) registered is a no-op.
    pub fn unregister(&self, id: ClientId) {
        let _ = self.unregister_tx.send(id);
    }

    /// Enqueue an envelope for delivery to every registered session.
    pub fn broadcast(&self, envelope: Envelope) {
        let _ = self.broadcast_tx.send(envelope);
    }

    /// Number of currently registered sessions.
    pub fn client_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

/// Owns the live set. [`Hub::run`] is the only code that touches it.
pub struct Hub {
    sessions: HashMap<ClientId, SessionHandle>,
    register_rx: mpsc::UnboundedReceiver<SessionHandle>,
    unregister_rx: mpsc::UnboundedReceiver<ClientId>,
    broadcast_rx: mpsc::UnboundedReceiver<Envelope>,
    live: Arc<AtomicUsize>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicUsize::new(0));

        let hub = Self {
            sessions: HashMap::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            live: Arc::clone(&live),
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            broadcast_tx,
            live,
        };
        (hub, handle)
    }

    /// Dispatch loop: handles one intake event per iteration, first ready
    /// wins. Exits once every [`HubHandle`] clone has been dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(session) = self.register_rx.recv() => self.add(session),
                Some(id) = self.unregister_rx.recv() => self.remove(&id),
                Some(envelope) = self.broadcast_rx.recv() => self.fan_out(&envelope),
                else => break,
            }
        }
        tracing::debug!("hub dispatch loop stopped");
    }

    fn add(&mut self, session: SessionHandle) {
        tracing::info!(client_id = %session.id, "session registered");
        self.sessions.insert(session.id.clone(), session);
        self.live.store(self.sessions.len(), Ordering::Relaxed);
    }

    fn remove(&mut self, id: &ClientId) {
        if self.sessions.remove(id).is_some() {
            tracing::info!(client_id = %id, "session unregistered");
            self.live.store(self.sessions.len(), Ordering::Relaxed);
        }
    }

    /// Deliver one copy of the envelope to every registered session.
    ///
    /// A failing send evicts only that session; delivery continues to the
    /// rest, so one dead peer never breaks the broadcast for the others.
    fn fan_out(&mut self, envelope: &Envelope) {
        let mut dead = Vec::new();
        for (id, session) in &self.sessions {
            if session.send(envelope.clone()).is_err() {
                dead.push(id.clone());
            }
        }
        for id in dead {
            tracing::warn!(client_id = %id, "send failed, evicting session");
            self.sessions.remove(&id);
        }
        self.live.store(self.sessions.len(), Ordering::Relaxed);
    }
}
