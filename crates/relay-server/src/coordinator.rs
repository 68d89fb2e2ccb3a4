//! Single-threaded owner of relay state.
//!
//! Events flow in over one channel and are applied strictly one at a
//! time, so the state record needs no lock: this loop is its only reader
//! and only writer.

use tokio::sync::mpsc;

use relay_core::command::Command;
use relay_core::envelope::Envelope;

use crate::hub::HubHandle;

/// The mutable record owned exclusively by the coordinator loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayState {
    pub active: bool,
}

/// Consumes events, mutates state, and emits broadcast envelopes.
pub struct Coordinator {
    state: RelayState,
    events: mpsc::UnboundedReceiver<String>,
    hub: HubHandle,
}

impl Coordinator {
    pub fn new(events: mpsc::UnboundedReceiver<String>, hub: HubHandle) -> Self {
        Self {
            state: RelayState::default(),
            events,
            hub,
        }
    }

    /// Run until every event sender is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            tracing::debug!(event = %event, "processing event");
            for envelope in self.apply(Command::from(event.as_str())) {
                self.hub.broadcast(envelope);
            }
        }
        tracing::debug!("coordinator loop stopped");
    }

    /// Apply one command and return the envelopes describing the change.
    ///
    /// Unrecognized commands are deliberately not errors: state is left
    /// untouched and nothing is emitted.
    fn apply(&mut self, command: Command) -> Vec<Envelope> {
        match command {
            Command::Start => {
                self.state.active = true;
                vec![Envelope::text("JUHUUUU")]
            }
            Command::Stop => {
                self.state.active = false;
                vec![Envelope::text("stopped")]
            }
            Command::Unrecognized(raw) => {
                tracing::debug!(event = %raw, "ignoring unrecognized event");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Hub, SessionHandle};
    use relay_core::ids::ClientId;
    use std::time::Duration;

    fn coordinator() -> Coordinator {
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (_hub, handle) = Hub::new();
        Coordinator::new(events_rx, handle)
    }

    #[tokio::test]
    async fn start_activates_and_announces() {
        let mut coord = coordinator();
        let envelopes = coord.apply(Command::Start);
        assert!(coord.state.active);
        assert_eq!(envelopes, vec![Envelope::text("JUHUUUU")]);
    }

    #[tokio::test]
    async fn stop_deactivates_and_announces() {
        let mut coord = coordinator();
        coord.apply(Command::Start);
        let envelopes = coord.apply(Command::Stop);
        assert!(!coord.state.active);
        assert_eq!(envelopes, vec![Envelope::text("stopped")]);
    }

    #[tokio::test]
    async fn unrecognized_leaves_state_untouched() {
        let mut coord = coordinator();
        coord.apply(Command::Start);
        let before = coord.state.clone();

        let envelopes = coord.apply(Command::Unrecognized("dance".into()));
        assert!(envelopes.is_empty());
        assert_eq!(coord.state, before);
    }

    #[tokio::test]
    async fn run_broadcasts_exactly_one_envelope_per_start() {
        let (hub, handle) = Hub::new();
        tokio::spawn(hub.run());

        let (session, mut rx) = SessionHandle::new(ClientId::new());
        handle.register(session);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while handle.client_count() != 1 {
            assert!(tokio::time::Instant::now() < deadline, "registration timed out");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(Coordinator::new(events_rx, handle).run());

        events_tx.send("start".to_owned()).unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope, Envelope::text("JUHUUUU"));
        assert!(rx.try_recv().is_err(), "expected exactly one envelope");
    }
}
