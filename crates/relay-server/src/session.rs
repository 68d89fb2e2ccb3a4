//! Per-connection read/write pump.

use std::str::FromStr;

use axum::extract::ws::WebSocket;
use tokio::sync::mpsc;

use relay_core::envelope::Envelope;
use relay_core::ids::ClientId;

use crate::connection::{Connection, ConnectionReader, ConnectionWriter};
use crate::hub::{HubHandle, SessionHandle};

/// Where a session routes inbound frames. The two modes are mutually
/// exclusive deployment choices, selected once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Frames go straight back out through the hub broadcast channel.
    Echo,
    /// Frames are handed to the coordinator as opaque event strings.
    Command,
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "echo" => Ok(Self::Echo),
            "command" => Ok(Self::Command),
            other => Err(format!("unknown topology '{other}'")),
        }
    }
}

/// Unregisters the session when dropped.
///
/// The read loop has several exit paths (peer close, receive error,
/// panic); routing cleanup through drop guarantees the hub hears about
/// the session's death exactly once on every one of them.
struct UnregisterGuard {
    id: ClientId,
    hub: HubHandle,
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.id.clone());
    }
}

/// Run one client session to completion: register with the hub, pump
/// frames until the peer goes away, then unregister.
pub async fn run(
    socket: WebSocket,
    hub: HubHandle,
    events: mpsc::UnboundedSender<String>,
    topology: Topology,
) {
    let id = ClientId::new();
    let (handle, outbound) = SessionHandle::new(id.clone());
    let (reader, writer) = Connection::new(socket).split();

    hub.register(handle);
    // Dropped on every exit path below, including unwinding.
    let _guard = UnregisterGuard {
        id: id.clone(),
        hub: hub.clone(),
    };

    // The writer winds down on its own once the hub drops the session's
    // outbound sender (unregister or eviction).
    tokio::spawn(write_pump(outbound, writer));

    read_pump(&id, reader, &hub, &events, topology).await;
}

/// Blocks on `receive` until the peer closes or the transport fails; each
/// text frame is routed per the configured topology.
async fn read_pump(
    id: &ClientId,
    mut reader: ConnectionReader,
    hub: &HubHandle,
    events: &mpsc::UnboundedSender<String>,
    topology: Topology,
) {
    loop {
        match reader.receive().await {
            Ok(Some(frame)) => match topology {
                Topology::Echo => hub.broadcast(Envelope::text(frame)),
                Topology::Command => {
                    if events.send(frame).is_err() {
                        tracing::warn!(client_id = %id, "coordinator gone, dropping event");
                    }
                }
            },
            Ok(None) => {
                tracing::info!(client_id = %id, "peer closed connection");
                break;
            }
            Err(err) => {
                tracing::warn!(client_id = %id, error = %err, "receive failed");
                break;
            }
        }
    }
}

/// Drains the hub-fed outbound channel into the socket. Ends when the hub
/// drops the session's sender (unregister or eviction) or a write fails.
async fn write_pump(mut outbound: mpsc::UnboundedReceiver<Envelope>, mut writer: ConnectionWriter) {
    while let Some(envelope) = outbound.recv().await {
        if let Err(err) = writer.send(&envelope).await {
            tracing::debug!(error = %err, "write failed, stopping writer");
            break;
        }
    }
}
