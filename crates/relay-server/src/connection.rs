use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use relay_core::envelope::Envelope;
use relay_core::error::{ReceiveError, SendError};

/// One physical bidirectional socket.
///
/// Owns no concurrency policy of its own: the session decides which task
/// reads and which task writes, and each half has exactly one owner.
pub struct Connection {
    socket: WebSocket,
}

impl Connection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }

    /// Split into the single reader and the single writer.
    pub fn split(self) -> (ConnectionReader, ConnectionWriter) {
        let (sink, stream) = self.socket.split();
        (ConnectionReader { stream }, ConnectionWriter { sink })
    }
}

/// Read half of a connection.
pub struct ConnectionReader {
    stream: SplitStream<WebSocket>,
}

impl ConnectionReader {
    /// Wait for the next text frame. `Ok(None)` means the peer closed.
    ///
    /// Control frames are skipped; axum answers pings on its own.
    pub async fn receive(&mut self) -> Result<Option<String>, ReceiveError> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(WsMessage::Text(text)) => return Ok(Some(text.to_string())),
                Ok(WsMessage::Close(_)) => return Ok(None),
                Ok(_) => continue,
                Err(err) => return Err(ReceiveError::Transport(err.to_string())),
            }
        }
        Ok(None)
    }
}

/// Write half of a connection. Fed exclusively by the session's writer
/// task, so no two writes for the same socket ever race.
pub struct ConnectionWriter {
    sink: SplitSink<WebSocket, WsMessage>,
}

impl ConnectionWriter {
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), SendError> {
        let json = envelope.to_json()?;
        self.sink
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|err| SendError::Transport(err.to_string()))
    }
}
