/// A session's socket read failed.
///
/// Recovered locally: the owning read loop terminates and the session
/// unregisters. Never crosses the session boundary.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// Delivery to a single recipient failed.
///
/// Consumed by the hub during fan-out, which evicts only the failing
/// session; the broadcast continues to every other recipient.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("session outbound channel closed")]
    Closed,
}
