use serde::{Deserialize, Serialize};

/// Envelope kind carried by all text broadcasts.
pub const TEXT_KIND: i32 = 1;

/// The only payload shape sent to clients: `{"type": n, "body": s}`.
///
/// Immutable once constructed; the hub clones one copy per recipient so
/// sessions never alias each other's payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: i32,
    pub body: String,
}

impl Envelope {
    pub fn new(kind: i32, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    /// Standard text envelope, kind [`TEXT_KIND`].
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(TEXT_KIND, body)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
