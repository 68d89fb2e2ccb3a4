pub mod command;
pub mod envelope;
pub mod error;
pub mod ids;

pub use command::Command;
pub use envelope::Envelope;
pub use error::{ReceiveError, SendError};
pub use ids::ClientId;
