use flexlink_frame::FrameError;
use flexlink_transport::TransportError;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame or packet codec error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A handler is already registered for the opcode.
    #[error("opcode {opcode} already has a handler")]
    Registration { opcode: u16 },

    /// The connection to the receiver failed while running.
    #[error("connection to {addr} failed: {source}")]
    Connection {
        addr: String,
        #[source]
        source: Box<ClientError>,
    },

    /// The operation is not valid in the connection's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A shared lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Configuration is invalid or could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
