use std::time::Duration;

use hostlink_wire::WireError;

/// Errors surfaced to callers of the control channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The stream carried undecodable data. Fatal: the channel can no
    /// longer find message boundaries and must be closed by its owner.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The far end explicitly replied with an error. Recoverable, and
    /// local to the one call that received it.
    #[error("remote error: {0}")]
    Remote(String),

    /// An I/O failure on the transport. Fatal for all outstanding and
    /// future calls on this channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to bind or connect the underlying socket.
    #[error(transparent)]
    Transport(#[from] hostlink_transport::TransportError),

    /// A message could not be serialized. The call never went out; the
    /// channel itself is still usable.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// The channel is closed; calls fail fast instead of blocking forever.
    #[error("channel closed: {0}")]
    Closed(String),

    /// The call's deadline expired before its reply arrived.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl ChannelError {
    /// Map a fatal wire error onto the channel taxonomy.
    ///
    /// `ReadTimedOut` is not fatal and must be handled before reaching
    /// this conversion.
    pub(crate) fn from_wire(err: WireError) -> Self {
        match err {
            WireError::Malformed(msg) => ChannelError::Protocol(msg),
            WireError::Encode(e) => ChannelError::Encode(e.to_string()),
            // A write against a hung-up peer raises EPIPE; that is the same
            // condition a reader sees as EOF, so both report as Closed.
            WireError::Io(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::BrokenPipe
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                ChannelError::Closed("connection closed by peer".to_string())
            }
            WireError::Io(e) => ChannelError::Io(e),
            WireError::ConnectionClosed => {
                ChannelError::Closed("connection closed by peer".to_string())
            }
            WireError::ReadTimedOut => {
                ChannelError::Closed("unexpected read timeout".to_string())
            }
        }
    }

    /// Whether this error leaves the channel unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChannelError::Protocol(_) | ChannelError::Io(_) | ChannelError::Closed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Failure of a registered handler while processing an inbound call.
///
/// Caught at the registry boundary and converted into an error reply for
/// that one call; it never takes down the dispatcher or other waiters.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Outcome of a handler invocation.
pub type HandlerResult = std::result::Result<serde_json::Value, HandlerError>;
