/// Errors that can occur while encoding or decoding channel messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The stream carried a JSON value that is not a valid message.
    ///
    /// This is a fatal protocol error: the channel can no longer tell where
    /// message boundaries are and must be closed by its owner. Incomplete
    /// data is never reported this way.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A message could not be serialized to JSON.
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),

    /// An I/O error occurred while reading or writing messages.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete message arrived within the stream's read timeout.
    ///
    /// Not fatal: any partial bytes stay buffered and the read can be
    /// retried.
    #[error("read timed out before a complete message arrived")]
    ReadTimedOut,

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, WireError>;
