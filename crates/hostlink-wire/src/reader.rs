use std::io::{ErrorKind, Read};

use crate::codec::MessageBuffer;
use crate::error::{Result, WireError};
use crate::message::Message;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete channel messages from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete messages.
/// When a single read delivers more than one message, the surplus stays
/// buffered and is returned before the stream is touched again.
pub struct MessageReader<T> {
    inner: T,
    buf: MessageBuffer,
}

impl<T: Read> MessageReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: MessageBuffer::new(),
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns [`WireError::ConnectionClosed`] on EOF and
    /// [`WireError::ReadTimedOut`] if the stream has a read timeout and it
    /// elapsed; in the latter case any partial bytes remain buffered and
    /// the call can simply be retried.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(msg) = self.buf.try_next()? {
                return Ok(msg);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(WireError::ReadTimedOut)
                }
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                return Err(WireError::ConnectionClosed);
            }

            self.buf.extend(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
