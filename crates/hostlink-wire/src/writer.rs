use std::io::{ErrorKind, Write};

use crate::codec::encode_message;
use crate::error::{Result, WireError};
use crate::message::Message;

/// Writes complete channel messages to any `Write` stream.
///
/// Each message is written in full and flushed before the call returns.
/// Callers that share one stream between writers must serialize access
/// externally so two messages never interleave on the wire.
pub struct MessageWriter<T> {
    inner: T,
}

impl<T: Write> MessageWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Encode and write a message (blocking).
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        let bytes = encode_message(msg)?;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::message::{Call, Reply};
    use crate::reader::MessageReader;

    #[test]
    fn written_messages_decode() {
        let mut writer = MessageWriter::new(Cursor::new(Vec::<u8>::new()));
        writer
            .write_message(&Message::Call(Call::new("a", vec![json!(1)], "reply_0")))
            .unwrap();
        writer
            .write_message(&Message::Reply(Reply::ok("reply_0", json!("done"))))
            .unwrap();

        let bytes = writer.into_inner().into_inner();
        let mut reader = MessageReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read_message().unwrap(), Message::Call(_)));
        assert!(matches!(reader.read_message().unwrap(), Message::Reply(_)));
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = MessageWriter::new(ZeroWriter);
        let err = writer
            .write_message(&Message::Call(Call::fire_and_forget("stop", vec![])))
            .unwrap_err();
        assert!(matches!(err, WireError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_and_flush_retry() {
        let mut writer = MessageWriter::new(InterruptedWriter {
            write_fired: false,
            flush_fired: false,
            data: Vec::new(),
        });
        writer
            .write_message(&Message::Call(Call::new("x", vec![], "reply_0")))
            .unwrap();
        assert!(!writer.get_ref().data.is_empty());
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = MessageWriter::new(left);
        let mut reader = MessageReader::new(right);

        writer
            .write_message(&Message::Call(Call::new("ping", vec![], "reply_0")))
            .unwrap();
        let msg = reader.read_message().unwrap();
        assert!(matches!(msg, Message::Call(ref c) if c.method == "ping"));
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptedWriter {
        write_fired: bool,
        flush_fired: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_fired {
                self.write_fired = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_fired {
                self.flush_fired = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }
}
