use bytes::{Buf, BytesMut};
use tracing::warn;

use crate::error::{Result, WireError};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Encode a message as a single self-delimiting UTF-8 JSON document.
///
/// There is no length prefix or delimiter: each message is exactly one
/// parseable JSON value, and the decoder relies on consuming exactly one
/// value per message boundary.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    serde_json::to_vec(msg).map_err(WireError::Encode)
}

/// Accumulates raw stream bytes and extracts complete messages.
///
/// Bytes are appended as they arrive; [`try_next`](Self::try_next) re-parses
/// the buffered contents eagerly. A parse failure caused by truncation is
/// "not enough data yet", never an error. After a successful extraction the
/// buffer holds strictly the unconsumed remainder, so a single read that
/// delivered two complete messages yields both before more I/O is needed.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buf: BytesMut,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append a chunk of raw bytes read from the stream.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Try to extract the next complete message.
    ///
    /// Returns `Ok(None)` if the buffer holds no complete JSON value yet.
    /// Genuinely malformed input surfaces as [`WireError::Malformed`].
    pub fn try_next(&mut self) -> Result<Option<Message>> {
        // Inter-message whitespace is tolerated but never kept around.
        let skip = self
            .buf
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buf.advance(skip);
        if self.buf.is_empty() {
            return Ok(None);
        }

        let (item, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&self.buf)
                .into_iter::<serde_json::Value>();
            let item = values.next();
            (item, values.byte_offset())
        };

        match item {
            None => Ok(None),
            Some(Ok(value)) => {
                self.buf.advance(consumed);
                Ok(Some(Message::from_value(value)?))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => {
                warn!(error = %e, buffered = self.buf.len(), "malformed JSON on stream");
                Err(WireError::Malformed(e.to_string()))
            }
        }
    }

    /// Number of unconsumed bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::{Call, Reply};

    fn call_bytes(method: &str, id: &str) -> Vec<u8> {
        encode_message(&Message::Call(Call::new(method, vec![json!(1)], id))).unwrap()
    }

    #[test]
    fn whole_message_in_one_chunk() {
        let mut buf = MessageBuffer::new();
        buf.extend(&call_bytes("Storage_get", "reply_0"));

        let msg = buf.try_next().unwrap().unwrap();
        assert!(matches!(msg, Message::Call(ref c) if c.method == "Storage_get"));
        assert!(buf.is_empty(), "buffer must be empty after extraction");
    }

    #[test]
    fn one_byte_chunks_reassemble() {
        let wire = call_bytes("Notify_show", "reply_7");
        let mut buf = MessageBuffer::new();

        for (i, byte) in wire.iter().enumerate() {
            buf.extend(std::slice::from_ref(byte));
            let decoded = buf.try_next().unwrap();
            if i + 1 < wire.len() {
                assert!(decoded.is_none(), "no message before byte {}", i + 1);
            } else {
                let msg = decoded.expect("final byte completes the message");
                assert!(matches!(msg, Message::Call(ref c) if c.method == "Notify_show"));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn two_messages_in_one_chunk() {
        let mut wire = call_bytes("Feed_open", "reply_1");
        wire.extend_from_slice(
            &encode_message(&Message::Reply(Reply::ok("reply_0", json!("v")))).unwrap(),
        );

        let mut buf = MessageBuffer::new();
        buf.extend(&wire);

        let first = buf.try_next().unwrap().unwrap();
        assert!(matches!(first, Message::Call(_)));
        let second = buf.try_next().unwrap().unwrap();
        assert!(matches!(second, Message::Reply(_)));
        assert!(buf.try_next().unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn message_and_a_half_keeps_remainder() {
        let whole = call_bytes("Feed_close", "reply_2");
        let next = call_bytes("Feed_send", "reply_3");
        let split = next.len() / 2;

        let mut buf = MessageBuffer::new();
        buf.extend(&whole);
        buf.extend(&next[..split]);

        let first = buf.try_next().unwrap().unwrap();
        assert!(matches!(first, Message::Call(ref c) if c.method == "Feed_close"));
        assert_eq!(buf.len(), split);
        assert!(buf.try_next().unwrap().is_none());

        buf.extend(&next[split..]);
        let second = buf.try_next().unwrap().unwrap();
        assert!(matches!(second, Message::Call(ref c) if c.method == "Feed_send"));
    }

    #[test]
    fn stray_trailing_brace_is_fatal() {
        let mut wire = call_bytes("Storage_get", "reply_0");
        wire.push(b'}');

        let mut buf = MessageBuffer::new();
        buf.extend(&wire);

        assert!(buf.try_next().unwrap().is_some());
        let err = buf.try_next().unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)));
    }

    #[test]
    fn malformed_json_is_fatal_not_incomplete() {
        let mut buf = MessageBuffer::new();
        buf.extend(b"{\"method\": nope}");
        let err = buf.try_next().unwrap_err();
        assert!(matches!(err, WireError::Malformed(_)));
    }

    #[test]
    fn whitespace_between_messages_is_skipped() {
        let mut buf = MessageBuffer::new();
        buf.extend(b"  \n");
        buf.extend(&call_bytes("Archive_unzip", "reply_9"));
        buf.extend(b"\n  ");

        let msg = buf.try_next().unwrap().unwrap();
        assert!(matches!(msg, Message::Call(_)));
        assert!(buf.try_next().unwrap().is_none());
        assert!(buf.is_empty(), "trailing whitespace must be drained");
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut buf = MessageBuffer::new();
        assert!(buf.try_next().unwrap().is_none());
    }

    #[test]
    fn roundtrip_preserves_message() {
        let original = Message::Call(Call::new(
            "Feed_send",
            vec![json!(42), json!({"payload": "hi"})],
            "reply_11",
        ));
        let mut buf = MessageBuffer::new();
        buf.extend(&encode_message(&original).unwrap());
        let decoded = buf.try_next().unwrap().unwrap();
        assert_eq!(decoded, original);
    }
}
