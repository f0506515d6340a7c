//! Call/Reply message codec for the hostlink control channel.
//!
//! Every message on the wire is one self-delimiting UTF-8 JSON document —
//! no length prefix, no delimiter. Both endpoints must use this encoding
//! consistently. Two message shapes exist:
//!
//! - Call: `{"method": "<Ns>_<op>", "args": [...], "replyId": "reply_<n>"}`
//!   (`replyId` omitted for fire-and-forget calls)
//! - Reply: `{"id": "...", "reply": <value>}` or `{"id": "...", "error": "..."}`
//!
//! The decoder tolerates messages split across arbitrarily many reads and
//! multiple messages arriving in a single read. Truncation is "not enough
//! data yet"; anything else is a fatal protocol error.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{encode_message, MessageBuffer};
pub use error::{Result, WireError};
pub use message::{Call, Message, Reply};
pub use reader::MessageReader;
pub use writer::MessageWriter;
