use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, WireError};

/// An outbound invocation of a named remote operation.
///
/// `reply_id` is unique per channel instance for as long as the reply is
/// outstanding. Fire-and-forget calls carry no `reply_id` and expect no
/// reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(rename = "replyId", default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
}

impl Call {
    /// Build a call expecting a correlated reply.
    pub fn new(method: impl Into<String>, args: Vec<Value>, reply_id: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args,
            reply_id: Some(reply_id.into()),
        }
    }

    /// Build a fire-and-forget call.
    pub fn fire_and_forget(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
            reply_id: None,
        }
    }
}

/// The response to a previously sent [`Call`], correlated by id.
///
/// Exactly one of `reply`/`error` is meaningful. A reply carrying neither
/// is a success with a null result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    /// Build a success reply.
    pub fn ok(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            reply: Some(value),
            error: None,
        }
    }

    /// Build an error reply.
    pub fn err(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reply: None,
            error: Some(message.into()),
        }
    }

    /// Unwrap the remote outcome this reply carries.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.reply.unwrap_or(Value::Null)),
        }
    }
}

/// A decoded channel message: either an inbound call or a reply to one of
/// our outstanding calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Call(Call),
    Reply(Reply),
}

impl Message {
    /// Classify a parsed JSON value as a call or a reply.
    ///
    /// Calls are recognized by their `method` field, replies by `id`. A
    /// value with neither shape is a protocol error.
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(WireError::Malformed(format!(
                "message is not a JSON object: {value}"
            )));
        };

        if obj.contains_key("method") {
            let call: Call = serde_json::from_value(value)
                .map_err(|e| WireError::Malformed(format!("invalid call: {e}")))?;
            Ok(Message::Call(call))
        } else if obj.contains_key("id") {
            let reply: Reply = serde_json::from_value(value)
                .map_err(|e| WireError::Malformed(format!("invalid reply: {e}")))?;
            Ok(Message::Reply(reply))
        } else {
            Err(WireError::Malformed(
                "message is neither a call nor a reply".to_string(),
            ))
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Message::Call(call) => call.serialize(serializer),
            Message::Reply(reply) => reply.serialize(serializer),
        }
    }
}
