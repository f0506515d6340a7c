use std::io::{Read, Write};
use std::time::Duration;

use serde_json::Value;

use crate::channel::ControlChannel;
use crate::error::Result;
use crate::registry::CallHandler;

/// A method namespace bound to a channel.
///
/// Registrations and invocations go through fully-qualified
/// `<group>_<operation>` names, so collaborating groups share one flat
/// registry without colliding.
pub struct ApiGroup<R, W> {
    channel: ControlChannel<R, W>,
    name: String,
}

impl<R, W> Clone for ApiGroup<R, W> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R: Read, W: Write> ApiGroup<R, W> {
    pub fn new(channel: &ControlChannel<R, W>, name: impl Into<String>) -> Self {
        Self {
            channel: channel.clone(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully-qualified name of an operation in this group.
    pub fn qualified(&self, operation: &str) -> String {
        format!("{}_{}", self.name, operation)
    }

    /// Expose an operation that runs inline on the dispatch context.
    pub fn register_sync<H: CallHandler + 'static>(&self, operation: &str, handler: H) {
        self.channel
            .registry()
            .register_sync(self.qualified(operation), handler);
    }

    /// Expose an operation that runs on the worker pool.
    pub fn register_async<H: CallHandler + 'static>(&self, operation: &str, handler: H) {
        self.channel
            .registry()
            .register_async(self.qualified(operation), handler);
    }

    /// Call an operation in this group on the remote endpoint.
    pub fn invoke(&self, operation: &str, args: Vec<Value>) -> Result<Value> {
        self.channel.call(&self.qualified(operation), args)
    }

    pub fn invoke_with_timeout(
        &self,
        operation: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.channel
            .call_with_timeout(&self.qualified(operation), args, timeout)
    }

    /// Push an event to the remote endpoint, waiting only for the ack.
    pub fn invoke_event(&self, operation: &str, args: Vec<Value>) -> Result<()> {
        self.invoke(operation, args).map(drop)
    }

    /// Fire-and-forget an operation in this group.
    pub fn notify(&self, operation: &str, args: Vec<Value>) -> Result<()> {
        self.channel.notify(&self.qualified(operation), args)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn qualifies_operation_names() {
        let (a, b) = crate::channel::test_pair();
        let group = ApiGroup::new(&b, "Storage");
        assert_eq!(group.qualified("get"), "Storage_get");

        group.register_sync("get", |_: &[Value]| Ok(json!("value")));
        assert!(b.registry().contains("Storage_get"));
        drop(a);
    }

    #[test]
    fn invoke_routes_through_qualified_name() {
        let (a, b) = crate::channel::test_pair();
        ApiGroup::new(&b, "Math").register_sync("double", |args: &[Value]| {
            Ok(json!(args[0].as_i64().unwrap_or_default() * 2))
        });
        let server = b.spawn_dispatcher().unwrap();

        let client = ApiGroup::new(&a, "Math");
        assert_eq!(client.invoke("double", vec![json!(21)]).unwrap(), json!(42));

        a.close();
        drop(a);
        server.join().unwrap().unwrap();
    }
}
