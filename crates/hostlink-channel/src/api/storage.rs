use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::api::group::ApiGroup;
use crate::args::{arg_str, arg_value};
use crate::channel::ControlChannel;
use crate::error::{HandlerError, Result};

const GROUP: &str = "Storage";

/// Key/value store exposed to the remote endpoint.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, entries: Vec<(String, Value)>);
}

/// Register `Storage_get` (sync) and `Storage_set` (async) backed by
/// `backend`. Absent keys answer JSON null; `set` takes one argument, an
/// array of `[key, value]` pairs applied as a batch.
pub fn register_storage<R: Read, W: Write>(
    channel: &ControlChannel<R, W>,
    backend: Arc<dyn StorageBackend>,
) {
    let group = ApiGroup::new(channel, GROUP);

    let reads = Arc::clone(&backend);
    group.register_sync("get", move |args: &[Value]| {
        let key = arg_str(args, 0)?;
        Ok(reads.get(key).unwrap_or(Value::Null))
    });

    group.register_async("set", move |args: &[Value]| {
        let pairs = arg_value(args, 0)?
            .as_array()
            .ok_or_else(|| HandlerError::new("set expects an array of [key, value] pairs"))?;
        let mut entries = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let pair = pair
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| HandlerError::new("each entry must be a [key, value] pair"))?;
            let key = pair[0]
                .as_str()
                .ok_or_else(|| HandlerError::new("entry key must be a string"))?;
            entries.push((key.to_string(), pair[1].clone()));
        }
        backend.set(entries);
        Ok(Value::Null)
    });
}

/// Typed caller for a remote Storage group.
pub struct StorageClient<R, W> {
    group: ApiGroup<R, W>,
}

impl<R: Read, W: Write> StorageClient<R, W> {
    pub fn new(channel: &ControlChannel<R, W>) -> Self {
        Self {
            group: ApiGroup::new(channel, GROUP),
        }
    }

    /// `None` when the key is absent on the remote side.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = self.group.invoke("get", vec![Value::String(key.to_string())])?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    pub fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let pairs: Vec<Value> = entries
            .into_iter()
            .map(|(key, value)| Value::Array(vec![Value::String(key), value]))
            .collect();
        self.group.invoke_event("set", vec![Value::Array(pairs)])
    }
}

/// In-memory backend for the CLI host and tests. Setting a key to JSON
/// null removes it.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, entries: Vec<(String, Value)>) {
        let mut map = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        for (key, value) in entries {
            if value.is_null() {
                debug!(key, "removing stored key");
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn memory_storage_set_and_remove() {
        let storage = MemoryStorage::new();
        storage.set(vec![
            ("a".into(), json!(1)),
            ("b".into(), json!({"nested": true})),
        ]);
        assert_eq!(storage.get("a"), Some(json!(1)));
        assert_eq!(storage.get("b"), Some(json!({"nested": true})));

        storage.set(vec![("a".into(), Value::Null)]);
        assert_eq!(storage.get("a"), None);
    }

    #[test]
    fn get_and_set_over_the_channel() {
        let (client_side, host_side) = crate::channel::test_pair();
        register_storage(&host_side, Arc::new(MemoryStorage::new()));
        let server = host_side.spawn_dispatcher().unwrap();

        let storage = StorageClient::new(&client_side);
        assert_eq!(storage.get("answer").unwrap(), None);
        storage.set(vec![("answer".into(), json!(42))]).unwrap();
        assert_eq!(storage.get("answer").unwrap(), Some(json!(42)));

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }

    #[test]
    fn concurrent_gets_each_receive_their_own_value() {
        let (client_side, host_side) = crate::channel::test_pair();
        let backend = Arc::new(MemoryStorage::new());
        for i in 0..8 {
            backend.set(vec![(format!("key{i}"), json!(format!("value{i}")))]);
        }
        register_storage(&host_side, backend);
        let server = host_side.spawn_dispatcher().unwrap();

        let mut readers = Vec::new();
        for i in 0..8 {
            let channel = client_side.clone();
            readers.push(std::thread::spawn(move || {
                let storage = StorageClient::new(&channel);
                let value = storage.get(&format!("key{i}")).unwrap();
                assert_eq!(value, Some(json!(format!("value{i}"))));
            }));
        }
        for reader in readers {
            reader.join().unwrap();
        }

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }

    #[test]
    fn malformed_set_payload_is_rejected() {
        let (client_side, host_side) = crate::channel::test_pair();
        register_storage(&host_side, Arc::new(MemoryStorage::new()));
        let server = host_side.spawn_dispatcher().unwrap();

        let err = client_side
            .call("Storage_set", vec![json!("not pairs")])
            .unwrap_err();
        assert!(matches!(err, crate::error::ChannelError::Remote(_)));

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }
}
