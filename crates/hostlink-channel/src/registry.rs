use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::HandlerResult;

/// A local operation callable by the remote endpoint.
///
/// Implemented for any `Fn(&[Value]) -> HandlerResult` closure, or by hand
/// where a handler carries state.
pub trait CallHandler: Send + Sync {
    fn handle(&self, args: &[Value]) -> HandlerResult;
}

impl<F> CallHandler for F
where
    F: Fn(&[Value]) -> HandlerResult + Send + Sync,
{
    fn handle(&self, args: &[Value]) -> HandlerResult {
        self(args)
    }
}

/// A registered handler together with its dispatch mode.
#[derive(Clone)]
pub(crate) enum Registered {
    /// Runs on the dispatch context; the reply is written immediately.
    Sync(Arc<dyn CallHandler>),
    /// Deferred to the worker pool; the reply is written on completion.
    Async(Arc<dyn CallHandler>),
}

/// Table mapping fully-qualified method names to handlers.
///
/// Entries are created when API groups are constructed and live for the
/// process's lifetime; there is no unregistration. Registering a name
/// twice replaces the previous handler. The table is effectively
/// write-once-many-reads, so lookups take a read lock only.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: RwLock<HashMap<String, Registered>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that runs inline on the dispatch context.
    pub fn register_sync<H: CallHandler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.insert(name.into(), Registered::Sync(Arc::new(handler)));
    }

    /// Register a handler that is handed off to the worker pool.
    pub fn register_async<H: CallHandler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.insert(name.into(), Registered::Async(Arc::new(handler)));
    }

    fn insert(&self, name: String, entry: Registered) {
        let mut handlers = self.handlers.write().unwrap_or_else(|p| p.into_inner());
        if handlers.insert(name.clone(), entry).is_some() {
            debug!(method = %name, "method re-registered; previous handler replaced");
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Registered> {
        self.handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .cloned()
    }

    /// Whether a method is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(name)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_finds_registered_handler() {
        let registry = MethodRegistry::new();
        registry.register_sync("Echo_upper", |args: &[Value]| {
            Ok(json!(args[0].as_str().unwrap_or_default().to_uppercase()))
        });

        let entry = registry.lookup("Echo_upper").expect("handler registered");
        let Registered::Sync(handler) = entry else {
            panic!("expected sync registration");
        };
        assert_eq!(handler.handle(&[json!("hi")]).unwrap(), json!("HI"));
    }

    #[test]
    fn last_registration_wins() {
        let registry = MethodRegistry::new();
        registry.register_sync("Storage_get", |_: &[Value]| Ok(json!("first")));
        registry.register_sync("Storage_get", |_: &[Value]| Ok(json!("second")));

        let Some(Registered::Sync(handler)) = registry.lookup("Storage_get") else {
            panic!("expected sync registration");
        };
        assert_eq!(handler.handle(&[]).unwrap(), json!("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn re_registration_can_change_mode() {
        let registry = MethodRegistry::new();
        registry.register_sync("Feed_send", |_: &[Value]| Ok(Value::Null));
        registry.register_async("Feed_send", |_: &[Value]| Ok(Value::Null));

        assert!(matches!(
            registry.lookup("Feed_send"),
            Some(Registered::Async(_))
        ));
    }

    #[test]
    fn unknown_method_is_absent() {
        let registry = MethodRegistry::new();
        assert!(registry.lookup("Nope_missing").is_none());
        assert!(!registry.contains("Nope_missing"));
        assert!(registry.is_empty());
    }
}
