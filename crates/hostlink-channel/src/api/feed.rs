use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::api::group::ApiGroup;
use crate::args::{arg_str, arg_value};
use crate::channel::ControlChannel;
use crate::error::Result;

const GROUP: &str = "Feed";

/// Message feed service. Cursor ids are opaque strings issued by the
/// backend; a cursor walks one feed's items from newest to oldest.
pub trait FeedBackend: Send + Sync {
    fn open(&self, feed_id: &str) -> std::result::Result<(), String>;
    fn close(&self, feed_id: &str) -> std::result::Result<(), String>;
    fn send(&self, feed_id: &str, item: Value) -> std::result::Result<(), String>;
    fn cursor_open(&self, feed_id: &str) -> std::result::Result<String, String>;
    fn cursor_value(&self, cursor_id: &str) -> std::result::Result<Value, String>;
    /// Advance the cursor; `false` once the feed is exhausted.
    fn cursor_next(&self, cursor_id: &str) -> std::result::Result<bool, String>;
    fn cursor_close(&self, cursor_id: &str) -> std::result::Result<(), String>;
}

/// Register the Feed operations backed by `backend`.
///
/// `open`, `close` and `cursorClose` are bookkeeping and run sync; `send`
/// and cursor iteration may touch slow storage and run on the worker pool.
pub fn register_feed<R: Read, W: Write>(
    channel: &ControlChannel<R, W>,
    backend: Arc<dyn FeedBackend>,
) {
    let group = ApiGroup::new(channel, GROUP);

    let b = Arc::clone(&backend);
    group.register_sync("open", move |args: &[Value]| {
        b.open(arg_str(args, 0)?)?;
        Ok(Value::Null)
    });
    let b = Arc::clone(&backend);
    group.register_sync("close", move |args: &[Value]| {
        b.close(arg_str(args, 0)?)?;
        Ok(Value::Null)
    });
    let b = Arc::clone(&backend);
    group.register_async("send", move |args: &[Value]| {
        b.send(arg_str(args, 0)?, arg_value(args, 1)?.clone())?;
        Ok(Value::Null)
    });
    let b = Arc::clone(&backend);
    group.register_async("cursorOpen", move |args: &[Value]| {
        let cursor = b.cursor_open(arg_str(args, 0)?)?;
        Ok(Value::String(cursor))
    });
    let b = Arc::clone(&backend);
    group.register_async("cursorValue", move |args: &[Value]| {
        Ok(b.cursor_value(arg_str(args, 0)?)?)
    });
    let b = Arc::clone(&backend);
    group.register_async("cursorNext", move |args: &[Value]| {
        Ok(Value::Bool(b.cursor_next(arg_str(args, 0)?)?))
    });
    group.register_sync("cursorClose", move |args: &[Value]| {
        backend.cursor_close(arg_str(args, 0)?)?;
        Ok(Value::Null)
    });
}

/// Register a callback for `Feed_onChange` pushes from the far end.
///
/// The handler acks immediately; the callback runs on the dispatch context
/// and should hand off anything slow.
pub fn on_feed_change<R, W, F>(channel: &ControlChannel<R, W>, callback: F)
where
    R: Read,
    W: Write,
    F: Fn(&str) + Send + Sync + 'static,
{
    let group = ApiGroup::new(channel, GROUP);
    group.register_sync("onChange", move |args: &[Value]| {
        callback(arg_str(args, 0)?);
        Ok(Value::Null)
    });
}

/// Typed caller for a remote Feed group.
pub struct FeedClient<R, W> {
    group: ApiGroup<R, W>,
}

impl<R: Read, W: Write> FeedClient<R, W> {
    pub fn new(channel: &ControlChannel<R, W>) -> Self {
        Self {
            group: ApiGroup::new(channel, GROUP),
        }
    }

    pub fn open(&self, feed_id: &str) -> Result<()> {
        self.group
            .invoke_event("open", vec![Value::String(feed_id.to_string())])
    }

    pub fn close(&self, feed_id: &str) -> Result<()> {
        self.group
            .invoke_event("close", vec![Value::String(feed_id.to_string())])
    }

    pub fn send(&self, feed_id: &str, item: Value) -> Result<()> {
        self.group
            .invoke_event("send", vec![Value::String(feed_id.to_string()), item])
    }

    pub fn cursor_open(&self, feed_id: &str) -> Result<String> {
        let value = self
            .group
            .invoke("cursorOpen", vec![Value::String(feed_id.to_string())])?;
        match value {
            Value::String(cursor) => Ok(cursor),
            other => Err(crate::error::ChannelError::Protocol(format!(
                "cursorOpen returned a non-string cursor id: {other}"
            ))),
        }
    }

    pub fn cursor_value(&self, cursor_id: &str) -> Result<Value> {
        self.group
            .invoke("cursorValue", vec![Value::String(cursor_id.to_string())])
    }

    pub fn cursor_next(&self, cursor_id: &str) -> Result<bool> {
        let value = self
            .group
            .invoke("cursorNext", vec![Value::String(cursor_id.to_string())])?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub fn cursor_close(&self, cursor_id: &str) -> Result<()> {
        self.group
            .invoke_event("cursorClose", vec![Value::String(cursor_id.to_string())])
    }
}

/// Host-side pusher for feed change events.
pub struct FeedEvents<R, W> {
    group: ApiGroup<R, W>,
}

impl<R: Read, W: Write> FeedEvents<R, W> {
    pub fn new(channel: &ControlChannel<R, W>) -> Self {
        Self {
            group: ApiGroup::new(channel, GROUP),
        }
    }

    /// Tell the far end a feed changed, waiting only for the ack.
    pub fn changed(&self, feed_id: &str) -> Result<()> {
        self.group
            .invoke_event("onChange", vec![Value::String(feed_id.to_string())])
    }
}

/// In-memory feed backend for the CLI host and tests.
///
/// Cursors iterate a snapshot index from the newest item backwards.
#[derive(Default)]
pub struct MemoryFeeds {
    state: Mutex<FeedsState>,
    next_cursor: AtomicU64,
}

#[derive(Default)]
struct FeedsState {
    feeds: HashMap<String, Vec<Value>>,
    cursors: HashMap<String, FeedCursor>,
}

struct FeedCursor {
    feed_id: String,
    // Index of the item the cursor currently points at, newest first.
    position: usize,
}

impl MemoryFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, FeedsState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl FeedBackend for MemoryFeeds {
    fn open(&self, feed_id: &str) -> std::result::Result<(), String> {
        debug!(feed_id, "opening feed");
        self.locked().feeds.entry(feed_id.to_string()).or_default();
        Ok(())
    }

    fn close(&self, feed_id: &str) -> std::result::Result<(), String> {
        if self.locked().feeds.contains_key(feed_id) {
            Ok(())
        } else {
            Err(format!("unknown feed: {feed_id}"))
        }
    }

    fn send(&self, feed_id: &str, item: Value) -> std::result::Result<(), String> {
        let mut state = self.locked();
        let feed = state
            .feeds
            .get_mut(feed_id)
            .ok_or_else(|| format!("unknown feed: {feed_id}"))?;
        feed.push(item);
        Ok(())
    }

    fn cursor_open(&self, feed_id: &str) -> std::result::Result<String, String> {
        let mut state = self.locked();
        let len = state
            .feeds
            .get(feed_id)
            .ok_or_else(|| format!("unknown feed: {feed_id}"))?
            .len();
        if len == 0 {
            return Err(format!("feed is empty: {feed_id}"));
        }
        let cursor_id = format!("cursor_{}", self.next_cursor.fetch_add(1, Ordering::Relaxed));
        state.cursors.insert(
            cursor_id.clone(),
            FeedCursor {
                feed_id: feed_id.to_string(),
                position: len - 1,
            },
        );
        Ok(cursor_id)
    }

    fn cursor_value(&self, cursor_id: &str) -> std::result::Result<Value, String> {
        let state = self.locked();
        let cursor = state
            .cursors
            .get(cursor_id)
            .ok_or_else(|| format!("unknown cursor: {cursor_id}"))?;
        let feed = state
            .feeds
            .get(&cursor.feed_id)
            .ok_or_else(|| format!("unknown feed: {}", cursor.feed_id))?;
        feed.get(cursor.position)
            .cloned()
            .ok_or_else(|| format!("cursor is exhausted: {cursor_id}"))
    }

    fn cursor_next(&self, cursor_id: &str) -> std::result::Result<bool, String> {
        let mut state = self.locked();
        let cursor = state
            .cursors
            .get_mut(cursor_id)
            .ok_or_else(|| format!("unknown cursor: {cursor_id}"))?;
        if cursor.position == 0 {
            Ok(false)
        } else {
            cursor.position -= 1;
            Ok(true)
        }
    }

    fn cursor_close(&self, cursor_id: &str) -> std::result::Result<(), String> {
        self.locked()
            .cursors
            .remove(cursor_id)
            .map(drop)
            .ok_or_else(|| format!("unknown cursor: {cursor_id}"))
    }
}
