//! Typed API groups layered over the raw channel.
//!
//! Each group couples a namespace with a backend trait (host side) and a
//! typed client (runtime side); registration and invocation both go
//! through `<Group>_<operation>` names in the shared registry.

mod archive;
mod feed;
mod group;
mod notify;
mod storage;

pub use archive::{register_archive, ArchiveClient, ArchiveExtractor};
pub use feed::{
    on_feed_change, register_feed, FeedBackend, FeedClient, FeedEvents, MemoryFeeds,
};
pub use group::ApiGroup;
pub use notify::{register_notify, LogNotifier, Notifier, NotifyClient};
pub use storage::{register_storage, MemoryStorage, StorageBackend, StorageClient};
