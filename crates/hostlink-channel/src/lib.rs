//! Bidirectional call/reply channel between a host and an embedded runtime.
//!
//! This is the "just works" layer. Either endpoint issues named calls and
//! serves calls from the other side over one Unix socket; replies are
//! correlated back to the calling thread, and at most one thread performs
//! physical reads at a time.

pub mod api;
pub mod args;
pub mod channel;
mod demux;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod worker;

pub use channel::{ChannelConfig, ControlChannel, SocketChannel};
pub use endpoint::{connect, connect_with, ChannelListener};
pub use error::{ChannelError, HandlerError, HandlerResult, Result};
pub use registry::{CallHandler, MethodRegistry};
pub use worker::WorkerPool;
