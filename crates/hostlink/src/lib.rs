//! Control channel between a host process and its embedded scripting runtime.
//!
//! hostlink connects the two halves of a host-plus-runtime application over
//! a Unix socket: either side issues named calls, serves calls from the
//! other side, and correlates replies back to the calling thread.
//!
//! # Crate Structure
//!
//! - [`transport`] — Unix socket binding, connecting and peer credentials
//! - [`wire`] — Self-delimiting JSON call/reply messages
//! - [`channel`] — The bidirectional control channel and typed API groups

/// Re-export transport types.
pub mod transport {
    pub use hostlink_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use hostlink_wire::*;
}

/// Re-export channel types.
pub mod channel {
    pub use hostlink_channel::*;
}
