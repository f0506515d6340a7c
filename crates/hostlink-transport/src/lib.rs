//! Local socket transport for the hostlink control channel.
//!
//! The host process binds a filesystem-path Unix domain socket; the embedded
//! runtime it launches connects back to it. Exactly two peers share each
//! socket. This is the lowest layer of hostlink — everything else builds on
//! the plain [`std::os::unix::net::UnixStream`] handed out here.

pub mod creds;
pub mod error;
pub mod socket;

pub use creds::{peer_credentials, PeerCredentials};
pub use error::{Result, TransportError};
pub use socket::{connect, HostSocket};
