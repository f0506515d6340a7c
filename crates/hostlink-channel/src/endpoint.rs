use std::path::Path;
use std::sync::Arc;

use hostlink_transport::{peer_credentials, HostSocket};
use tracing::{debug, info};

use crate::channel::{ChannelConfig, ControlChannel, SocketChannel};
use crate::error::Result;
use crate::worker::WorkerPool;

/// Accepts runtime connections on a Unix socket, one channel per accept.
///
/// All accepted channels share one worker pool so a burst of connections
/// cannot multiply async-handler threads.
pub struct ChannelListener {
    socket: HostSocket,
    config: ChannelConfig,
    workers: Arc<WorkerPool>,
}

impl ChannelListener {
    /// Bind the socket path with default channel configuration.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with(path, ChannelConfig::default())
    }

    pub fn bind_with(path: impl AsRef<Path>, config: ChannelConfig) -> Result<Self> {
        let socket = HostSocket::bind(path)?;
        info!(path = %socket.path().display(), "control channel listening");
        let workers = Arc::new(WorkerPool::new(config.worker_threads)?);
        Ok(Self {
            socket,
            config,
            workers,
        })
    }

    /// Block until a runtime connects, then wrap the connection in a channel.
    pub fn accept(&self) -> Result<SocketChannel> {
        let stream = self.socket.accept()?;
        if let Some(creds) = peer_credentials(&stream) {
            debug!(pid = creds.pid, uid = creds.uid, gid = creds.gid, "peer connected");
        }
        let channel =
            ControlChannel::over_with(stream, self.config.clone(), Arc::clone(&self.workers))?;
        Ok(channel)
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }
}

/// Connect to a listening endpoint with default configuration.
pub fn connect(path: impl AsRef<Path>) -> Result<SocketChannel> {
    connect_with(path, ChannelConfig::default())
}

pub fn connect_with(path: impl AsRef<Path>, config: ChannelConfig) -> Result<SocketChannel> {
    let stream = hostlink_transport::connect(&path)?;
    debug!(path = %path.as_ref().display(), "connected to control channel");
    let workers = Arc::new(WorkerPool::new(config.worker_threads)?);
    Ok(ControlChannel::over_with(stream, config, workers)?)
}
