use std::sync::Arc;

use hostlink_channel::api::{
    register_archive, register_feed, register_notify, register_storage, ArchiveExtractor,
    LogNotifier, MemoryFeeds, MemoryStorage,
};
use hostlink_channel::{ChannelListener, SocketChannel};
use tracing::info;

use crate::cmd::HostArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: HostArgs, _format: OutputFormat) -> CliResult<i32> {
    let listener =
        ChannelListener::bind(&args.path).map_err(|err| channel_error("bind failed", err))?;
    info!(path = %args.path.display(), "waiting for a runtime to connect");

    let channel = listener
        .accept()
        .map_err(|err| channel_error("accept failed", err))?;

    register_storage(&channel, Arc::new(MemoryStorage::new()));
    register_notify(&channel, Arc::new(LogNotifier));
    register_archive(&channel, Arc::new(LoggingExtractor));
    register_feed(&channel, Arc::new(MemoryFeeds::new()));
    install_ctrlc_handler(channel.clone())?;

    info!("runtime connected, serving calls");
    channel
        .serve()
        .map_err(|err| channel_error("serve failed", err))?;
    info!("runtime disconnected");

    Ok(SUCCESS)
}

// Closing the channel unblocks serve(), which then returns cleanly.
fn install_ctrlc_handler(channel: SocketChannel) -> CliResult<()> {
    ctrlc::set_handler(move || {
        channel.close();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

/// Demo extractor: logs the request instead of touching the filesystem.
struct LoggingExtractor;

impl ArchiveExtractor for LoggingExtractor {
    fn unzip(&self, src: &str, dest: &str) -> Result<(), String> {
        info!(src, dest, "unzip requested");
        Ok(())
    }
}
