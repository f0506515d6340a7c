use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::Value;

use crate::api::group::ApiGroup;
use crate::args::arg_str;
use crate::channel::ControlChannel;
use crate::error::Result;

const GROUP: &str = "Archive";

/// Archive extraction service; `unzip` may take a while, which is why the
/// operation is registered async.
pub trait ArchiveExtractor: Send + Sync {
    fn unzip(&self, src: &str, dest: &str) -> std::result::Result<(), String>;
}

/// Register `Archive_unzip` (async) backed by `extractor`.
pub fn register_archive<R: Read, W: Write>(
    channel: &ControlChannel<R, W>,
    extractor: Arc<dyn ArchiveExtractor>,
) {
    let group = ApiGroup::new(channel, GROUP);
    group.register_async("unzip", move |args: &[Value]| {
        let src = arg_str(args, 0)?;
        let dest = arg_str(args, 1)?;
        extractor.unzip(src, dest)?;
        Ok(Value::Null)
    });
}

/// Typed caller for a remote Archive group.
pub struct ArchiveClient<R, W> {
    group: ApiGroup<R, W>,
}

impl<R: Read, W: Write> ArchiveClient<R, W> {
    pub fn new(channel: &ControlChannel<R, W>) -> Self {
        Self {
            group: ApiGroup::new(channel, GROUP),
        }
    }

    pub fn unzip(&self, src: &str, dest: &str) -> Result<()> {
        self.group.invoke_event(
            "unzip",
            vec![
                Value::String(src.to_string()),
                Value::String(dest.to_string()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        requests: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl ArchiveExtractor for Recording {
        fn unzip(&self, src: &str, dest: &str) -> std::result::Result<(), String> {
            if self.fail {
                return Err(format!("cannot open {src}"));
            }
            self.requests
                .lock()
                .unwrap()
                .push((src.to_string(), dest.to_string()));
            Ok(())
        }
    }

    #[test]
    fn unzip_reaches_the_backend() {
        let (client_side, host_side) = crate::channel::test_pair();
        let recording = Arc::new(Recording {
            requests: Mutex::new(Vec::new()),
            fail: false,
        });
        register_archive(&host_side, Arc::clone(&recording) as Arc<dyn ArchiveExtractor>);
        let server = host_side.spawn_dispatcher().unwrap();

        ArchiveClient::new(&client_side)
            .unzip("/tmp/app.zip", "/tmp/app")
            .unwrap();
        assert_eq!(
            recording.requests.lock().unwrap().as_slice(),
            &[("/tmp/app.zip".to_string(), "/tmp/app".to_string())]
        );

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }

    #[test]
    fn extractor_failure_surfaces_remotely() {
        let (client_side, host_side) = crate::channel::test_pair();
        register_archive(
            &host_side,
            Arc::new(Recording {
                requests: Mutex::new(Vec::new()),
                fail: true,
            }),
        );
        let server = host_side.spawn_dispatcher().unwrap();

        let err = ArchiveClient::new(&client_side)
            .unzip("/tmp/broken.zip", "/tmp/out")
            .unwrap_err();
        assert!(
            matches!(err, crate::error::ChannelError::Remote(ref m) if m.contains("broken.zip"))
        );

        client_side.close();
        drop(client_side);
        server.join().unwrap().unwrap();
    }
}
